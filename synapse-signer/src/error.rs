/// Errors produced while loading keys or signing.
#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    /// Raw key material had an unusable length
    #[error("invalid key length: {0}")]
    InvalidKeyLength(usize),
    /// Key bytes were rejected by the curve implementation
    #[error("invalid {key_type} key: {reason}")]
    InvalidKey {
        /// Key family
        key_type: &'static str,
        /// Backend error
        reason: String,
    },
    /// A lotus export named a key type we cannot load
    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),
    /// A lotus export held a different key type than the constructor expects
    #[error("expected {expected} key, got {actual}")]
    KeyTypeMismatch {
        /// Key type the constructor handles
        expected: &'static str,
        /// Key type found in the export
        actual: String,
    },
    /// The exported key could not be decoded
    #[error("decoding key export: {0}")]
    Decode(String),
    /// The signing backend failed
    #[error("signing failed: {0}")]
    Signing(String),
    /// The key cannot sign EVM transactions
    #[error("signer {address} cannot sign EVM transactions")]
    NotEvmCapable {
        /// Filecoin address of the signer
        address: String,
    },
}
