//! Dual-protocol signing.
//!
//! Every key can sign native Filecoin messages. Only secp256k1 keys can also
//! sign EVM transactions; callers discover that through [`Signer::as_evm`]
//! instead of knowing the concrete key type.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::panic)]

use std::fmt::Debug;

use ethers::types::{transaction::eip2718::TypedTransaction, Address, Bytes};

pub use address::{AddressNetwork, FilecoinAddress, Protocol};
pub use bls::BlsSigner;
pub use error::SignerError;
pub use lotus::{from_lotus_export, to_lotus_export};
pub use secp256k1::Secp256k1Signer;

mod address;
mod bls;
mod error;
mod lotus;
mod secp256k1;

/// Native signature scheme tag, as used on the Filecoin wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SignatureType {
    /// Recoverable secp256k1 over a blake2b-256 digest
    Secp256k1 = 1,
    /// BLS12-381, public keys in G1
    Bls = 2,
}

/// A native Filecoin signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    /// Scheme that produced `data`
    pub sig_type: SignatureType,
    /// Raw signature bytes
    pub data: Vec<u8>,
}

/// Signs native Filecoin messages. Every key type can do this.
pub trait Signer: Send + Sync + Debug {
    /// The key's Filecoin address
    fn filecoin_address(&self) -> &FilecoinAddress;

    /// Sign a native message
    fn sign(&self, msg: &[u8]) -> Result<Signature, SignerError>;

    /// Capability query for EVM transaction signing.
    fn as_evm(&self) -> Option<&dyn EvmSigner> {
        None
    }
}

/// Signs EVM transactions. Only secp256k1 keys provide this.
pub trait EvmSigner: Signer {
    /// The key's 20-byte EVM address
    fn evm_address(&self) -> Address;

    /// Sign `tx` for `chain_id` (EIP-155) and return the RLP-encoded signed
    /// transaction, ready for `eth_sendRawTransaction`.
    fn sign_transaction(&self, tx: &TypedTransaction, chain_id: u64) -> Result<Bytes, SignerError>;
}

/// Borrow the EVM capability of a signer, or fail with
/// [`SignerError::NotEvmCapable`].
pub fn require_evm(signer: &dyn Signer) -> Result<&dyn EvmSigner, SignerError> {
    signer.as_evm().ok_or_else(|| SignerError::NotEvmCapable {
        address: signer.filecoin_address().to_string(),
    })
}
