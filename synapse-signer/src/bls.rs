use std::fmt::{Debug, Formatter};

use blst::min_pk::SecretKey;

use crate::{address::FilecoinAddress, Signature, SignatureType, Signer, SignerError};

/// Domain separation tag for Filecoin BLS signatures.
pub const BLS_DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_NUL_";

/// A BLS12-381 key. Native messages only; there is no EVM capability.
#[derive(Clone)]
pub struct BlsSigner {
    key: SecretKey,
    filecoin_address: FilecoinAddress,
}

impl BlsSigner {
    /// Build a signer from a 32-byte big-endian scalar.
    pub fn new(raw: &[u8]) -> Result<Self, SignerError> {
        if raw.len() != 32 {
            return Err(SignerError::InvalidKeyLength(raw.len()));
        }
        let key = SecretKey::from_bytes(raw).map_err(|e| SignerError::InvalidKey {
            key_type: "bls",
            reason: format!("{e:?}"),
        })?;
        let filecoin_address = FilecoinAddress::new_bls(&key.sk_to_pk().compress());
        Ok(Self {
            key,
            filecoin_address,
        })
    }

    /// Compressed G1 public key.
    pub fn public_key(&self) -> [u8; 48] {
        self.key.sk_to_pk().compress()
    }
}

impl Debug for BlsSigner {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlsSigner")
            .field("filecoin_address", &self.filecoin_address.to_string())
            .finish_non_exhaustive()
    }
}

impl Signer for BlsSigner {
    fn filecoin_address(&self) -> &FilecoinAddress {
        &self.filecoin_address
    }

    fn sign(&self, msg: &[u8]) -> Result<Signature, SignerError> {
        let sig = self.key.sign(msg, BLS_DST, &[]);
        Ok(Signature {
            sig_type: SignatureType::Bls,
            data: sig.compress().to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use blst::{
        min_pk::{PublicKey, Signature as BlsSignature},
        BLST_ERROR,
    };

    use super::*;
    use crate::{require_evm, Protocol};

    fn signer() -> BlsSigner {
        BlsSigner::new(&[1u8; 32]).unwrap()
    }

    #[test]
    fn address_is_f3_over_public_key() {
        let s = signer();
        assert_eq!(s.filecoin_address().protocol(), Protocol::Bls);
        assert_eq!(s.filecoin_address().payload(), &s.public_key()[..]);
        assert!(s.filecoin_address().to_string().starts_with("f3"));
    }

    #[test]
    fn signature_verifies_under_filecoin_dst() {
        let s = signer();
        let msg = b"hello";
        let sig = s.sign(msg).unwrap();
        assert_eq!(sig.sig_type, SignatureType::Bls);
        assert_eq!(sig.data.len(), 96);

        let pk = PublicKey::from_bytes(&s.public_key()).unwrap();
        let decoded = BlsSignature::from_bytes(&sig.data).unwrap();
        assert_eq!(
            decoded.verify(true, msg, BLS_DST, &[], &pk, true),
            BLST_ERROR::BLST_SUCCESS
        );
    }

    #[test]
    fn has_no_evm_capability() {
        let s = signer();
        assert!(s.as_evm().is_none());
        assert!(matches!(
            require_evm(&s),
            Err(SignerError::NotEvmCapable { .. })
        ));
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(matches!(
            BlsSigner::new(&[1u8; 31]),
            Err(SignerError::InvalidKeyLength(31))
        ));
    }
}
