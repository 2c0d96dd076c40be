use std::fmt::{Debug, Formatter};

use ethers::{
    signers::{LocalWallet, Signer as _},
    types::{transaction::eip2718::TypedTransaction, Address, Bytes},
    utils::secret_key_to_address,
};
use k256::ecdsa::SigningKey;

use crate::{
    address::{blake2b, FilecoinAddress},
    EvmSigner, Signature, SignatureType, Signer, SignerError,
};

const KEY_LEN: usize = 32;
const DIGEST_LEN: usize = 32;

/// A secp256k1 key. Signs both native messages and EVM transactions.
#[derive(Clone)]
pub struct Secp256k1Signer {
    key: SigningKey,
    wallet: LocalWallet,
    filecoin_address: FilecoinAddress,
    evm_address: Address,
}

impl Secp256k1Signer {
    /// Build a signer from a raw big-endian scalar. Shorter inputs are
    /// left-padded to 32 bytes.
    pub fn new(raw: &[u8]) -> Result<Self, SignerError> {
        if raw.is_empty() || raw.len() > KEY_LEN {
            return Err(SignerError::InvalidKeyLength(raw.len()));
        }
        let mut padded = [0u8; KEY_LEN];
        padded[KEY_LEN - raw.len()..].copy_from_slice(raw);
        let key = SigningKey::from_bytes(&padded.into()).map_err(|e| SignerError::InvalidKey {
            key_type: "secp256k1",
            reason: e.to_string(),
        })?;
        Ok(Self::from_signing_key(key))
    }

    pub fn from_signing_key(key: SigningKey) -> Self {
        let pubkey = key.verifying_key().to_encoded_point(false);
        let filecoin_address = FilecoinAddress::new_secp256k1(pubkey.as_bytes());
        let evm_address = secret_key_to_address(&key);
        let wallet = LocalWallet::from(key.clone());
        Self {
            key,
            wallet,
            filecoin_address,
            evm_address,
        }
    }
}

impl Debug for Secp256k1Signer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secp256k1Signer")
            .field("filecoin_address", &self.filecoin_address.to_string())
            .field("evm_address", &self.evm_address)
            .finish_non_exhaustive()
    }
}

impl Signer for Secp256k1Signer {
    fn filecoin_address(&self) -> &FilecoinAddress {
        &self.filecoin_address
    }

    /// Signs blake2b-256(msg). Output is R || S || V with V in {0, 1}.
    fn sign(&self, msg: &[u8]) -> Result<Signature, SignerError> {
        let digest = blake2b(DIGEST_LEN, msg);
        let (sig, recid) = self
            .key
            .sign_prehash_recoverable(&digest)
            .map_err(|e| SignerError::Signing(e.to_string()))?;
        let mut data = sig.to_bytes().to_vec();
        data.push(recid.to_byte());
        Ok(Signature {
            sig_type: SignatureType::Secp256k1,
            data,
        })
    }

    fn as_evm(&self) -> Option<&dyn EvmSigner> {
        Some(self)
    }
}

impl EvmSigner for Secp256k1Signer {
    fn evm_address(&self) -> Address {
        self.evm_address
    }

    fn sign_transaction(&self, tx: &TypedTransaction, chain_id: u64) -> Result<Bytes, SignerError> {
        let mut tx = tx.clone();
        tx.set_chain_id(chain_id);
        if tx.from().is_none() {
            tx.set_from(self.evm_address);
        }
        let wallet = self.wallet.clone().with_chain_id(chain_id);
        let sig = wallet
            .sign_transaction_sync(&tx)
            .map_err(|e| SignerError::Signing(e.to_string()))?;
        Ok(tx.rlp_signed(&sig))
    }
}
