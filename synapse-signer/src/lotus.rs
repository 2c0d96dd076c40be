use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{BlsSigner, Secp256k1Signer, Signer, SignerError};

const TYPE_SECP256K1: &str = "secp256k1";
const TYPE_BLS: &str = "bls";

/// The JSON document inside a `lotus wallet export` string.
#[derive(Debug, Serialize, Deserialize)]
struct KeyInfo {
    #[serde(rename = "Type")]
    key_type: String,
    #[serde(rename = "PrivateKey")]
    private_key: String,
}

fn decode_export(exported: &str) -> Result<(String, Vec<u8>), SignerError> {
    let json = hex::decode(exported.trim()).map_err(|e| SignerError::Decode(e.to_string()))?;
    let info: KeyInfo =
        serde_json::from_slice(&json).map_err(|e| SignerError::Decode(e.to_string()))?;
    let key = STANDARD
        .decode(info.private_key.as_bytes())
        .map_err(|e| SignerError::Decode(e.to_string()))?;
    Ok((info.key_type, key))
}

/// Load a signer of either key type from a lotus export, detecting the type.
pub fn from_lotus_export(exported: &str) -> Result<Box<dyn Signer>, SignerError> {
    let (key_type, key) = decode_export(exported)?;
    debug!(%key_type, "loading lotus key export");
    match key_type.as_str() {
        TYPE_SECP256K1 => Ok(Box::new(Secp256k1Signer::new(&key)?)),
        TYPE_BLS => Ok(Box::new(BlsSigner::new(&key)?)),
        _ => Err(SignerError::UnsupportedKeyType(key_type)),
    }
}

impl Secp256k1Signer {
    /// Load from a lotus export; the export must hold a secp256k1 key.
    pub fn from_lotus_export(exported: &str) -> Result<Self, SignerError> {
        let (key_type, key) = decode_export(exported)?;
        if key_type != TYPE_SECP256K1 {
            return Err(SignerError::KeyTypeMismatch {
                expected: TYPE_SECP256K1,
                actual: key_type,
            });
        }
        Self::new(&key)
    }
}

impl BlsSigner {
    /// Load from a lotus export; the export must hold a BLS key.
    pub fn from_lotus_export(exported: &str) -> Result<Self, SignerError> {
        let (key_type, key) = decode_export(exported)?;
        if key_type != TYPE_BLS {
            return Err(SignerError::KeyTypeMismatch {
                expected: TYPE_BLS,
                actual: key_type,
            });
        }
        Self::new(&key)
    }
}

/// Produce a lotus-compatible export string for a raw key.
pub fn to_lotus_export(key_type: &str, raw: &[u8]) -> Result<String, SignerError> {
    let info = KeyInfo {
        key_type: key_type.to_owned(),
        private_key: STANDARD.encode(raw),
    };
    let json = serde_json::to_vec(&info).map_err(|e| SignerError::Decode(e.to_string()))?;
    Ok(hex::encode(json))
}
