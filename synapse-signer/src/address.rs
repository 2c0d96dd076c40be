use std::fmt::{Display, Formatter};

use data_encoding::BASE32_NOPAD;

const PAYLOAD_HASH_LEN: usize = 20;
const CHECKSUM_LEN: usize = 4;

/// Address protocol. Only the protocols a local key can produce are modelled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Protocol {
    /// blake2b-160 of an uncompressed secp256k1 public key
    Secp256k1 = 1,
    /// 48-byte compressed BLS public key
    Bls = 3,
}

/// Network prefix used in the textual form.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AddressNetwork {
    /// `f`
    #[default]
    Mainnet,
    /// `t`
    Testnet,
}

impl AddressNetwork {
    fn prefix(self) -> char {
        match self {
            AddressNetwork::Mainnet => 'f',
            AddressNetwork::Testnet => 't',
        }
    }
}

/// A Filecoin account address.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FilecoinAddress {
    protocol: Protocol,
    payload: Vec<u8>,
}

impl FilecoinAddress {
    /// Address for an uncompressed (65-byte) secp256k1 public key.
    pub fn new_secp256k1(uncompressed_pubkey: &[u8]) -> Self {
        Self {
            protocol: Protocol::Secp256k1,
            payload: blake2b(PAYLOAD_HASH_LEN, uncompressed_pubkey),
        }
    }

    /// Address for a compressed BLS public key.
    pub fn new_bls(pubkey: &[u8; 48]) -> Self {
        Self {
            protocol: Protocol::Bls,
            payload: pubkey.to_vec(),
        }
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Binary form: protocol byte followed by the payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.payload.len());
        out.push(self.protocol as u8);
        out.extend_from_slice(&self.payload);
        out
    }

    /// blake2b-32 over the binary form.
    pub fn checksum(&self) -> Vec<u8> {
        blake2b(CHECKSUM_LEN, &self.to_bytes())
    }

    /// Textual form for `network`, e.g. `f1...` or `t3...`.
    pub fn encode(&self, network: AddressNetwork) -> String {
        let mut body = self.payload.clone();
        body.extend_from_slice(&self.checksum());
        format!(
            "{}{}{}",
            network.prefix(),
            self.protocol as u8,
            BASE32_NOPAD.encode(&body).to_ascii_lowercase()
        )
    }
}

impl Display for FilecoinAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode(AddressNetwork::Mainnet))
    }
}

pub(crate) fn blake2b(len: usize, data: &[u8]) -> Vec<u8> {
    blake2b_simd::Params::new()
        .hash_length(len)
        .hash(data)
        .as_bytes()
        .to_vec()
}
