use std::fmt::{Display, Formatter};
use std::str::FromStr;

use hex_literal::hex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Address, ChainCommunicationError, H160};

/// Chain id of Filecoin mainnet
pub const CHAIN_ID_MAINNET: u64 = 314;
/// Chain id of the Filecoin calibration testnet
pub const CHAIN_ID_CALIBRATION: u64 = 314159;

/// A network the client knows contract deployments for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Filecoin mainnet
    Mainnet,
    /// Filecoin calibration testnet
    Calibration,
}

impl Network {
    /// Expected chain id for the network
    pub const fn chain_id(&self) -> u64 {
        match self {
            Network::Mainnet => CHAIN_ID_MAINNET,
            Network::Calibration => CHAIN_ID_CALIBRATION,
        }
    }

    /// Resolve a network from the chain id a node reports
    pub fn from_chain_id(chain_id: u64) -> Result<Self, ChainCommunicationError> {
        match chain_id {
            CHAIN_ID_MAINNET => Ok(Network::Mainnet),
            CHAIN_ID_CALIBRATION => Ok(Network::Calibration),
            other => Err(ChainCommunicationError::msg(format!(
                "unsupported chain ID: {other} (expected {CHAIN_ID_MAINNET} for mainnet or {CHAIN_ID_CALIBRATION} for calibration)"
            ))),
        }
    }

    /// PDPVerifier deployment
    pub const fn pdp_verifier_address(&self) -> Address {
        match self {
            Network::Mainnet => H160(hex!("BADd0B92C1c71d02E7d520f64c0876538fa2557F")),
            Network::Calibration => H160(hex!("85e366Cf9DD2c0aE37E963d9556F5f4718d6417C")),
        }
    }

    /// Public JSON-RPC endpoint
    pub fn default_rpc_url(&self) -> Result<Url, url::ParseError> {
        match self {
            Network::Mainnet => Url::parse("https://api.node.glif.io/rpc/v1"),
            Network::Calibration => Url::parse("https://api.calibration.node.glif.io/rpc/v1"),
        }
    }

    /// Network name as used in configuration
    pub const fn name(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Calibration => "calibration",
        }
    }
}

impl Display for Network {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Network {
    type Err = ChainCommunicationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "calibration" => Ok(Network::Calibration),
            other => Err(ChainCommunicationError::msg(format!("unknown network: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_ids_resolve_back_to_networks() {
        for network in [Network::Mainnet, Network::Calibration] {
            assert_eq!(Network::from_chain_id(network.chain_id()).unwrap(), network);
        }
        assert!(Network::from_chain_id(1).is_err());
    }

    #[test]
    fn verifier_addresses_match_deployments() {
        let calibration: Address = "0x85e366Cf9DD2c0aE37E963d9556F5f4718d6417C"
            .parse()
            .unwrap();
        assert_eq!(Network::Calibration.pdp_verifier_address(), calibration);
        let mainnet: Address = "0xBADd0B92C1c71d02E7d520f64c0876538fa2557F"
            .parse()
            .unwrap();
        assert_eq!(Network::Mainnet.pdp_verifier_address(), mainnet);
        assert_ne!(
            Network::Mainnet.pdp_verifier_address(),
            Network::Calibration.pdp_verifier_address()
        );
    }

    #[test]
    fn network_names_parse_and_serialize() {
        assert_eq!("Calibration".parse::<Network>().unwrap(), Network::Calibration);
        assert_eq!(
            serde_json::to_string(&Network::Mainnet).unwrap(),
            "\"mainnet\""
        );
        assert_eq!(Network::Mainnet.default_rpc_url().unwrap().host_str(), Some("api.node.glif.io"));
    }
}
