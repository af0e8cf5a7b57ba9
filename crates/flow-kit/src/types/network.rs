//! Network identification and the endpoint registry.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ConfigError;

use super::Identifier;

/// Endpoints for one Flow network.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Base URL of the Access node REST API.
    pub rest_url: &'static str,
    /// Base URL transaction ids are appended to for a human-readable page.
    pub explorer_url: &'static str,
    /// The chain-id string of the network.
    pub chain_id: &'static str,
}

/// Mainnet endpoints.
pub const MAINNET: Endpoint = Endpoint {
    rest_url: "https://rest-mainnet.onflow.org",
    explorer_url: "https://flowscan.io/tx",
    chain_id: "flow-mainnet",
};

/// Testnet endpoints.
pub const TESTNET: Endpoint = Endpoint {
    rest_url: "https://rest-testnet.onflow.org",
    explorer_url: "https://testnet.flowscan.io/tx",
    chain_id: "flow-testnet",
};

/// Local emulator endpoints. The emulator has no explorer, so transaction
/// links point at its own REST resource.
pub const EMULATOR: Endpoint = Endpoint {
    rest_url: "http://localhost:8888",
    explorer_url: "http://localhost:8888/v1/transactions",
    chain_id: "flow-emulator",
};

/// The Flow network the client is connected to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Network {
    /// Flow mainnet.
    #[default]
    Mainnet,
    /// Flow testnet.
    Testnet,
    /// A local Flow emulator.
    Emulator,
}

impl Network {
    /// Returns true if this is mainnet.
    pub fn is_mainnet(&self) -> bool {
        matches!(self, Network::Mainnet)
    }

    /// Returns true if this is testnet.
    pub fn is_testnet(&self) -> bool {
        matches!(self, Network::Testnet)
    }

    /// Returns true if this is the local emulator.
    pub fn is_emulator(&self) -> bool {
        matches!(self, Network::Emulator)
    }

    /// Returns the network identifier string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Emulator => "emulator",
        }
    }

    /// The endpoints of this network.
    pub const fn endpoint(&self) -> Endpoint {
        match self {
            Network::Mainnet => MAINNET,
            Network::Testnet => TESTNET,
            Network::Emulator => EMULATOR,
        }
    }

    /// Explorer link for a transaction on this network.
    pub fn explorer_url(&self, transaction_id: &Identifier) -> String {
        format!("{}/{}", self.endpoint().explorer_url, transaction_id)
    }
}

/// Resolve a network name to its endpoints.
pub fn endpoint_for(name: &str) -> Result<Endpoint, ConfigError> {
    name.parse::<Network>().map(|network| network.endpoint())
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            "emulator" => Ok(Network::Emulator),
            _ => Err(ConfigError::UnknownNetwork(s.to_string())),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Network {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Network {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s: String = Deserialize::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
