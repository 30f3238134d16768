//! Chain and network parameters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::record::RecordError;

/// The chain family a node follows.
///
/// The indexing core is chain-agnostic; the chain only selects the
/// adapter and the data directory name.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    /// Bitcoin.
    Btc,
    /// MicrovisionChain.
    Mvc,
    /// Dogecoin.
    Doge,
}

/// An address network kind.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// The production network.
    Mainnet,
    /// The public test network.
    Testnet,
    /// A local regression-test network.
    Regtest,
}

impl Default for Network {
    fn default() -> Self {
        Network::Mainnet
    }
}

/// The pair of chain and network a process indexes.
///
/// Initialized once at startup, before any store is opened, and shared
/// for the process lifetime.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ChainParams {
    pub chain: Chain,
    pub network: Network,
}

impl ChainParams {
    /// Directory name for per-chain state, e.g. `btc-mainnet`.
    pub fn dir_name(&self) -> String {
        format!("{}-{}", self.chain, self.network)
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Chain::Btc => "btc",
            Chain::Mvc => "mvc",
            Chain::Doge => "doge",
        })
    }
}

impl FromStr for Chain {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "btc" => Ok(Chain::Btc),
            "mvc" => Ok(Chain::Mvc),
            "doge" => Ok(Chain::Doge),
            other => Err(RecordError::UnknownTag(other.to_string())),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Regtest => "regtest",
        })
    }
}

impl FromStr for Network {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            "regtest" => Ok(Network::Regtest),
            other => Err(RecordError::UnknownTag(other.to_string())),
        }
    }
}
