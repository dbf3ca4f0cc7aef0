//! Shared primitive types used across the whole crate.

use crate::error::{TraceError, TraceResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A chain-native address. Addresses are compared verbatim.
pub type Address = String;

/// A chain-native transaction hash.
pub type TxId = String;

/// Hop count from the seed address of a trace.
pub type Depth = u32;

/// The ledgers this crate understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainType {
    Bitcoin,
    Ethereum,
}

/// Accounting model of a chain. Decides how a transaction decomposes into
/// transfers and which detectors are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerModel {
    Utxo,
    Account,
}

impl ChainType {
    pub const ALL: [ChainType; 2] = [ChainType::Bitcoin, ChainType::Ethereum];

    pub fn model(self) -> LedgerModel {
        match self {
            ChainType::Bitcoin  => LedgerModel::Utxo,
            ChainType::Ethereum => LedgerModel::Account,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChainType::Bitcoin  => "bitcoin",
            ChainType::Ethereum => "ethereum",
        }
    }
}

impl fmt::Display for ChainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChainType {
    type Err = TraceError;

    fn from_str(s: &str) -> TraceResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bitcoin"  => Ok(ChainType::Bitcoin),
            "ethereum" => Ok(ChainType::Ethereum),
            other => Err(TraceError::UnsupportedChain { chain: other.to_string() }),
        }
    }
}
