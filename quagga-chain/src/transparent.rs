//! Transparent outputs and previous-outpoint references.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::contract::Contract;
use crate::record::RecordError;
use crate::transaction;

/// OutPoint
///
/// A particular transaction output reference. The canonical string
/// form is `tx_id:index`, which is also the key form used by every
/// outpoint-keyed store.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    /// References the transaction that contains the output being spent.
    pub hash: transaction::Hash,

    /// Identifies which output from that transaction is referenced; the
    /// first output is 0, etc.
    pub index: u32,
}

impl OutPoint {
    /// The previous-output index carried by coinbase inputs.
    pub const COINBASE_INDEX: u32 = u32::MAX;

    /// Returns `true` for the coinbase sentinel: an all-zero previous
    /// transaction hash with index `0xFFFF_FFFF`.
    pub fn is_coinbase(&self) -> bool {
        self.hash.is_zero() && self.index == Self::COINBASE_INDEX
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hash, self.index)
    }
}

impl FromStr for OutPoint {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hash, index) = s
            .split_once(':')
            .ok_or_else(|| RecordError::UnknownTag(s.to_string()))?;
        Ok(OutPoint {
            hash: hash.parse()?,
            index: index.parse()?,
        })
    }
}

/// A transparent input to a transaction.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Input {
    /// A reference to an output of a previous transaction.
    PrevOut {
        /// The previous output transaction reference.
        outpoint: OutPoint,
    },
    /// New coins created by the block reward. Skipped unconditionally
    /// by the input resolver.
    Coinbase,
}

impl Input {
    /// The referenced previous outpoint, if any.
    pub fn outpoint(&self) -> Option<&OutPoint> {
        match self {
            Input::PrevOut { outpoint } => Some(outpoint),
            Input::Coinbase => None,
        }
    }
}

/// A transparent output from a transaction.
///
/// Unlike a plain UTXO scanner, the indexer only cares about the
/// decoded contract payload riding on the output script; the script
/// bytes themselves never reach this layer.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Output {
    /// The receiving address, as rendered by the decoder.
    pub address: String,

    /// Output value in base units (satoshi-equivalent).
    pub value: u64,

    /// The decoded contract payload, or `None` for a plain value output.
    pub contract: Option<Contract>,
}
