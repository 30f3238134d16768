use std::fmt;

use serde::{Deserialize, Serialize};

use crate::record::RecordError;

/// A transaction id.
///
/// Rendered as 64 lowercase hex characters everywhere the indexer
/// writes it: store keys, canonical outpoint strings and record
/// fields all use this form. Adapters are expected to deliver hashes
/// already in the chain's canonical byte order.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    /// The all-zero hash, used as the coinbase previous-transaction
    /// sentinel and in the genesis sensible id.
    pub const ZERO: Hash = Hash([0; 32]);

    /// Returns `true` for the all-zero sentinel.
    pub fn is_zero(&self) -> bool {
        self.0 == [0; 32]
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("transaction::Hash")
            .field(&hex::encode(self.0))
            .finish()
    }
}

impl std::str::FromStr for Hash {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0; 32];
        hex::decode_to_slice(s, &mut bytes[..])?;
        Ok(Hash(bytes))
    }
}
