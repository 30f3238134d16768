//! Blocks and block-related structures (heights, hashes).

mod hash;

#[cfg(test)]
mod tests;

use std::fmt;
use std::sync::Arc;

pub use hash::Hash;

use serde::{Deserialize, Serialize};

use crate::transaction::Transaction;

/// The height of a block in its chain.
///
/// Heights are non-negative by construction; the meta store renders
/// them as decimal ASCII.
#[derive(
    Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize, Default,
)]
pub struct Height(pub u64);

impl fmt::Display for Height {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A parsed block as delivered by a chain adapter.
///
/// The adapter has already decoded the wire bytes and run the script
/// decoders; the indexing core never parses chain bytes itself.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// The block height.
    pub height: Height,
    /// The block hash.
    pub hash: Hash,
    /// Millisecond timestamp from the block header, monotonic within a
    /// chain.
    pub time: i64,
    /// True when the coordinator split an oversized block into batches;
    /// raised on every slice except the last. Partial blocks never
    /// advance the meta height.
    pub is_partial: bool,
    /// The block transactions, in block order.
    pub transactions: Vec<Arc<Transaction>>,
}

impl Block {
    /// Split this block into partial blocks of at most `max_tx`
    /// transactions each.
    ///
    /// Every slice except the last carries `is_partial = true`. Blocks
    /// at or under the limit come back unchanged as a single
    /// non-partial block.
    pub fn split_into_partials(self, max_tx: usize) -> Vec<Block> {
        assert!(max_tx > 0, "partial batches must hold transactions");
        if self.transactions.len() <= max_tx {
            return vec![Block {
                is_partial: false,
                ..self
            }];
        }

        let Block {
            height,
            hash,
            time,
            transactions,
            ..
        } = self;
        let slices = transactions.chunks(max_tx).count();
        transactions
            .chunks(max_tx)
            .enumerate()
            .map(|(i, chunk)| Block {
                height,
                hash,
                time,
                is_partial: i + 1 < slices,
                transactions: chunk.to_vec(),
            })
            .collect()
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("height", &self.height)
            .field("hash", &self.hash)
            .field("transactions", &self.transactions.len())
            .finish()
    }
}
