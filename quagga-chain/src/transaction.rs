//! Transactions and transaction-related structures.

mod hash;

#[cfg(test)]
mod tests;

pub use hash::Hash;

use serde::{Deserialize, Serialize};

use crate::contract::Contract;
use crate::transparent;

/// A parsed transaction as delivered by a chain adapter.
///
/// The adapter has already run the chain-specific script decoders, so
/// every output carries its contract payload (or `None` for plain
/// value outputs). Transactions with zero contract outputs are still
/// delivered when one of their inputs may spend an indexed output.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The transaction id.
    pub id: Hash,
    /// Millisecond timestamp inherited from the enclosing block, or the
    /// ingest time for mempool transactions.
    pub time: i64,
    /// The transaction inputs, each a single previous-outpoint reference.
    pub inputs: Vec<transparent::Input>,
    /// The transaction outputs.
    pub outputs: Vec<transparent::Output>,
}

impl Transaction {
    /// Returns `true` if this transaction's only input is a coinbase input.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1
            && matches!(self.inputs.get(0), Some(transparent::Input::Coinbase))
    }

    /// Iterate the contract-bearing outputs together with their indexes.
    pub fn contract_outputs(
        &self,
    ) -> impl Iterator<Item = (u32, &transparent::Output, &Contract)> {
        self.outputs
            .iter()
            .enumerate()
            .filter_map(|(index, output)| {
                output
                    .contract
                    .as_ref()
                    .map(|contract| (index as u32, output, contract))
            })
    }

    /// Iterate the previous outpoints this transaction spends, skipping
    /// coinbase inputs.
    pub fn spent_outpoints(&self) -> impl Iterator<Item = &transparent::OutPoint> {
        self.inputs.iter().filter_map(|input| input.outpoint())
    }
}
