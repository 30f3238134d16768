//! Phase 2 of block processing: the input resolver.
//!
//! Runs strictly after the output pass, so previous outputs created
//! earlier in the same block are already in the canonical store. Each
//! input's outpoint is resolved against `contract_*_utxo` (falling
//! back to the mempool's canonical mirror for outputs that were only
//! seen unconfirmed), classified by contract kind, and fanned out into
//! the spend, owner, history, lineage, and genesis-tracking stores.
//! Inputs that resolve to nothing reference non-contract outputs and
//! are dropped silently. Coinbase inputs are skipped unconditionally.

use std::collections::HashMap;
use std::sync::Arc;

use quagga_chain::block::Block;
use quagga_chain::contract::ContractKind;
use quagga_chain::record::{
    DecodeRecord, EncodeRecord, GenesisUtxoRow, HistoryKind, HistoryRow, OutputRow, OwnerRow,
    SpendRow, UniqueSpendRow, UsedRow,
};
use quagga_chain::transaction::Transaction;
use quagga_chain::transparent::OutPoint;
use tracing::{debug, trace, warn};

use crate::buffer::MergeBuffer;
use crate::mempool::{ConfirmedDelta, MempoolManager, RowOwner};
use crate::stores::FamilyStores;
use crate::Result;

#[derive(Default)]
struct InputBuffers {
    address_spend: MergeBuffer,
    code_spend: MergeBuffer,
    owners_spend: MergeBuffer,
    address_history: MergeBuffer,
    genesis_history: MergeBuffer,
    used_income: MergeBuffer,
    genesis_output: MergeBuffer,
    unique_spend: MergeBuffer,
    sell_address_spend: MergeBuffer,
    sell_code_spend: MergeBuffer,
}

impl InputBuffers {
    fn flush(&mut self, stores: &FamilyStores) -> Result<()> {
        self.address_spend.flush(&stores.address_spend)?;
        self.code_spend.flush(&stores.code_spend)?;
        self.owners_spend.flush(&stores.owners_spend)?;
        self.address_history.flush(&stores.address_history)?;
        self.genesis_history.flush(&stores.genesis_history)?;
        self.used_income.flush(&stores.used_income)?;
        self.genesis_output.flush(&stores.genesis_output)?;
        if let Some(unique) = stores.unique() {
            self.unique_spend.flush(&unique.spend)?;
        }
        if let Some(sell) = stores.sell() {
            self.sell_address_spend.flush(&sell.address_spend)?;
            self.sell_code_spend.flush(&sell.code_spend)?;
        }
        Ok(())
    }
}

/// Run the input pass for one block (or partial block), recording the
/// consumed outpoints into `delta` for the later mempool cleanup.
pub fn resolve_block(
    stores: &FamilyStores,
    mempool: Option<&MempoolManager>,
    block: &Block,
    batch_size: usize,
    delta: &mut ConfirmedDelta,
) -> Result<()> {
    let mut resolved_total = 0u64;

    for batch in block.transactions.chunks(batch_size.max(1)) {
        resolved_total += resolve_batch(stores, mempool, block, batch, delta)?;
    }

    metrics::counter!(
        "index.inputs.resolved",
        resolved_total,
        "family" => stores.family.as_str()
    );
    debug!(
        family = %stores.family,
        height = block.height.0,
        inputs = resolved_total,
        partial = block.is_partial,
        "input pass complete"
    );
    Ok(())
}

fn resolve_batch(
    stores: &FamilyStores,
    mempool: Option<&MempoolManager>,
    block: &Block,
    batch: &[Arc<Transaction>],
    delta: &mut ConfirmedDelta,
) -> Result<u64> {
    // Collect every non-coinbase outpoint, remembering which
    // transaction consumes it.
    let mut tx_point_used: HashMap<OutPoint, &Arc<Transaction>> = HashMap::new();
    let mut outpoints: Vec<OutPoint> = Vec::new();
    for tx in batch {
        for outpoint in tx.spent_outpoints() {
            if outpoint.is_coinbase() {
                continue;
            }
            tx_point_used.insert(*outpoint, tx);
            outpoints.push(*outpoint);
        }
    }
    if outpoints.is_empty() {
        return Ok(0);
    }

    // Canonical resolution first, mempool canonical mirror second.
    let mut resolved = stores.query_previous_outputs(&outpoints)?;
    if let Some(mempool) = mempool {
        for outpoint in &outpoints {
            if resolved.contains_key(outpoint) {
                continue;
            }
            if let Some(row) = mempool.canonical_row(outpoint)? {
                resolved.insert(*outpoint, row);
            }
        }
    }

    // Genesis hits among the consumed outpoints.
    let genesis_keys: Vec<String> = outpoints.iter().map(|op| op.to_string()).collect();
    let genesis_hits = stores
        .genesis_utxo
        .bulk_query(genesis_keys.iter().map(|k| k.as_str()))?;

    let mut buffers = InputBuffers::default();
    let mut resolved_count = 0u64;

    for tx in batch {
        for outpoint in tx.spent_outpoints() {
            if outpoint.is_coinbase() {
                continue;
            }
            let row = match resolved.get(outpoint) {
                Some(row) => row,
                // Not a contract output; drop silently.
                None => continue,
            };
            emit_spend(&mut buffers, stores, block, tx, *outpoint, row, delta)?;
            resolved_count += 1;
        }
    }

    // Track consumed genesis outputs: flag each descriptor spent and
    // link the genesis outpoint to the outputs its spender produced.
    for (key, value) in &genesis_hits {
        let outpoint: OutPoint = match key.parse() {
            Ok(outpoint) => outpoint,
            Err(_) => continue,
        };
        let tx = match tx_point_used.get(&outpoint) {
            Some(tx) => *tx,
            None => continue,
        };
        mark_genesis_spent(stores, key, value)?;
        for (vout, output, contract) in tx.contract_outputs() {
            if crate::stores::family_of(contract.kind()) != stores.family {
                continue;
            }
            let produced = OutputRow::from_output(tx.id, vout, output, contract, block.height.0);
            buffers.genesis_output.push(key.clone(), &produced)?;
        }
    }

    buffers.flush(stores)?;
    Ok(resolved_count)
}

/// Fan one resolved input out into the spend-side stores.
fn emit_spend(
    buffers: &mut InputBuffers,
    stores: &FamilyStores,
    block: &Block,
    tx: &Transaction,
    outpoint: OutPoint,
    row: &OutputRow,
    delta: &mut ConfirmedDelta,
) -> Result<()> {
    let contract_key = row.contract_key();

    // Lineage: what did this transaction consume? Read by the verifier.
    buffers.used_income.push(
        tx.id.to_string(),
        &UsedRow {
            address: row.address.clone(),
            code_hash: row.code_hash.clone(),
            genesis: row.genesis.clone(),
            sensible_id: row.sensible_id.clone(),
            quantity: row.quantity,
            prev_tx_id: outpoint.hash,
            prev_vout: outpoint.index,
            value: row.value,
            height: row.height,
        },
    )?;

    let spend = SpendRow {
        prev_tx_id: outpoint.hash,
        prev_vout: outpoint.index,
        code_hash: row.code_hash.clone(),
        genesis: row.genesis.clone(),
        sensible_id: row.sensible_id.clone(),
        quantity: row.quantity,
        value: row.value,
        height: block.height.0,
        spending_tx_id: tx.id,
    };

    match row.kind {
        ContractKind::Ft | ContractKind::Nft => {
            buffers.address_spend.push(row.address.clone(), &spend)?;
            buffers.code_spend.push(contract_key.clone(), &spend)?;
            buffers.owners_spend.push(
                contract_key.clone(),
                &OwnerRow {
                    address: row.address.clone(),
                    quantity: row.quantity,
                    tx_id: outpoint.hash,
                    vout: outpoint.index,
                },
            )?;

            let history = HistoryRow {
                tx_id: tx.id,
                time: tx.time,
                kind: HistoryKind::Outcome,
                height: block.height.0,
            };
            buffers.address_history.push(row.address.clone(), &history)?;
            buffers
                .genesis_history
                .push(contract_key.clone(), &history)?;
        }
        ContractKind::Unique => {
            buffers.unique_spend.push(
                contract_key.clone(),
                &UniqueSpendRow {
                    prev_tx_id: outpoint.hash,
                    prev_vout: outpoint.index,
                    spending_tx_id: tx.id,
                },
            )?;
        }
        ContractKind::NftSell => {
            // Key by the seller, mirroring the income side; the row's
            // own address is the sell contract.
            buffers
                .sell_address_spend
                .push(row.owner_address().to_string(), &spend)?;
            buffers.sell_code_spend.push(contract_key.clone(), &spend)?;
        }
    }

    delta.spends.push(RowOwner {
        address: row.owner_address().to_string(),
        contract_key,
        outpoint,
    });
    Ok(())
}

/// Rewrite a consumed genesis descriptor with the trailing spent flag.
/// Uses `set`, not `merge`: this is one of the three sanctioned
/// rewrites of otherwise append-only state.
fn mark_genesis_spent(stores: &FamilyStores, key: &str, value: &str) -> Result<()> {
    let descriptor = match GenesisUtxoRow::decode_record(last_segment(value)) {
        Ok(descriptor) => descriptor,
        Err(error) => {
            warn!(
                store = stores.genesis_utxo.name(),
                key,
                %error,
                "corrupt genesis descriptor; leaving untouched"
            );
            return Ok(());
        }
    };
    if descriptor.spent {
        return Ok(());
    }
    let spent = descriptor.into_spent().to_record()?;
    stores.genesis_utxo.set(key, &spent)?;
    trace!(key, "genesis outpoint consumed");
    Ok(())
}

/// A genesis descriptor is a singleton, but a replayed block may have
/// appended a duplicate segment; the newest segment is authoritative.
fn last_segment(value: &str) -> &str {
    value.split(',').rev().find(|s| !s.is_empty()).unwrap_or("")
}
