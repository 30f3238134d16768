//! Phase 1 of block processing: the output indexer.
//!
//! For every contract output of every transaction, in transaction and
//! output order: emit the canonical row into `contract_*_utxo`, then
//! fan out per contract kind into the income, metadata, genesis,
//! owner, history, and uncheck stores. Rows accumulate in per-store
//! buffers and flush every `batch_size` transactions.
//!
//! Re-running this pass over the same block only duplicates merge
//! segments; readers dedup by `(tx_id, vout)`, and crash recovery
//! relies on the last-height pointer rather than replay detection.

use quagga_chain::block::Block;
use quagga_chain::contract::{Contract, TokenKey};
use quagga_chain::record::{
    FtInfoRow, GenesisRow, GenesisUtxoRow, HistoryKind, HistoryRow, NftInfoRow, OutputRow,
    OwnerRow, SellRow,
};
use quagga_chain::transaction::Transaction;
use tracing::{debug, trace};

use crate::buffer::{MergeBuffer, WriteOnceBuffer};
use crate::mempool::{ConfirmedDelta, RowOwner};
use crate::stores::{family_of, FamilyStores};
use crate::Result;

#[derive(Default)]
struct OutputBuffers {
    utxo: MergeBuffer,
    address_income: MergeBuffer,
    code_income: MergeBuffer,
    owners_income: MergeBuffer,
    address_history: MergeBuffer,
    genesis_history: MergeBuffer,
    uncheck: MergeBuffer,
    unique_income: MergeBuffer,
    sell_address_income: MergeBuffer,
    sell_code_income: MergeBuffer,
    genesis: WriteOnceBuffer,
    genesis_utxo: WriteOnceBuffer,
    info: WriteOnceBuffer,
    summary_info: WriteOnceBuffer,
}

impl OutputBuffers {
    /// Flush every buffer; all flushes of a batch must succeed before
    /// the next batch starts.
    fn flush(&mut self, stores: &FamilyStores) -> Result<()> {
        self.utxo.flush(&stores.utxo)?;
        self.address_income.flush(&stores.address_income)?;
        self.code_income.flush(&stores.code_income)?;
        self.owners_income.flush(&stores.owners_income)?;
        self.address_history.flush(&stores.address_history)?;
        self.genesis_history.flush(&stores.genesis_history)?;
        self.uncheck.flush(&stores.uncheck)?;
        if let Some(unique) = stores.unique() {
            self.unique_income.flush(&unique.income)?;
        }
        if let Some(sell) = stores.sell() {
            self.sell_address_income.flush(&sell.address_income)?;
            self.sell_code_income.flush(&sell.code_income)?;
        }
        self.genesis.flush(&stores.genesis)?;
        self.genesis_utxo.flush(&stores.genesis_utxo)?;
        self.info.flush(&stores.info)?;
        self.summary_info.flush(&stores.summary_info)?;
        Ok(())
    }
}

/// Run the output pass for one block (or partial block) against one
/// family's stores, recording the emitted income rows and transaction
/// ids into `delta` for the later mempool cleanup.
pub fn index_block(
    stores: &FamilyStores,
    block: &Block,
    batch_size: usize,
    delta: &mut ConfirmedDelta,
) -> Result<()> {
    let height = block.height.0;
    let mut buffers = OutputBuffers::default();
    let mut emitted = 0u64;

    for (processed, tx) in block.transactions.iter().enumerate() {
        delta.tx_ids.push(tx.id);

        for (vout, output, contract) in tx.contract_outputs() {
            if family_of(contract.kind()) != stores.family {
                continue;
            }
            let row = OutputRow::from_output(tx.id, vout, output, contract, height);
            buffers.utxo.push(tx.id.to_string(), &row)?;

            match contract {
                Contract::Ft(_) | Contract::Nft(_) => {
                    index_token_output(&mut buffers, tx, &row, contract, delta)?;
                }
                Contract::Unique(_) => {
                    buffers.unique_income.push(row.contract_key(), &row)?;
                    delta.income.push(RowOwner {
                        address: row.address.clone(),
                        contract_key: row.contract_key(),
                        outpoint: row.outpoint(),
                    });
                }
                Contract::NftSell(info) => {
                    let sell = SellRow {
                        tx_id: tx.id,
                        vout,
                        code_hash: info.code_hash.clone(),
                        genesis: info.genesis.clone(),
                        price: info.price,
                        contract_address: info.contract_address.clone(),
                        value: output.value,
                        height,
                    };
                    buffers
                        .sell_address_income
                        .push(info.nft_address.clone(), &sell)?;
                    buffers.sell_code_income.push(row.contract_key(), &sell)?;
                    delta.income.push(RowOwner {
                        address: info.nft_address.clone(),
                        contract_key: row.contract_key(),
                        outpoint: row.outpoint(),
                    });
                }
            }
            emitted += 1;
        }

        if (processed + 1) % batch_size == 0 {
            trace!(
                height,
                processed = processed + 1,
                "flushing output batch"
            );
            buffers.flush(stores)?;
        }
    }
    buffers.flush(stores)?;

    metrics::counter!(
        "index.outputs.indexed",
        emitted,
        "family" => stores.family.as_str()
    );
    debug!(
        family = %stores.family,
        height,
        outputs = emitted,
        partial = block.is_partial,
        "output pass complete"
    );
    Ok(())
}

/// The shared FT/NFT fan-out: income by address and family key, owner
/// delta, history rows, the uncheck enqueue, and the write-once
/// metadata and genesis stores.
fn index_token_output(
    buffers: &mut OutputBuffers,
    tx: &Transaction,
    row: &OutputRow,
    contract: &Contract,
    delta: &mut ConfirmedDelta,
) -> Result<()> {
    let contract_key = row.contract_key();
    let outpoint_key = row.outpoint().to_string();

    buffers.address_income.push(row.address.clone(), row)?;
    buffers.code_income.push(contract_key.clone(), row)?;
    buffers.owners_income.push(
        contract_key.clone(),
        &OwnerRow {
            address: row.address.clone(),
            quantity: row.quantity,
            tx_id: row.tx_id,
            vout: row.vout,
        },
    )?;

    let history = HistoryRow {
        tx_id: row.tx_id,
        time: tx.time,
        kind: HistoryKind::Income,
        height: row.height,
    };
    buffers.address_history.push(row.address.clone(), &history)?;
    buffers
        .genesis_history
        .push(contract_key.clone(), &history)?;

    buffers.uncheck.push(outpoint_key.clone(), row)?;

    if row.sensible_id.is_sentinel() {
        // This output *is* the genesis of its family.
        buffers.genesis.put_first(
            outpoint_key.clone(),
            &GenesisRow {
                code_hash: row.code_hash.clone(),
                genesis: row.genesis.clone(),
                sensible_id: row.sensible_id.clone(),
                quantity: row.quantity,
                height: row.height,
            },
        )?;
        buffers
            .genesis_utxo
            .put_first(outpoint_key, &genesis_utxo_row(row))?;
    } else {
        match contract {
            Contract::Ft(info) => {
                let info_row = FtInfoRow {
                    sensible_id: info.sensible_id.clone(),
                    name: info.name.clone(),
                    symbol: info.symbol.clone(),
                    decimal: info.decimal,
                };
                buffers.info.put_first(contract_key.clone(), &info_row)?;
                buffers
                    .summary_info
                    .put_first(contract_key.clone(), &info_row)?;
            }
            Contract::Nft(info) => {
                let info_row = NftInfoRow {
                    sensible_id: info.sensible_id.clone(),
                    token_supply: info.token_supply,
                    meta_tx_id: info.meta_tx_id.clone(),
                    meta_vout: info.meta_vout,
                };
                let token_key = TokenKey {
                    code_hash: info.code_hash.clone(),
                    genesis: info.genesis.clone(),
                    token_index: info.token_index,
                }
                .to_string();
                buffers.info.put_first(token_key, &info_row)?;
                buffers
                    .summary_info
                    .put_first(contract_key.clone(), &info_row)?;

                // A non-zero token index with a placeholder metadata
                // pointer marks a derived (new-genesis) issuance output
                // whose spend must remain trackable.
                if info.token_index != 0 && info.meta_is_placeholder() {
                    buffers
                        .genesis_utxo
                        .put_first(outpoint_key, &genesis_utxo_row(row))?;
                }
            }
            _ => {}
        }
    }

    delta.income.push(RowOwner {
        address: row.address.clone(),
        contract_key,
        outpoint: row.outpoint(),
    });
    Ok(())
}

fn genesis_utxo_row(row: &OutputRow) -> GenesisUtxoRow {
    GenesisUtxoRow {
        address: row.address.clone(),
        code_hash: row.code_hash.clone(),
        genesis: row.genesis.clone(),
        sensible_id: row.sensible_id.clone(),
        quantity: row.quantity,
        value: row.value,
        height: row.height,
        spent: false,
    }
}
