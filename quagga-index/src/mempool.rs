//! The mempool manager: parallel shadow indexes for unconfirmed
//! transactions.
//!
//! Shadow stores are unsharded and keyed per row
//! (`{owner}_{tx_id}:{vout}`), so confirmation cleanup can remove
//! exactly the rows a block just made redundant, and owner queries are
//! prefix scans. The whole subsystem is advisory: any per-transaction
//! error is logged and skipped, and a crash simply loses the shadow
//! state; a rebuild refetches the mempool from the node.

use std::fmt;
use std::sync::{Arc, RwLock};

use crossbeam_channel::{select, Receiver};
use quagga_chain::contract::{Contract, ContractKind, TokenFamily, TokenKey};
use quagga_chain::record::{
    DecodeRecord, EncodeRecord, FtInfoRow, GenesisRow, GenesisUtxoRow, NftInfoRow, OutputRow,
    RecordError, SellRow, SpendRow, UniqueSpendRow, UsedRow,
};
use quagga_chain::transaction::{self, Transaction};
use quagga_chain::transparent::OutPoint;
use quagga_store::{Config as StoreConfig, PlainStore};
use tracing::{debug, info, warn};

use crate::adapter::{ChainAdapter, TransactionDecoder};
use crate::shutdown::StopSignal;
use crate::stores::{family_of, FamilyStores};
use crate::{IndexError, Result};


/// One row's ownership coordinates, as delivered to the cleanup path:
/// the address-keyed and family-keyed shadow rows for `outpoint`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RowOwner {
    pub address: String,
    pub contract_key: String,
    pub outpoint: OutPoint,
}

/// Everything a confirmed block displaces from the mempool: the
/// contract outputs it created, the outpoints it consumed, and the
/// transactions it contains.
#[derive(Clone, Debug, Default)]
pub struct ConfirmedDelta {
    pub income: Vec<RowOwner>,
    pub spends: Vec<RowOwner>,
    pub tx_ids: Vec<transaction::Hash>,
}

/// A mempool row wrapper carrying the ingest timestamp as its first
/// field: `{time}@{inner row}`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Stamped<T> {
    pub time: i64,
    pub row: T,
}

impl<T: EncodeRecord> EncodeRecord for Stamped<T> {
    fn encode_record(&self, out: &mut String) -> std::result::Result<(), RecordError> {
        use std::fmt::Write as _;
        let _ = write!(out, "{}@", self.time);
        self.row.encode_record(out)
    }
}

impl<T: DecodeRecord> DecodeRecord for Stamped<T> {
    fn decode_record(segment: &str) -> std::result::Result<Self, RecordError> {
        let (time, rest) = segment
            .split_once('@')
            .ok_or_else(|| RecordError::UnknownTag(segment.to_string()))?;
        Ok(Stamped {
            time: time.parse()?,
            row: T::decode_record(rest)?,
        })
    }
}

/// The shadow-store row key: `{owner}_{outpoint}`.
pub(crate) fn owner_key(owner: &str, outpoint: impl fmt::Display) -> String {
    format!("{}_{}", owner, outpoint)
}

/// The unsharded shadow stores for one family.
pub struct MempoolStores {
    pub utxo: PlainStore,
    pub address_income: PlainStore,
    pub code_income: PlainStore,
    pub address_spend: PlainStore,
    pub code_spend: PlainStore,
    pub income_valid: PlainStore,
    pub info: PlainStore,
    pub summary_info: PlainStore,
    pub genesis: PlainStore,
    pub genesis_utxo: PlainStore,
    pub genesis_output: PlainStore,
    pub uncheck: PlainStore,
    pub used_income: PlainStore,
    pub verify_tx: PlainStore,
    pub unique_income: Option<PlainStore>,
    pub unique_spend: Option<PlainStore>,
    pub sell_address_income: Option<PlainStore>,
    pub sell_address_spend: Option<PlainStore>,
    pub sell_code_income: Option<PlainStore>,
    pub sell_code_spend: Option<PlainStore>,
}

impl MempoolStores {
    /// Open every shadow store of the family under `data_dir/mempool/`.
    pub fn open(config: &StoreConfig, family: TokenFamily) -> Result<MempoolStores> {
        let f = family.as_str();
        let open = |name: String| -> Result<PlainStore> {
            let dir = config.plain_dir(&format!("mempool/{}", name));
            Ok(PlainStore::open(&format!("mempool_{}", name), dir)?)
        };

        let (unique_income, unique_spend) = match family {
            TokenFamily::Ft => (
                Some(open(format!("unique_{}_income", f))?),
                Some(open(format!("unique_{}_spend", f))?),
            ),
            TokenFamily::Nft => (None, None),
        };
        let (sell_address_income, sell_address_spend, sell_code_income, sell_code_spend) =
            match family {
                TokenFamily::Nft => (
                    Some(open(format!("address_sell_{}_income", f))?),
                    Some(open(format!("address_sell_{}_spend", f))?),
                    Some(open(format!("codeHash_genesis_sell_{}_income", f))?),
                    Some(open(format!("codeHash_genesis_sell_{}_spend", f))?),
                ),
                TokenFamily::Ft => (None, None, None, None),
            };

        Ok(MempoolStores {
            utxo: open(format!("contract_{}_utxo", f))?,
            address_income: open(format!("address_{}_income", f))?,
            code_income: open(format!("codeHash_genesis_{}_income", f))?,
            address_spend: open(format!("address_{}_spend", f))?,
            code_spend: open(format!("codeHash_genesis_{}_spend", f))?,
            income_valid: open(format!("address_{}_income_valid", f))?,
            info: open(format!("contract_{}_info", f))?,
            summary_info: open(format!("contract_{}_summary_info", f))?,
            genesis: open(format!("contract_{}_genesis", f))?,
            genesis_utxo: open(format!("contract_{}_genesis_utxo", f))?,
            genesis_output: open(format!("contract_{}_genesis_output", f))?,
            uncheck: open(format!("uncheck_{}_outpoint", f))?,
            used_income: open(format!("used_{}_income", f))?,
            verify_tx: open(format!("verify_{}_tx", f))?,
            unique_income,
            unique_spend,
            sell_address_income,
            sell_address_spend,
            sell_code_income,
            sell_code_spend,
        })
    }

    /// Destroy and recreate every shadow store.
    fn wipe(self) -> Result<MempoolStores> {
        let wipe_opt = |store: Option<PlainStore>| -> Result<Option<PlainStore>> {
            store.map(|s| s.wipe().map_err(IndexError::from)).transpose()
        };
        Ok(MempoolStores {
            utxo: self.utxo.wipe()?,
            address_income: self.address_income.wipe()?,
            code_income: self.code_income.wipe()?,
            address_spend: self.address_spend.wipe()?,
            code_spend: self.code_spend.wipe()?,
            income_valid: self.income_valid.wipe()?,
            info: self.info.wipe()?,
            summary_info: self.summary_info.wipe()?,
            genesis: self.genesis.wipe()?,
            genesis_utxo: self.genesis_utxo.wipe()?,
            genesis_output: self.genesis_output.wipe()?,
            uncheck: self.uncheck.wipe()?,
            used_income: self.used_income.wipe()?,
            verify_tx: self.verify_tx.wipe()?,
            unique_income: wipe_opt(self.unique_income)?,
            unique_spend: wipe_opt(self.unique_spend)?,
            sell_address_income: wipe_opt(self.sell_address_income)?,
            sell_address_spend: wipe_opt(self.sell_address_spend)?,
            sell_code_income: wipe_opt(self.sell_code_income)?,
            sell_code_spend: wipe_opt(self.sell_code_spend)?,
        })
    }

    /// Look one outpoint up in the canonical shadow mirror.
    pub fn canonical_row(&self, outpoint: &OutPoint) -> Result<Option<OutputRow>> {
        let value = match self.utxo.get_string(&outpoint.hash.to_string())? {
            Some(value) => value,
            None => return Ok(None),
        };
        let (rows, corrupt) = quagga_chain::record::decode_rows_lossy::<OutputRow>(&value);
        if corrupt > 0 {
            warn!(key = %outpoint.hash, corrupt, "corrupt mempool canonical segments");
        }
        Ok(rows.into_iter().find(|row| row.vout == outpoint.index))
    }
}

/// The mempool manager for one family.
pub struct MempoolManager {
    family: TokenFamily,
    confirmed: Arc<FamilyStores>,
    stores: RwLock<Option<MempoolStores>>,
}

impl MempoolManager {
    pub fn new(
        config: &StoreConfig,
        family: TokenFamily,
        confirmed: Arc<FamilyStores>,
    ) -> Result<MempoolManager> {
        let stores = MempoolStores::open(config, family)?;
        Ok(MempoolManager {
            family,
            confirmed,
            stores: RwLock::new(Some(stores)),
        })
    }

    pub fn family(&self) -> TokenFamily {
        self.family
    }

    /// Run a closure against the shadow stores.
    pub fn with_stores<R>(&self, f: impl FnOnce(&MempoolStores) -> Result<R>) -> Result<R> {
        let guard = self.stores.read().expect("mempool store lock");
        let stores = guard.as_ref().expect("mempool stores live outside rebuild");
        f(stores)
    }

    /// Canonical-mirror lookup used by the confirmed input resolver.
    pub fn canonical_row(&self, outpoint: &OutPoint) -> Result<Option<OutputRow>> {
        self.with_stores(|stores| stores.canonical_row(outpoint))
    }

    /// Decode and ingest one raw transaction. Errors are logged and
    /// swallowed: the mempool is advisory and one bad transaction must
    /// not block the feed.
    pub fn ingest_raw(&self, raw: &[u8], decoder: &dyn TransactionDecoder) {
        let tx = match decoder.decode_transaction(raw) {
            Ok(tx) => tx,
            Err(error) => {
                warn!(%error, bytes = raw.len(), "undecodable raw transaction; skipped");
                return;
            }
        };
        let id = tx.id;
        if let Err(error) = self.ingest_transaction(&tx) {
            warn!(%error, tx = %id, "failed to ingest mempool transaction; skipped");
        }
    }

    /// Ingest one parsed unconfirmed transaction: an output pass and an
    /// input pass mirroring the confirmed pipeline, written to the
    /// shadow stores with ingest timestamps and height 0.
    pub fn ingest_transaction(&self, tx: &Transaction) -> Result<()> {
        self.with_stores(|stores| {
            let mut saw_contract = false;
            for (vout, output, contract) in tx.contract_outputs() {
                if family_of(contract.kind()) != self.family {
                    continue;
                }
                self.ingest_output(stores, tx, vout, output, contract)?;
                saw_contract = true;
            }
            if saw_contract {
                stores.verify_tx.set(&tx.id.to_string(), "1")?;
            }

            for outpoint in tx.spent_outpoints() {
                if outpoint.is_coinbase() {
                    continue;
                }
                self.ingest_spend(stores, tx, outpoint)?;
            }

            metrics::counter!(
                "mempool.tx.ingested",
                1,
                "family" => self.family.as_str()
            );
            Ok(())
        })
    }

    fn ingest_output(
        &self,
        stores: &MempoolStores,
        tx: &Transaction,
        vout: u32,
        output: &quagga_chain::transparent::Output,
        contract: &Contract,
    ) -> Result<()> {
        // Height 0 marks the row unconfirmed; the stamp carries the
        // ingest time.
        let row = OutputRow::from_output(tx.id, vout, output, contract, 0);
        let stamped = Stamped {
            time: tx.time,
            row: row.clone(),
        };
        let segment = stamped.to_record()?;
        let contract_key = row.contract_key();
        let outpoint = row.outpoint().to_string();

        stores
            .utxo
            .merge(&tx.id.to_string(), &row.to_record()?)?;

        match contract {
            Contract::Ft(info) => {
                stores
                    .address_income
                    .set(&owner_key(&row.address, &outpoint), &segment)?;
                stores
                    .code_income
                    .set(&owner_key(&contract_key, &outpoint), &segment)?;
                stores.uncheck.set(&outpoint, &segment)?;
                if row.sensible_id.is_sentinel() {
                    self.record_genesis(stores, &row, &outpoint)?;
                } else {
                    let info_row = FtInfoRow {
                        sensible_id: info.sensible_id.clone(),
                        name: info.name.clone(),
                        symbol: info.symbol.clone(),
                        decimal: info.decimal,
                    };
                    set_once(&stores.info, &contract_key, &info_row.to_record()?)?;
                    set_once(&stores.summary_info, &contract_key, &info_row.to_record()?)?;
                }
            }
            Contract::Nft(info) => {
                stores
                    .address_income
                    .set(&owner_key(&row.address, &outpoint), &segment)?;
                stores
                    .code_income
                    .set(&owner_key(&contract_key, &outpoint), &segment)?;
                stores.uncheck.set(&outpoint, &segment)?;
                if row.sensible_id.is_sentinel() {
                    self.record_genesis(stores, &row, &outpoint)?;
                } else {
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
                    set_once(&stores.info, &token_key, &info_row.to_record()?)?;
                    set_once(&stores.summary_info, &contract_key, &info_row.to_record()?)?;
                    if info.token_index != 0 && info.meta_is_placeholder() {
                        self.record_genesis_utxo(stores, &row, &outpoint)?;
                    }
                }
            }
            Contract::Unique(_) => {
                if let Some(unique_income) = &stores.unique_income {
                    unique_income.set(&owner_key(&contract_key, &outpoint), &segment)?;
                }
            }
            Contract::NftSell(info) => {
                let sell = Stamped {
                    time: tx.time,
                    row: SellRow {
                        tx_id: tx.id,
                        vout,
                        code_hash: info.code_hash.clone(),
                        genesis: info.genesis.clone(),
                        price: info.price,
                        contract_address: info.contract_address.clone(),
                        value: output.value,
                        height: 0,
                    },
                };
                let sell_segment = sell.to_record()?;
                if let Some(store) = &stores.sell_address_income {
                    store.set(&owner_key(&info.nft_address, &outpoint), &sell_segment)?;
                }
                if let Some(store) = &stores.sell_code_income {
                    store.set(&owner_key(&contract_key, &outpoint), &sell_segment)?;
                }
            }
        }
        Ok(())
    }

    fn record_genesis(
        &self,
        stores: &MempoolStores,
        row: &OutputRow,
        outpoint: &str,
    ) -> Result<()> {
        let genesis_row = GenesisRow {
            code_hash: row.code_hash.clone(),
            genesis: row.genesis.clone(),
            sensible_id: row.sensible_id.clone(),
            quantity: row.quantity,
            height: 0,
        };
        set_once(&stores.genesis, outpoint, &genesis_row.to_record()?)?;
        self.record_genesis_utxo(stores, row, outpoint)
    }

    fn record_genesis_utxo(
        &self,
        stores: &MempoolStores,
        row: &OutputRow,
        outpoint: &str,
    ) -> Result<()> {
        let descriptor = GenesisUtxoRow {
            address: row.address.clone(),
            code_hash: row.code_hash.clone(),
            genesis: row.genesis.clone(),
            sensible_id: row.sensible_id.clone(),
            quantity: row.quantity,
            value: row.value,
            height: 0,
            spent: false,
        };
        set_once(&stores.genesis_utxo, outpoint, &descriptor.to_record()?)
    }

    /// The mempool input pass: resolve against the *confirmed*
    /// canonical store first, then the shadow mirror, then drop.
    fn ingest_spend(
        &self,
        stores: &MempoolStores,
        tx: &Transaction,
        outpoint: &OutPoint,
    ) -> Result<()> {
        let resolved = self.confirmed.query_previous_outputs(&[*outpoint])?;
        let row = match resolved.get(outpoint) {
            Some(row) => Some(row.clone()),
            None => stores.canonical_row(outpoint)?,
        };
        let row = match row {
            Some(row) => row,
            None => return Ok(()),
        };

        let contract_key = row.contract_key();
        let outpoint_key = outpoint.to_string();

        let used = UsedRow {
            address: row.address.clone(),
            code_hash: row.code_hash.clone(),
            genesis: row.genesis.clone(),
            sensible_id: row.sensible_id.clone(),
            quantity: row.quantity,
            prev_tx_id: outpoint.hash,
            prev_vout: outpoint.index,
            value: row.value,
            height: row.height,
        };
        stores
            .used_income
            .merge(&tx.id.to_string(), &used.to_record()?)?;

        let spend = Stamped {
            time: tx.time,
            row: SpendRow {
                prev_tx_id: outpoint.hash,
                prev_vout: outpoint.index,
                code_hash: row.code_hash.clone(),
                genesis: row.genesis.clone(),
                sensible_id: row.sensible_id.clone(),
                quantity: row.quantity,
                value: row.value,
                height: 0,
                spending_tx_id: tx.id,
            },
        };
        let spend_segment = spend.to_record()?;

        match row.kind {
            ContractKind::Ft | ContractKind::Nft => {
                stores
                    .address_spend
                    .set(&owner_key(&row.address, &outpoint_key), &spend_segment)?;
                stores
                    .code_spend
                    .set(&owner_key(&contract_key, &outpoint_key), &spend_segment)?;
            }
            ContractKind::Unique => {
                if let Some(unique_spend) = &stores.unique_spend {
                    let unique = UniqueSpendRow {
                        prev_tx_id: outpoint.hash,
                        prev_vout: outpoint.index,
                        spending_tx_id: tx.id,
                    };
                    unique_spend.set(
                        &owner_key(&contract_key, &outpoint_key),
                        &unique.to_record()?,
                    )?;
                }
            }
            ContractKind::NftSell => {
                // Key by the seller, mirroring the income side.
                if let Some(store) = &stores.sell_address_spend {
                    store.set(
                        &owner_key(row.owner_address(), &outpoint_key),
                        &spend_segment,
                    )?;
                }
                if let Some(store) = &stores.sell_code_spend {
                    store.set(&owner_key(&contract_key, &outpoint_key), &spend_segment)?;
                }
            }
        }

        // Mirror the genesis spend tracking on the shadow stores.
        if let Some(value) = stores.genesis_utxo.get_string(&outpoint_key)? {
            if let Ok(descriptor) = GenesisUtxoRow::decode_record(&value) {
                if !descriptor.spent {
                    stores
                        .genesis_utxo
                        .set(&outpoint_key, &descriptor.into_spent().to_record()?)?;
                }
            }
            for (vout, output, contract) in tx.contract_outputs() {
                if family_of(contract.kind()) != self.family {
                    continue;
                }
                let produced = OutputRow::from_output(tx.id, vout, output, contract, 0);
                stores
                    .genesis_output
                    .merge(&outpoint_key, &produced.to_record()?)?;
            }
        }
        Ok(())
    }

    /// Remove every shadow row a confirmed block displaced.
    pub fn confirm_block(&self, delta: &ConfirmedDelta) -> Result<usize> {
        self.with_stores(|stores| {
            let mut removed = 0usize;

            for owner in &delta.income {
                let outpoint = owner.outpoint.to_string();
                let address_key = owner_key(&owner.address, &outpoint);
                let code_key = owner_key(&owner.contract_key, &outpoint);

                removed += delete_counting(&stores.address_income, &address_key)?;
                removed += delete_counting(&stores.code_income, &code_key)?;
                removed += delete_counting(&stores.income_valid, &address_key)?;
                removed += delete_counting(&stores.uncheck, &outpoint)?;
                if let Some(store) = &stores.unique_income {
                    removed += delete_counting(store, &code_key)?;
                }
                if let Some(store) = &stores.sell_address_income {
                    removed += delete_counting(store, &address_key)?;
                }
                if let Some(store) = &stores.sell_code_income {
                    removed += delete_counting(store, &code_key)?;
                }
            }

            for owner in &delta.spends {
                let outpoint = owner.outpoint.to_string();
                let address_key = owner_key(&owner.address, &outpoint);
                let code_key = owner_key(&owner.contract_key, &outpoint);

                removed += delete_counting(&stores.address_spend, &address_key)?;
                removed += delete_counting(&stores.code_spend, &code_key)?;
                if let Some(store) = &stores.unique_spend {
                    removed += delete_counting(store, &code_key)?;
                }
                if let Some(store) = &stores.sell_address_spend {
                    removed += delete_counting(store, &address_key)?;
                }
                if let Some(store) = &stores.sell_code_spend {
                    removed += delete_counting(store, &code_key)?;
                }
            }

            for tx_id in &delta.tx_ids {
                let key = tx_id.to_string();
                removed += delete_counting(&stores.verify_tx, &key)?;
                removed += delete_counting(&stores.utxo, &key)?;
                removed += delete_counting(&stores.used_income, &key)?;
            }

            if removed > 0 {
                metrics::counter!(
                    "mempool.rows.confirmed",
                    removed as u64,
                    "family" => self.family.as_str()
                );
                debug!(family = %self.family, removed, "mempool cleanup after block");
            }
            Ok(removed)
        })
    }

    /// Wipe the shadow databases and replay the node's current mempool.
    ///
    /// Called on first-sync completion; also the crash-recovery path.
    pub fn rebuild(&self, adapter: &dyn ChainAdapter) -> Result<()> {
        {
            let mut guard = self.stores.write().expect("mempool store lock");
            let stores = guard.take().expect("mempool stores live outside rebuild");
            *guard = Some(stores.wipe()?);
        }

        let ids = adapter.raw_mempool().map_err(IndexError::adapter)?;
        info!(
            family = %self.family,
            transactions = ids.len(),
            "rebuilding mempool from node"
        );
        for id in ids {
            match adapter.get_transaction(id) {
                Ok(tx) => {
                    if let Err(error) = self.ingest_transaction(&tx) {
                        warn!(%error, tx = %id, "mempool rebuild skipped transaction");
                    }
                }
                Err(error) => {
                    warn!(%error, tx = %id, "mempool rebuild could not fetch transaction");
                }
            }
        }
        Ok(())
    }
}

fn set_once(store: &PlainStore, key: &str, value: &str) -> Result<()> {
    if store.get(key)?.is_none() {
        store.set(key, value)?;
    }
    Ok(())
}

fn delete_counting(store: &PlainStore, key: &str) -> Result<usize> {
    if store.get(key)?.is_some() {
        store.delete(key)?;
        Ok(1)
    } else {
        Ok(0)
    }
}

/// Bridge a raw-transaction feed into a manager-owned worker thread.
///
/// The source's handler only enqueues bytes; the worker drains the
/// queue and exits when the stop signal fires or the source hangs up.
pub fn run_listener(
    manager: Arc<MempoolManager>,
    decoder: Arc<dyn TransactionDecoder>,
    rawtx: Receiver<Vec<u8>>,
    stop: StopSignal,
) {
    loop {
        select! {
            recv(stop.receiver()) -> _ => break,
            recv(rawtx) -> msg => match msg {
                Ok(raw) => manager.ingest_raw(&raw, &*decoder),
                Err(_) => break,
            },
        }
    }
    debug!(family = %manager.family(), "mempool listener stopped");
}
