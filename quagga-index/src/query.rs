//! Direct-read queries over the derived stores.
//!
//! There is no query cache: every call reads the committed state at
//! the last indexed height, plus whatever the mempool shadow has
//! ingested. Merge-append means raw values may carry duplicate
//! segments, so every reader dedups by `(tx_id, vout)` before any
//! arithmetic.

use std::collections::{BTreeMap, HashSet};

use quagga_chain::record::{
    decode_rows_lossy, dedup_rows, DecodeRecord, FtInfoRow, HistoryRow, NftInfoRow, OutputRow,
    OwnerRow, SpendRow,
};
use quagga_chain::transaction;
use tracing::warn;

use crate::mempool::{MempoolManager, Stamped};
use crate::stores::FamilyStores;
use crate::Result;

#[cfg(test)]
mod tests;

/// An address's position in one token family (or across all families
/// it holds when queried without a key).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Balance {
    /// Σ confirmed income quantities over distinct outpoints.
    pub confirmed_income: u64,
    /// Σ confirmed spend quantities over distinct outpoints.
    pub confirmed_spend: u64,
    /// Σ unconfirmed income quantities from the mempool shadow.
    pub pending_income: u64,
    /// Σ unconfirmed spend quantities from the mempool shadow.
    pub pending_spend: u64,
}

impl Balance {
    /// The confirmed balance.
    pub fn confirmed(&self) -> i128 {
        self.confirmed_income as i128 - self.confirmed_spend as i128
    }

    /// The balance a wallet would display: confirmed plus pending
    /// income minus pending spends.
    pub fn total(&self) -> i128 {
        self.confirmed() + self.pending_income as i128 - self.pending_spend as i128
    }
}

fn warn_corrupt(store: &str, key: &str, corrupt: usize) {
    if corrupt > 0 {
        warn!(store, key, corrupt, "skipping corrupt segments in query");
    }
}

/// The balance of `address`, optionally scoped to one ContractKey.
pub fn balance(
    stores: &FamilyStores,
    mempool: Option<&MempoolManager>,
    address: &str,
    contract_key: Option<&str>,
) -> Result<Balance> {
    let matches_key =
        |code_hash: &str, genesis: &str| match contract_key {
            Some(key) => key == format!("{}@{}", code_hash, genesis),
            None => true,
        };

    let mut balance = Balance::default();

    if let Some(value) = stores.address_income.get_string(address)? {
        let (rows, corrupt) = decode_rows_lossy::<OutputRow>(&value);
        warn_corrupt(stores.address_income.name(), address, corrupt);
        for row in dedup_rows(rows, |r| (r.tx_id, r.vout)) {
            if matches_key(&row.code_hash, &row.genesis) {
                balance.confirmed_income += row.quantity;
            }
        }
    }

    if let Some(value) = stores.address_spend.get_string(address)? {
        let (rows, corrupt) = decode_rows_lossy::<SpendRow>(&value);
        warn_corrupt(stores.address_spend.name(), address, corrupt);
        for row in dedup_rows(rows, |r| (r.prev_tx_id, r.prev_vout)) {
            if matches_key(&row.code_hash, &row.genesis) {
                balance.confirmed_spend += row.quantity;
            }
        }
    }

    if let Some(mempool) = mempool {
        let prefix = format!("{}_", address);
        mempool.with_stores(|shadow| {
            for (key, value) in shadow.address_income.scan_prefix(&prefix)? {
                match Stamped::<OutputRow>::decode_record(&value) {
                    Ok(stamped) => {
                        if matches_key(&stamped.row.code_hash, &stamped.row.genesis) {
                            balance.pending_income += stamped.row.quantity;
                        }
                    }
                    Err(_) => warn_corrupt(shadow.address_income.name(), &key, 1),
                }
            }
            for (key, value) in shadow.address_spend.scan_prefix(&prefix)? {
                match Stamped::<SpendRow>::decode_record(&value) {
                    Ok(stamped) => {
                        if matches_key(&stamped.row.code_hash, &stamped.row.genesis) {
                            balance.pending_spend += stamped.row.quantity;
                        }
                    }
                    Err(_) => warn_corrupt(shadow.address_spend.name(), &key, 1),
                }
            }
            Ok(())
        })?;
    }

    Ok(balance)
}

/// Per-address balances of one token family, from the owner-delta
/// stores, with `(tx_id, vout)` dedup on each side.
pub fn owners(stores: &FamilyStores, contract_key: &str) -> Result<BTreeMap<String, i128>> {
    let mut balances: BTreeMap<String, i128> = BTreeMap::new();

    if let Some(value) = stores.owners_income.get_string(contract_key)? {
        let (rows, corrupt) = decode_rows_lossy::<OwnerRow>(&value);
        warn_corrupt(stores.owners_income.name(), contract_key, corrupt);
        for row in dedup_rows(rows, |r| (r.tx_id, r.vout)) {
            *balances.entry(row.address).or_default() += row.quantity as i128;
        }
    }

    if let Some(value) = stores.owners_spend.get_string(contract_key)? {
        let (rows, corrupt) = decode_rows_lossy::<OwnerRow>(&value);
        warn_corrupt(stores.owners_spend.name(), contract_key, corrupt);
        for row in dedup_rows(rows, |r| (r.tx_id, r.vout)) {
            *balances.entry(row.address).or_default() -= row.quantity as i128;
        }
    }

    balances.retain(|_, balance| *balance != 0);
    Ok(balances)
}

/// Outstanding supply of one token family: the sum of every owner's
/// balance.
pub fn supply(stores: &FamilyStores, contract_key: &str) -> Result<i128> {
    Ok(owners(stores, contract_key)?.values().sum())
}

/// The income/outcome history of one address, oldest first, deduped
/// by `(tx_id, direction)`.
pub fn address_history(stores: &FamilyStores, address: &str) -> Result<Vec<HistoryRow>> {
    history_of(&stores.address_history, address)
}

/// The income/outcome history of one token family.
pub fn family_history(stores: &FamilyStores, contract_key: &str) -> Result<Vec<HistoryRow>> {
    history_of(&stores.genesis_history, contract_key)
}

fn history_of(
    store: &quagga_store::ShardedStore,
    key: &str,
) -> Result<Vec<HistoryRow>> {
    let value = match store.get_string(key)? {
        Some(value) => value,
        None => return Ok(Vec::new()),
    };
    let (rows, corrupt) = decode_rows_lossy::<HistoryRow>(&value);
    warn_corrupt(store.name(), key, corrupt);
    Ok(dedup_rows(rows, |r| (r.tx_id, r.kind as u8)))
}

/// FT family metadata, when recorded.
pub fn ft_info(stores: &FamilyStores, contract_key: &str) -> Result<Option<FtInfoRow>> {
    match stores.info.get_string(contract_key)? {
        Some(value) => Ok(FtInfoRow::decode_record(&value).ok()),
        None => Ok(None),
    }
}

/// NFT token metadata, keyed by the full TokenKey.
pub fn nft_info(stores: &FamilyStores, token_key: &str) -> Result<Option<NftInfoRow>> {
    match stores.info.get_string(token_key)? {
        Some(value) => Ok(NftInfoRow::decode_record(&value).ok()),
        None => Ok(None),
    }
}

/// The unspent contract outputs an address currently holds, deduped
/// and with spent outpoints removed.
pub fn address_utxos(stores: &FamilyStores, address: &str) -> Result<Vec<OutputRow>> {
    let mut spent: HashSet<(transaction::Hash, u32)> = HashSet::new();
    if let Some(value) = stores.address_spend.get_string(address)? {
        let (rows, corrupt) = decode_rows_lossy::<SpendRow>(&value);
        warn_corrupt(stores.address_spend.name(), address, corrupt);
        for row in rows {
            spent.insert((row.prev_tx_id, row.prev_vout));
        }
    }

    let mut utxos = Vec::new();
    if let Some(value) = stores.address_income.get_string(address)? {
        let (rows, corrupt) = decode_rows_lossy::<OutputRow>(&value);
        warn_corrupt(stores.address_income.name(), address, corrupt);
        for row in dedup_rows(rows, |r| (r.tx_id, r.vout)) {
            if !spent.contains(&(row.tx_id, row.vout)) {
                utxos.push(row);
            }
        }
    }
    Ok(utxos)
}
