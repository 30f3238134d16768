//! The derived-store taxonomy for one token family.
//!
//! Every store is a [`ShardedStore`] under its own directory in the
//! data dir, named exactly as laid out on disk: `contract_ft_utxo`,
//! `address_ft_income`, `codeHash_genesis_ft_spend`, and so on. FT
//! additionally owns the unique-contract stores, NFT the
//! sell-contract stores.

use std::collections::{HashMap, HashSet};

use quagga_chain::contract::{ContractKind, TokenFamily};
use quagga_chain::record::{decode_rows_lossy, OutputRow};
use quagga_chain::transaction;
use quagga_chain::transparent::OutPoint;
use quagga_store::{Config as StoreConfig, ShardedStore};
use tracing::warn;

use crate::Result;

/// The unique-contract stores, FT families only.
pub struct UniqueStores {
    pub income: ShardedStore,
    pub spend: ShardedStore,
}

/// The sell-contract stores, NFT families only.
pub struct SellStores {
    pub address_income: ShardedStore,
    pub address_spend: ShardedStore,
    pub code_income: ShardedStore,
    pub code_spend: ShardedStore,
}

/// Family-specific store extensions.
pub enum FamilyExtra {
    Ft(UniqueStores),
    Nft(SellStores),
}

/// Every derived store of one token family.
pub struct FamilyStores {
    pub family: TokenFamily,

    /// Canonical per-transaction store: tx_id → one row per contract
    /// output. Input resolution and every rebuild path start here.
    pub utxo: ShardedStore,

    pub address_income: ShardedStore,
    pub address_spend: ShardedStore,
    pub address_income_valid: ShardedStore,

    pub code_income: ShardedStore,
    pub code_spend: ShardedStore,
    pub code_income_valid: ShardedStore,

    /// Token metadata, write-once. Keyed by ContractKey for FT, by
    /// TokenKey for NFT.
    pub info: ShardedStore,
    pub summary_info: ShardedStore,

    pub genesis: ShardedStore,
    pub genesis_output: ShardedStore,
    pub genesis_utxo: ShardedStore,

    pub owners_income: ShardedStore,
    pub owners_spend: ShardedStore,

    pub address_history: ShardedStore,
    pub genesis_history: ShardedStore,

    pub uncheck: ShardedStore,
    pub used_income: ShardedStore,
    pub invalid: ShardedStore,

    pub extra: FamilyExtra,
}

impl FamilyStores {
    /// Open every store of the family. Any failure is fatal.
    pub fn open(config: &StoreConfig, family: TokenFamily) -> Result<FamilyStores> {
        let f = family.as_str();
        let open = |name: String| ShardedStore::open(config, &name);

        let extra = match family {
            TokenFamily::Ft => FamilyExtra::Ft(UniqueStores {
                income: open(format!("unique_{}_income", f))?,
                spend: open(format!("unique_{}_spend", f))?,
            }),
            TokenFamily::Nft => FamilyExtra::Nft(SellStores {
                address_income: open(format!("address_sell_{}_income", f))?,
                address_spend: open(format!("address_sell_{}_spend", f))?,
                code_income: open(format!("codeHash_genesis_sell_{}_income", f))?,
                code_spend: open(format!("codeHash_genesis_sell_{}_spend", f))?,
            }),
        };

        Ok(FamilyStores {
            family,
            utxo: open(format!("contract_{}_utxo", f))?,
            address_income: open(format!("address_{}_income", f))?,
            address_spend: open(format!("address_{}_spend", f))?,
            address_income_valid: open(format!("address_{}_income_valid", f))?,
            code_income: open(format!("codeHash_genesis_{}_income", f))?,
            code_spend: open(format!("codeHash_genesis_{}_spend", f))?,
            code_income_valid: open(format!("codeHash_genesis_{}_income_valid", f))?,
            info: open(format!("contract_{}_info", f))?,
            summary_info: open(format!("contract_{}_summary_info", f))?,
            genesis: open(format!("contract_{}_genesis", f))?,
            genesis_output: open(format!("contract_{}_genesis_output", f))?,
            genesis_utxo: open(format!("contract_{}_genesis_utxo", f))?,
            owners_income: open(format!("contract_{}_owners_income", f))?,
            owners_spend: open(format!("contract_{}_owners_spend", f))?,
            address_history: open(format!("contract_{}_address_history", f))?,
            genesis_history: open(format!("contract_{}_genesis_history", f))?,
            uncheck: open(format!("uncheck_{}_outpoint", f))?,
            used_income: open(format!("used_{}_income", f))?,
            invalid: open(format!("invalid_{}_outpoint", f))?,
            extra,
        })
    }

    /// The unique-contract stores, when this is an FT family.
    pub fn unique(&self) -> Option<&UniqueStores> {
        match &self.extra {
            FamilyExtra::Ft(stores) => Some(stores),
            FamilyExtra::Nft(_) => None,
        }
    }

    /// The sell-contract stores, when this is an NFT family.
    pub fn sell(&self) -> Option<&SellStores> {
        match &self.extra {
            FamilyExtra::Nft(stores) => Some(stores),
            FamilyExtra::Ft(_) => None,
        }
    }

    fn all_stores(&self) -> Vec<&ShardedStore> {
        let mut stores = vec![
            &self.utxo,
            &self.address_income,
            &self.address_spend,
            &self.address_income_valid,
            &self.code_income,
            &self.code_spend,
            &self.code_income_valid,
            &self.info,
            &self.summary_info,
            &self.genesis,
            &self.genesis_output,
            &self.genesis_utxo,
            &self.owners_income,
            &self.owners_spend,
            &self.address_history,
            &self.genesis_history,
            &self.uncheck,
            &self.used_income,
            &self.invalid,
        ];
        match &self.extra {
            FamilyExtra::Ft(unique) => {
                stores.push(&unique.income);
                stores.push(&unique.spend);
            }
            FamilyExtra::Nft(sell) => {
                stores.push(&sell.address_income);
                stores.push(&sell.address_spend);
                stores.push(&sell.code_income);
                stores.push(&sell.code_spend);
            }
        }
        stores
    }

    /// Flush every store's WAL to durable media.
    pub fn sync(&self) -> Result<()> {
        for store in self.all_stores() {
            store.sync()?;
        }
        Ok(())
    }

    /// Resolve a set of previous outpoints against the canonical
    /// per-transaction store.
    ///
    /// One bulk read per distinct previous transaction; each value is
    /// parsed per the canonical-row invariant and the segment whose
    /// stored index equals the outpoint's index is selected. Corrupt
    /// segments are logged and skipped. Outpoints with no canonical
    /// row are simply absent from the result: they reference
    /// non-contract outputs.
    pub fn query_previous_outputs(
        &self,
        outpoints: &[OutPoint],
    ) -> Result<HashMap<OutPoint, OutputRow>> {
        let tx_ids: HashSet<transaction::Hash> = outpoints.iter().map(|op| op.hash).collect();
        let keys: Vec<String> = tx_ids.iter().map(|id| id.to_string()).collect();
        let values = self.utxo.bulk_query(keys.iter().map(|k| k.as_str()))?;

        let mut rows_by_tx: HashMap<String, Vec<OutputRow>> = HashMap::with_capacity(values.len());
        for (tx_id, value) in values {
            let (rows, corrupt) = decode_rows_lossy::<OutputRow>(&value);
            if corrupt > 0 {
                warn!(
                    store = self.utxo.name(),
                    key = %tx_id,
                    corrupt,
                    "skipping corrupt canonical segments"
                );
            }
            rows_by_tx.insert(tx_id, rows);
        }

        let mut resolved = HashMap::new();
        for outpoint in outpoints {
            if let Some(rows) = rows_by_tx.get(&outpoint.hash.to_string()) {
                if let Some(row) = rows.iter().find(|row| row.vout == outpoint.index) {
                    resolved.insert(*outpoint, row.clone());
                }
            }
        }
        Ok(resolved)
    }
}

/// The family a contract kind is indexed under: FT owns `ft` and
/// `unique` outputs, NFT owns `nft` and `nft_sell`.
pub(crate) fn family_of(kind: ContractKind) -> TokenFamily {
    match kind {
        ContractKind::Ft | ContractKind::Unique => TokenFamily::Ft,
        ContractKind::Nft | ContractKind::NftSell => TokenFamily::Nft,
    }
}
