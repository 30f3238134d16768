//! Process configuration.
//!
//! One TOML file covers the whole process; unknown options are
//! rejected at load so a typo cannot silently fall back to a default.

use std::path::{Path, PathBuf};

use quagga_chain::contract::TokenFamily;
use quagga_chain::parameters::{Chain, ChainParams, Network};
use serde::{Deserialize, Serialize};

#[cfg(test)]
mod tests;

/// The full option surface of a quagga process.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    /// The chain to index.
    pub chain: Chain,
    /// The network of that chain.
    pub network: Network,
    /// The token families to index.
    pub families: Vec<TokenFamily>,

    /// Root directory for all stores.
    pub data_dir: PathBuf,
    /// Destination for store backups, when the backup scheduler runs.
    pub backup_dir: Option<PathBuf>,

    /// Number of shards per store; fixed at creation.
    pub shard_count: usize,
    /// Cross-shard parallelism for bulk storage operations.
    pub worker_count: usize,
    /// Transactions per pipeline batch.
    pub batch_size: usize,
    /// Transactions per partial-block slice.
    pub max_tx_per_batch: usize,
    /// Serialized-byte cap per shard write batch, MiB.
    pub max_batch_size_mb: usize,
    /// Block cache per store, MiB.
    pub db_cache_mb: usize,
    /// Memtable budget per shard, MiB.
    pub mem_table_mb: usize,
    /// Row-buffer pool retention cap, KiB.
    pub byte_pool_kb: usize,

    /// Tip poll interval once caught up, seconds.
    pub check_interval_secs: u64,
    /// Archive indexed blocks under `data_dir/blockFiles`.
    pub archive_blocks: bool,

    /// The node's raw-transaction publisher endpoint.
    pub zmq_address: Option<String>,
    /// The port the query API will bind.
    pub api_port: u16,

    /// Node RPC endpoint and credentials, passed to the adapter.
    pub rpc_address: Option<String>,
    pub rpc_user: Option<String>,
    pub rpc_password: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let store = quagga_store::Config::default();
        let index = quagga_index::Config::default();
        Self {
            chain: Chain::Btc,
            network: Network::Mainnet,
            families: vec![TokenFamily::Ft, TokenFamily::Nft],
            data_dir: store.data_dir,
            backup_dir: None,
            shard_count: store.shard_count,
            worker_count: store.worker_count,
            batch_size: index.batch_size,
            max_tx_per_batch: index.max_tx_per_batch,
            max_batch_size_mb: store.max_batch_size_mb,
            db_cache_mb: store.db_cache_mb,
            mem_table_mb: store.mem_table_mb,
            byte_pool_kb: 64,
            check_interval_secs: index.check_interval_secs,
            archive_blocks: false,
            zmq_address: None,
            api_port: 8000,
            rpc_address: None,
            rpc_user: None,
            rpc_password: None,
        }
    }
}

impl Config {
    /// Load and validate a TOML config file. Unknown keys fail the
    /// load.
    pub fn load(path: &Path) -> Result<Config, crate::RuntimeError> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// The chain/network pair this process serves.
    pub fn chain_params(&self) -> ChainParams {
        ChainParams {
            chain: self.chain,
            network: self.network,
        }
    }

    /// The per-chain data directory the stores open under.
    pub fn chain_data_dir(&self) -> PathBuf {
        self.data_dir.join(self.chain_params().dir_name())
    }

    /// The storage-layer slice of this config.
    pub fn store_config(&self) -> quagga_store::Config {
        quagga_store::Config {
            data_dir: self.chain_data_dir(),
            shard_count: self.shard_count,
            worker_count: self.worker_count,
            max_batch_size_mb: self.max_batch_size_mb,
            db_cache_mb: self.db_cache_mb,
            mem_table_mb: self.mem_table_mb,
        }
    }

    /// The pipeline slice of this config.
    pub fn index_config(&self) -> quagga_index::Config {
        quagga_index::Config {
            batch_size: self.batch_size,
            max_tx_per_batch: self.max_tx_per_batch,
            check_interval_secs: self.check_interval_secs,
            archive_blocks: self.archive_blocks,
            ..quagga_index::Config::default()
        }
    }
}
