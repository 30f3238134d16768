//! Storage configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Storage layer configuration.
///
/// `shard_count` is fixed at store creation: the value is persisted in
/// the meta store and reopening an existing data directory with a
/// different count is a fatal error, because keys would route to the
/// wrong shards.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    /// The root directory for all store shards and the meta database.
    pub data_dir: PathBuf,

    /// Number of shards per store.
    pub shard_count: usize,

    /// Cross-shard parallelism cap for bulk operations.
    pub worker_count: usize,

    /// Serialized-byte cap per shard-level write batch, in MiB.
    pub max_batch_size_mb: usize,

    /// Block cache per store, in MiB, shared by its shards.
    pub db_cache_mb: usize,

    /// Memtable budget per shard, in MiB.
    pub mem_table_mb: usize,
}

impl Config {
    /// The directory holding one shard of one store.
    pub fn shard_dir(&self, store: &str, shard: usize) -> PathBuf {
        self.data_dir.join(store).join(format!("shard_{}", shard))
    }

    /// The directory holding an unsharded database.
    pub fn plain_dir(&self, store: &str) -> PathBuf {
        self.data_dir.join(store)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("quagga"),
            shard_count: 8,
            worker_count: 4,
            max_batch_size_mb: 4,
            db_cache_mb: 128,
            mem_table_mb: 64,
        }
    }
}
