//! Indexing pipeline configuration.

use serde::{Deserialize, Serialize};

/// Pipeline and scheduling knobs.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    /// Transactions accumulated per pipeline batch before the
    /// per-store buffers flush.
    pub batch_size: usize,

    /// Blocks with more transactions than this are split into partial
    /// blocks of this size; only the final slice commits the height.
    pub max_tx_per_batch: usize,

    /// Tip poll interval once caught up, in seconds.
    pub check_interval_secs: u64,

    /// Backoff after a failed block before retrying it, in seconds.
    pub retry_backoff_secs: u64,

    /// Verifier cadence over the confirmed uncheck queue, in seconds.
    pub verify_interval_secs: u64,

    /// Verifier cadence over the mempool uncheck queue, in seconds.
    pub mempool_verify_interval_secs: u64,

    /// Outpoints examined per verifier tick.
    pub verify_batch: usize,

    /// Verifier worker pool size.
    pub verify_workers: usize,

    /// When set, every indexed block is also written to the
    /// `blockFiles` archive for replay and backfill.
    pub archive_blocks: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_tx_per_batch: 100_000,
            check_interval_secs: 10,
            retry_backoff_secs: 5,
            verify_interval_secs: 5,
            mempool_verify_interval_secs: 2,
            verify_batch: 1000,
            verify_workers: 4,
            archive_blocks: false,
        }
    }
}
