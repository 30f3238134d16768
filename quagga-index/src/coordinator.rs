//! The coordinator: drives the confirmed pipeline in strict height
//! order.
//!
//! One loop serves every enabled family: each round it surfaces any
//! reorg the adapter reports, reads the node's best height, and walks
//! each family from its own last-indexed height to the tip, running
//! the output pass then the input pass per block. Oversized blocks
//! are split into partial slices; only the final slice advances the
//! meta height, after a WAL flush, so the meta write is the block's
//! commit point. When the catch-up first reaches the tip the mempool
//! managers rebuild from the node, and the loop drops to tip polling.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use quagga_chain::archive;
use quagga_chain::block::{Block, Height};
use quagga_store::MetaStore;
use tracing::{debug, error, info, warn};

use crate::adapter::ChainAdapter;
use crate::input;
use crate::mempool::{ConfirmedDelta, MempoolManager};
use crate::output;
use crate::shutdown::StopSignal;
use crate::stores::FamilyStores;
use crate::{Config, IndexError, Result};

/// Blocks above this transaction count get an explicit note when
/// their batch arenas are released.
const LARGE_BLOCK_TXS: usize = 400_000;

/// One family's slice of the pipeline.
pub struct FamilyPipeline {
    pub stores: Arc<FamilyStores>,
    pub mempool: Option<Arc<MempoolManager>>,
}

/// The confirmed-chain driver.
pub struct Coordinator {
    adapter: Arc<dyn ChainAdapter>,
    meta: Arc<MetaStore>,
    pipelines: Vec<FamilyPipeline>,
    config: Config,
    /// When set, indexed blocks are also written to the block archive
    /// under this root.
    archive_root: Option<PathBuf>,
}

impl Coordinator {
    pub fn new(
        adapter: Arc<dyn ChainAdapter>,
        meta: Arc<MetaStore>,
        pipelines: Vec<FamilyPipeline>,
        config: Config,
        archive_root: Option<PathBuf>,
    ) -> Coordinator {
        Coordinator {
            adapter,
            meta,
            pipelines,
            config,
            archive_root,
        }
    }

    /// Run until the stop signal fires.
    pub fn run(&self, stop: StopSignal) {
        let check_interval = Duration::from_secs(self.config.check_interval_secs);
        let retry_backoff = Duration::from_secs(self.config.retry_backoff_secs);
        let mut first_sync_done = false;

        info!(chain = self.adapter.chain_name(), "coordinator started");
        loop {
            if stop.is_stopped() {
                break;
            }
            match self.catch_up(&stop) {
                Ok(true) => {
                    if !first_sync_done {
                        first_sync_done = true;
                        self.first_sync_complete();
                    }
                    if stop.sleep(check_interval) {
                        break;
                    }
                }
                Ok(false) => break,
                Err(error) => {
                    // The failed block was never committed; resume from
                    // the last persisted height after a backoff.
                    warn!(%error, "indexing round failed; backing off");
                    if stop.sleep(retry_backoff) {
                        break;
                    }
                }
            }
        }
        info!("coordinator stopped");
    }

    /// Walk every family to the node's best height. Returns `false`
    /// when interrupted by shutdown.
    fn catch_up(&self, stop: &StopSignal) -> Result<bool> {
        self.surface_reorg();

        let best = self.adapter.block_count().map_err(IndexError::adapter)?;
        for pipeline in &self.pipelines {
            let family = pipeline.stores.family;
            let mut next = match self.meta.last_indexed_height(family)? {
                Some(height) => height.0 + 1,
                None => 0,
            };
            while next <= best.0 {
                if stop.is_stopped() {
                    return Ok(false);
                }
                self.index_height(pipeline, Height(next))?;
                next += 1;
            }
        }
        Ok(true)
    }

    /// Reorg detection is consumed but not resolved: there is no
    /// rollback path, a reorg demands an operator-driven rebuild from
    /// the fork height.
    fn surface_reorg(&self) {
        match self.adapter.find_reorg_height() {
            Ok(Some((last_common, end))) => {
                error!(
                    last_common = last_common.0,
                    end = end.0,
                    "chain reorg detected; indexed rows above the fork are stale until rebuilt"
                );
            }
            Ok(None) => {}
            Err(error) => warn!(%error, "reorg probe failed"),
        }
    }

    /// Fetch, split, and index one block for one family.
    fn index_height(&self, pipeline: &FamilyPipeline, height: Height) -> Result<()> {
        let family = pipeline.stores.family;
        let block = self
            .adapter
            .get_block(height)
            .map_err(IndexError::adapter)?;
        let tx_count = block.transactions.len();

        let slices = block.split_into_partials(self.config.max_tx_per_batch.max(1));
        self.archive_slices(&slices)?;

        let mut delta = ConfirmedDelta::default();
        for slice in &slices {
            // Phase 1 before phase 2, always: the input pass may spend
            // outputs created earlier in this very slice.
            output::index_block(&pipeline.stores, slice, self.config.batch_size, &mut delta)?;
            input::resolve_block(
                &pipeline.stores,
                pipeline.mempool.as_deref(),
                slice,
                self.config.batch_size,
                &mut delta,
            )?;

            if !slice.is_partial {
                // Per-store writes become durable before the meta
                // height moves; the meta write is the commit point.
                pipeline.stores.sync()?;
                self.meta.set_last_indexed_height(family, height)?;
            }
        }

        if tx_count > LARGE_BLOCK_TXS {
            debug!(height = height.0, tx_count, "large block; batch arenas released");
        }

        // Shadow-state cleanup is advisory; a failure here must not
        // fail the committed block.
        if let Some(mempool) = &pipeline.mempool {
            if let Err(error) = mempool.confirm_block(&delta) {
                warn!(%error, height = height.0, "mempool cleanup failed");
            }
        }

        metrics::counter!("index.blocks.committed", 1, "family" => family.as_str());
        if height.0 % 1000 == 0 {
            info!(family = %family, height = height.0, "indexing progress");
        }
        Ok(())
    }

    fn archive_slices(&self, slices: &[Block]) -> Result<()> {
        let root = match &self.archive_root {
            Some(root) => root,
            None => return Ok(()),
        };
        if let [single] = slices {
            archive::write_block(root, single, None)?;
        } else {
            for (part, slice) in slices.iter().enumerate() {
                archive::write_block(root, slice, Some(part as u32))?;
            }
        }
        Ok(())
    }

    /// The catch-up loop reached the tip for the first time: rebuild
    /// every family's mempool shadow from the node.
    fn first_sync_complete(&self) {
        info!("first sync complete");
        for pipeline in &self.pipelines {
            if let Some(mempool) = &pipeline.mempool {
                if let Err(error) = mempool.rebuild(&*self.adapter) {
                    warn!(
                        family = %pipeline.stores.family,
                        %error,
                        "mempool rebuild failed; shadow state stays empty until retried"
                    );
                }
            }
        }
    }
}
