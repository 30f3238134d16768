//! Runtime assembly and the shutdown contract.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use quagga_chain::record::pool;
use quagga_index::adapter::{BoxError, ChainAdapter, MempoolSource, TransactionDecoder};
use quagga_index::coordinator::{Coordinator, FamilyPipeline};
use quagga_index::mempool::{self, MempoolManager};
use quagga_index::shutdown::{self, StopHandle};
use quagga_index::stores::FamilyStores;
use quagga_index::verify::Verifier;
use quagga_index::IndexError;
use quagga_store::{MetaStore, StoreError};
use thiserror::Error;
use tracing::{info, warn};

use crate::Config;

/// The grace period for the adapter's in-flight block fetch at
/// shutdown.
const ADAPTER_GRACE: Duration = Duration::from_secs(5);

/// A process-level failure.
///
/// Everything here is fatal at startup: a shard that cannot open or a
/// meta store that cannot be written leaves nothing to run.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("chain adapter error: {0}")]
    Adapter(#[source] BoxError),
}

/// A running quagga process: stores open, tasks spawned.
pub struct Runtime {
    adapter: Arc<dyn ChainAdapter>,
    mempool_source: Option<Box<dyn MempoolSource>>,
    stop: Option<StopHandle>,
    verifier_handles: Vec<JoinHandle<()>>,
    mempool_handles: Vec<JoinHandle<()>>,
    coordinator_handle: Option<JoinHandle<()>>,
    meta: Arc<MetaStore>,
}

impl Runtime {
    /// Open every store, connect the adapter, and spawn the
    /// coordinator, verifiers, and mempool listeners.
    ///
    /// `mempool_source` and `decoder` come as a pair; without them the
    /// process indexes confirmed blocks only and the shadow stores
    /// fill solely from rebuilds.
    pub fn start(
        config: Config,
        adapter: Arc<dyn ChainAdapter>,
        mut mempool_source: Option<Box<dyn MempoolSource>>,
        decoder: Option<Arc<dyn TransactionDecoder>>,
    ) -> Result<Runtime, RuntimeError> {
        pool::init(config.byte_pool_kb);

        let store_config = config.store_config();
        let index_config = config.index_config();
        let meta = Arc::new(MetaStore::open(&store_config)?);

        let (stop_handle, stop_signal) = shutdown::channel();
        let mut verifier_handles = Vec::new();
        let mut mempool_handles = Vec::new();
        let mut pipelines = Vec::new();
        let mut raw_feeds = Vec::new();

        for family in &config.families {
            let stores = Arc::new(FamilyStores::open(&store_config, *family)?);
            let manager = Arc::new(MempoolManager::new(&store_config, *family, stores.clone())?);

            // Confirmed-side verifier.
            let verifier = Verifier::new(
                stores.clone(),
                Duration::from_secs(index_config.verify_interval_secs),
                index_config.verify_batch,
                index_config.verify_workers,
            );
            let signal = stop_signal.clone();
            verifier_handles.push(std::thread::spawn(move || verifier.run(signal)));

            // Mempool-side verifier.
            let verifier = Verifier::new(
                manager.clone(),
                Duration::from_secs(index_config.mempool_verify_interval_secs),
                index_config.verify_batch,
                index_config.verify_workers,
            );
            let signal = stop_signal.clone();
            verifier_handles.push(std::thread::spawn(move || verifier.run(signal)));

            // Mempool listener, when a raw-tx feed is wired up.
            if let Some(decoder) = &decoder {
                let (raw_tx, raw_rx) = crossbeam_channel::unbounded();
                raw_feeds.push(raw_tx);
                let manager_for_listener = manager.clone();
                let decoder = decoder.clone();
                let signal = stop_signal.clone();
                mempool_handles.push(std::thread::spawn(move || {
                    mempool::run_listener(manager_for_listener, decoder, raw_rx, signal)
                }));
            }

            pipelines.push(FamilyPipeline {
                stores,
                mempool: Some(manager),
            });
        }

        adapter.connect().map_err(RuntimeError::Adapter)?;

        if let Some(source) = &mut mempool_source {
            let feeds = raw_feeds;
            source.on_rawtx(Box::new(move |raw: Vec<u8>| {
                for feed in &feeds {
                    let _ = feed.send(raw.clone());
                }
            }));
            source.start().map_err(RuntimeError::Adapter)?;
        }

        let archive_root = if config.archive_blocks {
            Some(config.chain_data_dir())
        } else {
            None
        };
        let coordinator = Coordinator::new(
            adapter.clone(),
            meta.clone(),
            pipelines,
            index_config,
            archive_root,
        );
        let signal = stop_signal;
        let coordinator_handle = std::thread::spawn(move || coordinator.run(signal));

        info!(chain = %config.chain, network = %config.network, "runtime started");
        Ok(Runtime {
            adapter,
            mempool_source,
            stop: Some(stop_handle),
            verifier_handles,
            mempool_handles,
            coordinator_handle: Some(coordinator_handle),
            meta,
        })
    }

    /// The meta store, for status probes.
    pub fn meta(&self) -> &Arc<MetaStore> {
        &self.meta
    }

    /// Block until an interrupt arrives, then shut down in order.
    pub fn run_until_interrupt(self) -> Result<(), RuntimeError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .build()?;
        runtime.block_on(async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                warn!(%error, "interrupt listener failed; shutting down");
            }
        });
        info!("interrupt received");
        self.shutdown()
    }

    /// Tear the process down in the contract order: stop signal, then
    /// verifiers, then the mempool feed, then the adapter with a grace
    /// period, then the stores (dropped last, in reverse registration
    /// order).
    pub fn shutdown(mut self) -> Result<(), RuntimeError> {
        if let Some(stop) = self.stop.take() {
            stop.stop();
        }

        for handle in self.verifier_handles.drain(..) {
            let _ = handle.join();
        }

        if let Some(mut source) = self.mempool_source.take() {
            if let Err(error) = source.stop() {
                warn!(%error, "mempool source did not stop cleanly");
            }
        }
        for handle in self.mempool_handles.drain(..) {
            let _ = handle.join();
        }

        if let Some(handle) = self.coordinator_handle.take() {
            let _ = handle.join();
        }

        // The adapter may be blocked on an in-flight fetch; give it a
        // bounded grace period rather than hanging the exit.
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let adapter = self.adapter.clone();
        std::thread::spawn(move || {
            if let Err(error) = adapter.shutdown() {
                warn!(%error, "adapter shutdown reported an error");
            }
            let _ = done_tx.send(());
        });
        if done_rx.recv_timeout(ADAPTER_GRACE).is_err() {
            warn!("adapter shutdown exceeded its grace period");
        }

        info!("runtime stopped");
        Ok(())
    }
}
