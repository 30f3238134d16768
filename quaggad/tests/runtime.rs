//! End-to-end runtime assembly and shutdown-contract tests, driven by
//! an in-memory chain adapter.

use std::sync::Arc;
use std::time::{Duration, Instant};

use quagga_chain::block::{self, Block, Height};
use quagga_chain::contract::TokenFamily;
use quagga_chain::parameters::{Chain, ChainParams, Network};
use quagga_chain::transaction::{self, Transaction};
use quagga_index::adapter::{BoxError, ChainAdapter};
use quagga_store::MetaStore;
use quaggad::{Config, Runtime};
use tempdir::TempDir;

/// A two-block in-memory chain with no contract outputs.
struct MockAdapter {
    blocks: Vec<Block>,
}

impl MockAdapter {
    fn new() -> MockAdapter {
        let blocks = (0..2)
            .map(|height| Block {
                height: Height(height),
                hash: block::Hash([height as u8; 32]),
                time: 1_600_000_000_000 + height as i64,
                is_partial: false,
                transactions: Vec::new(),
            })
            .collect();
        MockAdapter { blocks }
    }
}

impl ChainAdapter for MockAdapter {
    fn connect(&self) -> Result<(), BoxError> {
        Ok(())
    }

    fn shutdown(&self) -> Result<(), BoxError> {
        Ok(())
    }

    fn chain_name(&self) -> &str {
        "mock"
    }

    fn chain_params(&self) -> ChainParams {
        ChainParams {
            chain: Chain::Btc,
            network: Network::Regtest,
        }
    }

    fn block_count(&self) -> Result<Height, BoxError> {
        Ok(Height(self.blocks.len() as u64 - 1))
    }

    fn block_hash(&self, height: Height) -> Result<block::Hash, BoxError> {
        Ok(self.blocks[height.0 as usize].hash)
    }

    fn get_block(&self, height: Height) -> Result<Block, BoxError> {
        self.blocks
            .get(height.0 as usize)
            .cloned()
            .ok_or_else(|| "height past tip".into())
    }

    fn get_transaction(&self, _id: transaction::Hash) -> Result<Transaction, BoxError> {
        Err("not in mempool".into())
    }

    fn raw_mempool(&self) -> Result<Vec<transaction::Hash>, BoxError> {
        Ok(Vec::new())
    }

    fn find_reorg_height(&self) -> Result<Option<(Height, Height)>, BoxError> {
        Ok(None)
    }
}

fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.chain = Chain::Btc;
    config.network = Network::Regtest;
    config.data_dir = dir.path().to_path_buf();
    config.shard_count = 2;
    config.check_interval_secs = 1;
    config
}

fn wait_for_height(meta: &MetaStore, family: TokenFamily, target: Height) {
    let deadline = Instant::now() + Duration::from_secs(20);
    loop {
        if meta.last_indexed_height(family).unwrap() == Some(target) {
            return;
        }
        assert!(
            Instant::now() < deadline,
            "family {} never reached height {}",
            family,
            target
        );
        std::thread::sleep(Duration::from_millis(20));
    }
}

#[test]
fn runtime_indexes_to_tip_and_shuts_down_in_order() {
    quagga_test::init();

    let dir = TempDir::new("quaggad-runtime").unwrap();
    let config = test_config(&dir);

    let runtime = Runtime::start(config.clone(), Arc::new(MockAdapter::new()), None, None).unwrap();
    wait_for_height(runtime.meta(), TokenFamily::Ft, Height(1));
    wait_for_height(runtime.meta(), TokenFamily::Nft, Height(1));
    runtime.shutdown().unwrap();

    // Heights survive a restart: the meta write was the commit point.
    let meta = MetaStore::open(&config.store_config()).unwrap();
    assert_eq!(
        meta.last_indexed_height(TokenFamily::Ft).unwrap(),
        Some(Height(1))
    );
}

#[test]
fn restarted_runtime_resumes_from_the_persisted_height() {
    quagga_test::init();

    let dir = TempDir::new("quaggad-runtime").unwrap();
    let config = test_config(&dir);

    let runtime = Runtime::start(config.clone(), Arc::new(MockAdapter::new()), None, None).unwrap();
    wait_for_height(runtime.meta(), TokenFamily::Ft, Height(1));
    runtime.shutdown().unwrap();

    // A second start against the same data dir must come up cleanly
    // and stay at the tip.
    let runtime = Runtime::start(config, Arc::new(MockAdapter::new()), None, None).unwrap();
    wait_for_height(runtime.meta(), TokenFamily::Ft, Height(1));
    runtime.shutdown().unwrap();
}
