//! The unsharded meta store.
//!
//! Holds the per-family last-indexed heights, the schema version, and
//! the shard count the data directory was created with. Values are
//! decimal ASCII; an absent key means "no prior state". The meta
//! height write is the commit point of a block: it happens strictly
//! after every per-store write for that height and is followed by a
//! WAL flush.

use std::sync::Mutex;

use quagga_chain::block::Height;
use quagga_chain::contract::TokenFamily;
use tracing::info;

use crate::{Config, PlainStore, Result, StoreError};

#[cfg(test)]
mod tests;

/// The schema version this build reads and writes.
pub const SCHEMA_VERSION: u64 = 1;

const META_DIR: &str = "meta";
const KEY_SCHEMA_VERSION: &str = "schema_version";
const KEY_SHARD_COUNT: &str = "shard_count";

/// The meta database. All writes are serialized by a single lock.
pub struct MetaStore {
    store: PlainStore,
    write_lock: Mutex<()>,
}

impl MetaStore {
    /// Open the meta database and validate it against the config.
    ///
    /// A fresh directory records the schema version and shard count.
    /// An existing directory must match the configured shard count
    /// exactly (keys are routed by `hash % shard_count`, so reopening
    /// with a different count would read from the wrong shards) and
    /// must carry a schema version this build understands. Both
    /// mismatches are fatal.
    pub fn open(config: &Config) -> Result<MetaStore> {
        let store = PlainStore::open(META_DIR, config.plain_dir(META_DIR))?;

        match read_decimal(&store, KEY_SHARD_COUNT)? {
            None => {
                store.set(KEY_SHARD_COUNT, config.shard_count.to_string())?;
                store.set(KEY_SCHEMA_VERSION, SCHEMA_VERSION.to_string())?;
                store.sync()?;
                info!(
                    shard_count = config.shard_count,
                    schema_version = SCHEMA_VERSION,
                    "initialized meta store"
                );
            }
            Some(stored) if stored as usize != config.shard_count => {
                return Err(StoreError::ShardCountMismatch {
                    stored: stored as usize,
                    requested: config.shard_count,
                });
            }
            Some(_) => {
                let stored = read_decimal(&store, KEY_SCHEMA_VERSION)?.unwrap_or(0);
                if stored != SCHEMA_VERSION {
                    return Err(StoreError::SchemaVersion {
                        stored,
                        expected: SCHEMA_VERSION,
                    });
                }
            }
        }

        Ok(MetaStore {
            store,
            write_lock: Mutex::new(()),
        })
    }

    fn height_key(family: TokenFamily) -> String {
        format!("last_{}_indexed_height", family)
    }

    /// The last fully indexed height for a family, if any block has
    /// been committed.
    pub fn last_indexed_height(&self, family: TokenFamily) -> Result<Option<Height>> {
        Ok(read_decimal(&self.store, &Self::height_key(family))?.map(Height))
    }

    /// Advance the last-indexed height and flush the WAL.
    ///
    /// This is the durability point: queries never observe a block
    /// whose height has not been recorded here.
    pub fn set_last_indexed_height(&self, family: TokenFamily, height: Height) -> Result<()> {
        let _guard = self.write_lock.lock().expect("meta write lock");
        self.store
            .set(&Self::height_key(family), height.0.to_string())?;
        self.store.sync()?;
        metrics::gauge!(
            "index.committed.height",
            height.0 as f64,
            "family" => family.as_str()
        );
        Ok(())
    }
}

fn read_decimal(store: &PlainStore, key: &str) -> Result<Option<u64>> {
    match store.get_string(key)? {
        None => Ok(None),
        Some(text) => text
            .parse()
            .map(Some)
            .map_err(|_| StoreError::MetaValue {
                key: key.to_string(),
            }),
    }
}
