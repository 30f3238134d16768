//! A single-instance (unsharded) store.
//!
//! Used for the meta database and the mempool shadow stores. Carries
//! the same merge operator as the sharded stores plus the prefix
//! operations the mempool cleanup relies on, and a `wipe` that
//! destroys and recreates the database files for mempool rebuilds.

use std::path::PathBuf;

use rocksdb::{Direction, IteratorMode, Options, DB};
use tracing::debug;

use crate::merge::{concat_merge, MERGE_OPERATOR_NAME};
use crate::{Result, StoreError};

#[cfg(test)]
mod tests;

/// One unsharded RocksDB instance.
pub struct PlainStore {
    name: String,
    path: PathBuf,
    db: DB,
}

impl PlainStore {
    /// Open (or create) the database at `path`.
    pub fn open(name: &str, path: PathBuf) -> Result<PlainStore> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let db = DB::open(&Self::options(), &path).map_err(|source| StoreError::Open {
            path: path.clone(),
            source,
        })?;
        Ok(PlainStore {
            name: name.to_string(),
            path,
            db,
        })
    }

    fn options() -> Options {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_merge_operator_associative(MERGE_OPERATOR_NAME, concat_merge);
        opts
    }

    fn err(&self, source: rocksdb::Error) -> StoreError {
        StoreError::Engine {
            store: self.name.clone(),
            shard: 0,
            source,
        }
    }

    /// The store name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Point read.
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.db.get(key.as_bytes()).map_err(|e| self.err(e))
    }

    /// Point read, decoded as UTF-8.
    pub fn get_string(&self, key: &str) -> Result<Option<String>> {
        match self.get(key)? {
            Some(bytes) => Ok(Some(String::from_utf8(bytes)?)),
            None => Ok(None),
        }
    }

    /// Overwrite one key.
    pub fn set(&self, key: &str, value: impl AsRef<[u8]>) -> Result<()> {
        self.db
            .put(key.as_bytes(), value.as_ref())
            .map_err(|e| self.err(e))
    }

    /// Delete one key.
    pub fn delete(&self, key: &str) -> Result<()> {
        self.db.delete(key.as_bytes()).map_err(|e| self.err(e))
    }

    /// Atomically append `",{suffix}"` to the key's value.
    pub fn merge(&self, key: &str, suffix: &str) -> Result<()> {
        self.db
            .merge(key.as_bytes(), suffix.as_bytes())
            .map_err(|e| self.err(e))
    }

    /// All key/value pairs whose key starts with `prefix`, in key order.
    pub fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        let mode = IteratorMode::From(prefix.as_bytes(), Direction::Forward);
        let mut rows = Vec::new();
        for item in self.db.iterator(mode) {
            let (key, value) = item.map_err(|e| self.err(e))?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            rows.push((
                String::from_utf8(key.into_vec())?,
                String::from_utf8(value.into_vec())?,
            ));
        }
        Ok(rows)
    }

    /// Delete every key starting with `prefix`; returns the count.
    pub fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let rows = self.scan_prefix(prefix)?;
        for (key, _) in &rows {
            self.delete(key)?;
        }
        Ok(rows.len())
    }

    /// First `limit` key/value pairs in key order.
    pub fn scan_n(&self, limit: usize) -> Result<Vec<(String, String)>> {
        let mut rows = Vec::new();
        for item in self.db.iterator(IteratorMode::Start) {
            let (key, value) = item.map_err(|e| self.err(e))?;
            rows.push((
                String::from_utf8(key.into_vec())?,
                String::from_utf8(value.into_vec())?,
            ));
            if rows.len() >= limit {
                break;
            }
        }
        Ok(rows)
    }

    /// Flush the write-ahead log to durable media.
    pub fn sync(&self) -> Result<()> {
        self.db.flush_wal(true).map_err(|e| self.err(e))
    }

    /// Close the database, destroy its files, and reopen it empty.
    ///
    /// This is the mempool rebuild path: shadow state is advisory and
    /// reconstructed from the node, so the files are simply removed.
    pub fn wipe(self) -> Result<PlainStore> {
        let PlainStore { name, path, db } = self;
        drop(db);
        DB::destroy(&Self::options(), &path).map_err(|source| StoreError::Open {
            path: path.clone(),
            source,
        })?;
        debug!(store = %name, "wiped store");
        PlainStore::open(&name, path)
    }
}
