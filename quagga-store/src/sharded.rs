//! The primary sharded key/value store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use rocksdb::{IteratorMode, Options, WriteBatch, WriteOptions, DB};
use tracing::{debug, trace};
use xxhash_rust::xxh64::xxh64;

use crate::merge::{concat_merge, MERGE_OPERATOR_NAME};
use crate::{Config, Result, StoreError};

#[cfg(test)]
mod tests;

/// Entry cap per shard-level write batch.
const MAX_BATCH_ENTRIES: usize = 5000;

enum WriteKind {
    Put,
    Merge,
}

/// One derived index, split across N RocksDB instances by key hash.
///
/// Keys route to shards by `xxh64(key) % N`. N is fixed when the data
/// directory is created (the meta store persists it); there is no
/// rehashing. Within one bulk call each shard is written by exactly
/// one worker; between calls the store supports concurrent readers
/// with one writer per shard.
pub struct ShardedStore {
    name: String,
    shards: Vec<DB>,
    max_batch_bytes: usize,
    worker_count: usize,
}

impl ShardedStore {
    /// Open (or create) every shard of the named store.
    ///
    /// Failure to open any shard is fatal to the caller: a store with
    /// a missing shard would silently misroute reads.
    pub fn open(config: &Config, name: &str) -> Result<ShardedStore> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_merge_operator_associative(MERGE_OPERATOR_NAME, concat_merge);
        opts.optimize_for_point_lookup(config.db_cache_mb as u64);
        opts.set_write_buffer_size(config.mem_table_mb * 1024 * 1024);

        let mut shards = Vec::with_capacity(config.shard_count);
        for shard in 0..config.shard_count {
            let path = config.shard_dir(name, shard);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            let db = DB::open(&opts, &path).map_err(|source| StoreError::Open {
                path: path.clone(),
                source,
            })?;
            shards.push(db);
        }
        debug!(store = name, shards = shards.len(), "opened store");

        Ok(ShardedStore {
            name: name.to_string(),
            shards,
            max_batch_bytes: config.max_batch_size_mb * 1024 * 1024,
            worker_count: config.worker_count.max(1),
        })
    }

    /// The store name, as used for its on-disk directory.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The shard a key routes to.
    pub fn shard_index(&self, key: &str) -> usize {
        (xxh64(key.as_bytes(), 0) % self.shards.len() as u64) as usize
    }

    fn shard_err(&self, shard: usize, source: rocksdb::Error) -> StoreError {
        StoreError::Engine {
            store: self.name.clone(),
            shard,
            source,
        }
    }

    /// Point read.
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let shard = self.shard_index(key);
        self.shards[shard]
            .get(key.as_bytes())
            .map_err(|e| self.shard_err(shard, e))
    }

    /// Point read, decoded as a UTF-8 row list.
    pub fn get_string(&self, key: &str) -> Result<Option<String>> {
        match self.get(key)? {
            Some(bytes) => Ok(Some(String::from_utf8(bytes)?)),
            None => Ok(None),
        }
    }

    /// Overwrite one key.
    pub fn set(&self, key: &str, value: impl AsRef<[u8]>) -> Result<()> {
        let shard = self.shard_index(key);
        self.shards[shard]
            .put(key.as_bytes(), value.as_ref())
            .map_err(|e| self.shard_err(shard, e))
    }

    /// Delete one key.
    pub fn delete(&self, key: &str) -> Result<()> {
        let shard = self.shard_index(key);
        self.shards[shard]
            .delete(key.as_bytes())
            .map_err(|e| self.shard_err(shard, e))
    }

    /// Atomically append `",{suffix}"` to the key's value, creating the
    /// key when absent.
    pub fn merge(&self, key: &str, suffix: &str) -> Result<()> {
        let shard = self.shard_index(key);
        self.shards[shard]
            .merge(key.as_bytes(), suffix.as_bytes())
            .map_err(|e| self.shard_err(shard, e))
    }

    /// Flush the write-ahead log of every shard to durable media.
    pub fn sync(&self) -> Result<()> {
        for (shard, db) in self.shards.iter().enumerate() {
            db.flush_wal(true).map_err(|e| self.shard_err(shard, e))?;
        }
        Ok(())
    }

    /// Merge a buffer of `key → row segments` entries, one batched
    /// commit stream per shard, shards written in parallel.
    ///
    /// Segment lists are joined with `,` and issued as a single merge
    /// per key, so the rows of one key land in buffer order.
    pub fn bulk_merge(&self, entries: &HashMap<String, Vec<String>>) -> Result<()> {
        let mut per_shard = vec![Vec::new(); self.shards.len()];
        for (key, segments) in entries {
            if segments.is_empty() {
                continue;
            }
            let suffix = quagga_chain::record::join_segments(segments);
            per_shard[self.shard_index(key)].push((key.as_str(), suffix));
        }
        self.commit_shards(per_shard, WriteKind::Merge)
    }

    /// Write a buffer of `key → value` entries with `set` semantics,
    /// batched per shard in parallel.
    pub fn bulk_write(&self, entries: &HashMap<String, String>) -> Result<()> {
        let mut per_shard = vec![Vec::new(); self.shards.len()];
        for (key, value) in entries {
            per_shard[self.shard_index(key)].push((key.as_str(), value.clone()));
        }
        self.commit_shards(per_shard, WriteKind::Put)
    }

    /// Parallel point reads; absent keys are left out of the result.
    pub fn bulk_query<'a, I>(&self, keys: I) -> Result<HashMap<String, String>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut per_shard: Vec<Vec<&str>> = vec![Vec::new(); self.shards.len()];
        for key in keys {
            per_shard[self.shard_index(key)].push(key);
        }

        let error: Mutex<Option<StoreError>> = Mutex::new(None);
        let found: Mutex<HashMap<String, String>> = Mutex::new(HashMap::new());
        std::thread::scope(|scope| {
            for (shard, keys) in per_shard.into_iter().enumerate() {
                if keys.is_empty() {
                    continue;
                }
                let error = &error;
                let found = &found;
                let db = &self.shards[shard];
                let this = &*self;
                scope.spawn(move || {
                    let mut local = HashMap::with_capacity(keys.len());
                    for key in keys {
                        match db.get(key.as_bytes()) {
                            Ok(Some(bytes)) => match String::from_utf8(bytes) {
                                Ok(value) => {
                                    local.insert(key.to_string(), value);
                                }
                                Err(e) => {
                                    record_first(error, StoreError::NotUtf8(e));
                                    return;
                                }
                            },
                            Ok(None) => {}
                            Err(e) => {
                                record_first(error, this.shard_err(shard, e));
                                return;
                            }
                        }
                    }
                    found.lock().expect("query map lock").extend(local);
                });
            }
        });

        match error.into_inner().expect("query error lock") {
            Some(e) => Err(e),
            None => Ok(found.into_inner().expect("query map lock")),
        }
    }

    /// First `limit` key/value pairs across shards, in shard order.
    ///
    /// Used by the verifier to drain a queue store; the traversal
    /// order is stable for a given key set but is not a global key
    /// order.
    pub fn scan_n(&self, limit: usize) -> Result<Vec<(String, String)>> {
        let mut rows = Vec::new();
        for (shard, db) in self.shards.iter().enumerate() {
            if rows.len() >= limit {
                break;
            }
            for item in db.iterator(IteratorMode::Start) {
                let (key, value) = item.map_err(|e| self.shard_err(shard, e))?;
                rows.push((
                    String::from_utf8(key.into_vec())?,
                    String::from_utf8(value.into_vec())?,
                ));
                if rows.len() >= limit {
                    break;
                }
            }
        }
        Ok(rows)
    }

    /// Commit per-shard entry lists, one worker per shard up to the
    /// configured worker count.
    ///
    /// The first failing commit aborts the whole call; sibling workers
    /// observe the abort flag at their next batch boundary and stop.
    /// Partial commits may have landed on some shards; the caller
    /// treats the enclosing block as not indexed and retries.
    fn commit_shards(&self, per_shard: Vec<Vec<(&str, String)>>, kind: WriteKind) -> Result<()> {
        let busy: Vec<(usize, Vec<(&str, String)>)> = per_shard
            .into_iter()
            .enumerate()
            .filter(|(_, entries)| !entries.is_empty())
            .collect();
        if busy.is_empty() {
            return Ok(());
        }

        let workers = self.worker_count.min(busy.len());
        let mut assignments: Vec<Vec<(usize, Vec<(&str, String)>)>> =
            (0..workers).map(|_| Vec::new()).collect();
        for (slot, shard_entries) in busy.into_iter().enumerate() {
            assignments[slot % workers].push(shard_entries);
        }

        let abort = AtomicBool::new(false);
        let error: Mutex<Option<StoreError>> = Mutex::new(None);
        let kind = &kind;
        std::thread::scope(|scope| {
            for assigned in assignments {
                let abort = &abort;
                let error = &error;
                let this = &*self;
                scope.spawn(move || {
                    for (shard, entries) in assigned {
                        if abort.load(Ordering::Relaxed) {
                            return;
                        }
                        if let Err(e) = this.write_shard(shard, entries, kind, abort) {
                            abort.store(true, Ordering::Relaxed);
                            record_first(error, e);
                            return;
                        }
                    }
                });
            }
        });

        match error.into_inner().expect("commit error lock") {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Stream one shard's entries through size-capped write batches.
    ///
    /// Intermediate batches commit with a non-synced WAL for
    /// throughput; the final batch commits synced so a completed bulk
    /// call survives a crash once `sync()` confirms it.
    fn write_shard(
        &self,
        shard: usize,
        entries: Vec<(&str, String)>,
        kind: &WriteKind,
        abort: &AtomicBool,
    ) -> Result<()> {
        let db = &self.shards[shard];
        let total = entries.len();

        let mut batch = WriteBatch::default();
        let mut buffered = 0usize;
        let mut buffered_bytes = 0usize;
        for (key, value) in entries {
            match kind {
                WriteKind::Put => batch.put(key.as_bytes(), value.as_bytes()),
                WriteKind::Merge => batch.merge(key.as_bytes(), value.as_bytes()),
            }
            buffered += 1;
            buffered_bytes += key.len() + value.len();

            if buffered >= MAX_BATCH_ENTRIES || buffered_bytes >= self.max_batch_bytes {
                if abort.load(Ordering::Relaxed) {
                    return Err(StoreError::Aborted);
                }
                let mut write_opts = WriteOptions::default();
                write_opts.set_sync(false);
                db.write_opt(std::mem::take(&mut batch), &write_opts)
                    .map_err(|e| self.shard_err(shard, e))?;
                metrics::counter!("store.batch.commit.count", 1);
                buffered = 0;
                buffered_bytes = 0;
            }
        }

        if buffered > 0 {
            let mut write_opts = WriteOptions::default();
            write_opts.set_sync(true);
            db.write_opt(batch, &write_opts)
                .map_err(|e| self.shard_err(shard, e))?;
            metrics::counter!("store.batch.commit.count", 1);
        }

        trace!(
            store = %self.name,
            shard,
            entries = total,
            "committed shard batch"
        );
        Ok(())
    }
}

fn record_first(slot: &Mutex<Option<StoreError>>, error: StoreError) {
    let mut slot = slot.lock().expect("error slot lock");
    if slot.is_none() {
        *slot = Some(error);
    }
}
