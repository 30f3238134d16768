//! Per-batch write buffers.
//!
//! The output and input passes accumulate rows here while iterating a
//! batch of transactions, then flush each buffer through the store's
//! bulk API. Buffers are explicitly cleared on flush and reused for
//! the next batch; encoded segments go back to the process-wide
//! buffer pool.

use std::collections::HashMap;

use quagga_chain::record::{pool, EncodeRecord};
use quagga_store::ShardedStore;

use crate::Result;

/// Accumulates `key → row segments` for a merge store.
///
/// Segments are appended in push order, which fixes the merge order
/// within the batch.
#[derive(Default)]
pub(crate) struct MergeBuffer {
    entries: HashMap<String, Vec<String>>,
    rows: usize,
}

impl MergeBuffer {
    pub(crate) fn push(&mut self, key: String, row: &impl EncodeRecord) -> Result<()> {
        let mut segment = pool::take();
        row.encode_record(&mut segment)?;
        self.entries.entry(key).or_default().push(segment);
        self.rows += 1;
        Ok(())
    }

    pub(crate) fn rows(&self) -> usize {
        self.rows
    }

    /// Bulk-merge the buffered rows and clear the buffer.
    pub(crate) fn flush(&mut self, store: &ShardedStore) -> Result<()> {
        if self.entries.is_empty() {
            return Ok(());
        }
        store.bulk_merge(&self.entries)?;
        for (_, segments) in self.entries.drain() {
            for segment in segments {
                pool::put(segment);
            }
        }
        self.rows = 0;
        Ok(())
    }
}

/// Accumulates singleton rows with first-write-wins semantics.
///
/// A later push to an occupied key is dropped, both within the batch
/// (the map keeps the first value) and against the store (present keys
/// are filtered out before the bulk write), so metadata written by an
/// earlier block never gets rewritten.
#[derive(Default)]
pub(crate) struct WriteOnceBuffer {
    entries: HashMap<String, String>,
}

impl WriteOnceBuffer {
    pub(crate) fn put_first(&mut self, key: String, row: &impl EncodeRecord) -> Result<()> {
        if self.entries.contains_key(&key) {
            return Ok(());
        }
        let mut value = pool::take();
        row.encode_record(&mut value)?;
        self.entries.insert(key, value);
        Ok(())
    }

    /// Write the buffered singletons that do not exist yet, then clear.
    pub(crate) fn flush(&mut self, store: &ShardedStore) -> Result<()> {
        if self.entries.is_empty() {
            return Ok(());
        }
        let existing = store.bulk_query(self.entries.keys().map(|k| k.as_str()))?;
        for key in existing.keys() {
            self.entries.remove(key);
        }
        store.bulk_write(&self.entries)?;
        for (_, value) in self.entries.drain() {
            pool::put(value);
        }
        Ok(())
    }
}
