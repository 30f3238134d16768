//! A process-wide pool of reusable row buffers.
//!
//! Row serialization is hot during initial sync; the pool keeps a
//! bounded set of `String` buffers alive so per-batch encoding does
//! not reallocate. Buffers are cleared before reuse.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use lazy_static::lazy_static;

/// Maximum number of pooled buffers.
const POOL_SLOTS: usize = 256;

/// Default per-buffer retention cap, overridable once at startup.
const DEFAULT_BUFFER_BYTES: usize = 64 * 1024;

lazy_static! {
    static ref POOL: Mutex<Vec<String>> = Mutex::new(Vec::new());
}

static BUFFER_BYTES: AtomicUsize = AtomicUsize::new(DEFAULT_BUFFER_BYTES);

/// Set the per-buffer retention cap, in KiB. Called once at process
/// startup, before any store is opened.
pub fn init(byte_pool_kb: usize) {
    BUFFER_BYTES.store(byte_pool_kb * 1024, Ordering::Relaxed);
}

/// Take a cleared buffer from the pool, or allocate a fresh one.
pub fn take() -> String {
    POOL.lock()
        .ok()
        .and_then(|mut pool| pool.pop())
        .unwrap_or_default()
}

/// Return a buffer to the pool.
///
/// Oversized buffers are dropped instead of retained, so one giant
/// block cannot pin its peak allocation for the process lifetime.
pub fn put(mut buf: String) {
    buf.clear();
    if buf.capacity() > BUFFER_BYTES.load(Ordering::Relaxed) {
        return;
    }
    if let Ok(mut pool) = POOL.lock() {
        if pool.len() < POOL_SLOTS {
            pool.push(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returned_buffers_come_back_cleared() {
        let mut buf = take();
        buf.push_str("abcdef");
        put(buf);

        assert!(take().is_empty());
    }
}
