use thiserror::Error;

use crate::adapter::BoxError;

/// An indexing pipeline error.
///
/// Block-local errors abort the current block and surface here; the
/// coordinator turns them into retries from the last persisted
/// height. Mempool-local errors are swallowed per transaction and
/// never reach this type's callers.
#[derive(Error, Debug)]
pub enum IndexError {
    /// A store read or commit failed; the block must be retried.
    #[error("storage error: {0}")]
    Store(#[from] quagga_store::StoreError),

    /// A value failed to encode or decode against its row schema.
    #[error("record error: {0}")]
    Record(#[from] quagga_chain::RecordError),

    /// The chain adapter failed a blocking call.
    #[error("chain adapter error: {0}")]
    Adapter(#[source] BoxError),

    /// The block archive failed.
    #[error("archive error: {0}")]
    Archive(#[from] quagga_chain::archive::ArchiveError),
}

impl IndexError {
    /// Wrap an adapter transport error.
    pub fn adapter(error: BoxError) -> IndexError {
        IndexError::Adapter(error)
    }
}
