use std::path::PathBuf;

use displaydoc::Display;
use thiserror::Error;

/// A storage layer error.
#[derive(Display, Error, Debug)]
pub enum StoreError {
    /// shard {shard} of store {store}: {source}
    Engine {
        store: String,
        shard: usize,
        #[source]
        source: rocksdb::Error,
    },

    /// cannot open {path}: {source}
    Open {
        path: PathBuf,
        #[source]
        source: rocksdb::Error,
    },

    /// io error at {path}: {source}
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// store value is not utf-8: {0}
    NotUtf8(#[from] std::string::FromUtf8Error),

    /// data directory was created with shard_count {stored}, config requests {requested}
    ShardCountMismatch { stored: usize, requested: usize },

    /// data directory has schema version {stored}, this build expects {expected}
    SchemaVersion { stored: u64, expected: u64 },

    /// meta value for {key} is not decimal ascii
    MetaValue { key: String },

    /// bulk operation aborted after a sibling shard failed
    Aborted,
}
