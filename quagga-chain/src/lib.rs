//! Chain-facing data structures for the quagga contract indexer.
//!
//! This crate defines the in-memory block model produced by chain
//! adapters, the contract payload variants recognised by script
//! decoders, and the ASCII record codec shared by every derived store.
//! It deliberately contains no storage or networking code.

#![allow(clippy::unit_arg)]

pub mod archive;
pub mod block;
pub mod contract;
pub mod parameters;
pub mod record;
pub mod transaction;
pub mod transparent;

pub use record::{DecodeRecord, EncodeRecord, RecordError};
