//! The quagga process shell.
//!
//! Chain adapters are external collaborators, one crate per chain,
//! so this crate is the embedding surface rather than a binary: a
//! downstream crate links its adapter, loads a [`Config`], and hands
//! both to [`Runtime::start`]. The runtime opens the stores, spawns
//! the coordinator, the verifiers, and the mempool listener, and
//! tears everything down in the contract order on shutdown.

pub mod config;
mod runtime;

pub use config::Config;
pub use runtime::{Runtime, RuntimeError};

use tracing_subscriber::EnvFilter;

/// Install the process-wide tracing subscriber.
///
/// Called once by the embedding binary before [`Runtime::start`];
/// `RUST_LOG` overrides the default `info` filter.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}
