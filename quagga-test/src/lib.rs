//! Shared test infrastructure for quagga crates.
//!
//! Every test calls [`init`] first, so tracing output and error
//! reports are wired up exactly once per test binary regardless of
//! which test runs first.

use lazy_static::lazy_static;
use tracing_subscriber::EnvFilter;

pub mod prelude {
    //! Common test imports.
    pub use color_eyre::eyre::{eyre, Report};

    /// The result type test functions return.
    pub type Result<T = ()> = color_eyre::eyre::Result<T>;
}

lazy_static! {
    static ref INSTALLED: () = {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_test_writer()
            .try_init();
        let _ = color_eyre::install();
    };
}

/// Install the tracing subscriber and panic/error hooks for tests.
///
/// Calling this more than once is free.
pub fn init() {
    lazy_static::initialize(&INSTALLED);
}
