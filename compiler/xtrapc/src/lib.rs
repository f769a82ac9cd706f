//! The xtrap instrumentation driver.
//!
//! Loads the engine configuration, rule file and package manifest once,
//! instruments every unit handed on the command line in parallel, and writes
//! the rewritten sources plus the synthetic registration files.
//!
//! The binary (`src/main.rs`) only parses arguments; everything it runs lives
//! in [`commands`] so tests can drive it directly.

pub mod commands;
mod error;

use std::sync::Once;

pub use error::DriverError;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Safe to call more than once. Enable with `RUST_LOG=xtrap_instrument=debug`
/// (per-unit spans and skip reasons) or `RUST_LOG=trace`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{prelude::*, EnvFilter};

        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::registry()
                .with(EnvFilter::from_default_env())
                .with(tracing_tree::HierarchicalLayer::new(2).with_targets(true))
                .init();
        }
    });
}
