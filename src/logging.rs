//! Logging setup.
//!
//! All output goes to **stderr**; stdout carries only the handshake line.
//! Filtering follows `RUST_LOG`, e.g. `RUST_LOG=hemmer_provider_azurerm=debug`
//! to see every Resource Manager request and poll.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn try_init_with(filter: EnvFilter) -> Result<(), tracing_subscriber::util::TryInitError> {
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .try_init()
}

/// Install the stderr subscriber, defaulting to `info`.
///
/// Does nothing if a global subscriber is already set.
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Like [`init_logging`], with a different level when `RUST_LOG` is unset.
///
/// ```
/// hemmer_provider_azurerm::init_logging_with_default("debug");
/// ```
pub fn init_logging_with_default(default_level: &str) {
    let _ = try_init_with(filter(default_level));
}

/// Install the subscriber, returning `false` if one was already set.
pub fn try_init_logging() -> bool {
    try_init_with(filter("info")).is_ok()
}
