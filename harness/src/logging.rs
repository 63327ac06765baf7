//! Diagnostic tracing for the harness.
//!
//! # Separation of Concerns
//!
//! - **Tracing (this module)**: operator diagnostics via `RUST_LOG`, output to
//!   stderr. Not persisted.
//!
//! - **Cycle artifacts (`io/report`, `io/health_store`)**: product output in
//!   `daemon/`. Always written, unaffected by `RUST_LOG`.
//!
//! Banners and progress markers go to stdout so scheduler logs stay readable.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Defaults to `info` if unset, since unattended runs are
/// only ever inspected through their logs.
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=harness=debug harness run
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
