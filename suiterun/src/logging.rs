//! Development-time tracing for debugging the engine.
//!
//! Tracing is diagnostics only. Reporter output goes through
//! [`crate::events`] and is unaffected by `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing subscriber for development logging.
///
/// Reads `RUST_LOG` env var. Defaults to `warn` if unset.
/// Output: stderr, compact format. Safe to call more than once; later calls
/// are no-ops.
///
/// # Example
/// ```bash
/// RUST_LOG=suiterun=debug cargo test
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    if let Err(err) = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init()
    {
        tracing::debug!(error = %err, "tracing subscriber already installed");
    }
}
