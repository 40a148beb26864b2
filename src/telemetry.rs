//! Tracing subscriber setup for binaries.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs a formatting subscriber for the process.
///
/// `RUST_LOG` wins when set; otherwise `fallback` is used as the filter
/// directive, and an unparsable directive falls back to `info`.
///
/// # Errors
///
/// Returns an error when a global subscriber is already installed.
pub fn init_tracing(fallback: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init()
}
