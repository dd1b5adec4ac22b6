//! Subscriber setup for the provisioner's `tracing` events.
//!
//! The provisioner only emits `tracing` events; embedding applications that
//! have no subscriber of their own can install this one.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Error installing the global subscriber.
pub type LoggingError = Box<dyn std::error::Error + Send + Sync>;

/// Install a global subscriber that writes one JSON object per event.
///
/// `RUST_LOG` takes precedence over `filter` (e.g., "info,xavyo_provisioner=debug").
/// Fails if the filter is invalid or a subscriber is already installed.
pub fn init_logging(filter: &str) -> Result<(), LoggingError> {
    let filter_layer = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(filter))?;

    let fmt_layer = fmt::layer()
        .json()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter_layer)
        .try_init()?;

    tracing::debug!(filter = %filter, "JSON logging installed");
    Ok(())
}

/// Plain-text logging captured by the test harness. Safe to call repeatedly.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("debug")
        .try_init();
}
