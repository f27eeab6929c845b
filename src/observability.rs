//! Tracing setup for the binary

use tracing_subscriber::EnvFilter;

use crate::config::TelemetryConfig;

/// Install a stderr `fmt` subscriber.
///
/// `RUST_LOG` wins over `telemetry.log_filter`. Calling this twice is
/// harmless; the second subscriber is ignored.
pub fn init(telemetry: &TelemetryConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&telemetry.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
