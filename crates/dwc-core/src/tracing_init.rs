//! Shared tracing/logging initialization.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{Error, Result};

/// Crates whose events are enabled at the configured level when `RUST_LOG`
/// is not set.
const LOGGED_CRATES: &[&str] = &["dwc_coordinator", "dwc_core"];

/// Build the default env-filter directive for a log level, e.g.
/// `"dwc_coordinator=info,dwc_core=info"`.
pub fn default_filter(log_level: &str) -> String {
    LOGGED_CRATES
        .iter()
        .map(|krate| format!("{krate}={log_level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Initialise the global tracing subscriber.
///
/// `RUST_LOG` wins over `log_level` when set. With `log_json` every event is
/// emitted as one JSON object per line for log aggregation.
pub fn init_tracing(log_level: &str, log_json: bool) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter(log_level)),
    )
    .map_err(|e| Error::Config(format!("Invalid log filter: {e}")))?;

    let installed = if log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
    };
    installed.map_err(|e| Error::Config(format!("Tracing already initialised: {e}")))
}
