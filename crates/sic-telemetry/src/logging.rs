//! Process-wide log subscriber.
//!
//! Installs a `tracing-subscriber` registry with an `EnvFilter` built from
//! the configured directive and either a plain or a JSON formatting layer.

use crate::{TelemetryConfig, TelemetryError};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber.
///
/// Fails with `SubscriberInit` when a global subscriber is already set,
/// which is the normal outcome for a second call within one process.
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(&config.log_level)
        .map_err(|e| TelemetryError::Config(format!("{}: {}", config.log_level, e)))?;

    if !config.console_output {
        return Ok(());
    }

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json_logs {
        registry
            .with(fmt::layer().json().with_target(true))
            .try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };
    installed.map_err(|e| TelemetryError::SubscriberInit(e.to_string()))?;

    tracing::debug!(
        service = %config.service_name,
        json_logs = config.json_logs,
        "Logging initialized"
    );
    Ok(())
}
