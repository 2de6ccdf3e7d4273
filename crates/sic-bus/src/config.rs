//! Bus configuration.

use std::env;
use std::time::Duration;

/// Default time `close()` waits for in-flight handlers.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct BusConfig {
    /// How long `close()` waits for subscription tasks before aborting them.
    pub shutdown_grace: Duration,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

impl BusConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SIC_BUS_SHUTDOWN_GRACE_MS`: shutdown grace in milliseconds (default: 2000)
    pub fn from_env() -> Self {
        Self {
            shutdown_grace: env::var("SIC_BUS_SHUTDOWN_GRACE_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_SHUTDOWN_GRACE),
        }
    }
}
