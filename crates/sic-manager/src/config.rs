//! Manager and connector configuration.

use sic_bus::BusConfig;
use sic_component::{local_ip, FusionConfig};
use sic_message::Message;
use sic_telemetry::LogLevel;
use std::env;
use std::time::Duration;

/// Time a connector waits for a ping reply.
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(1);

/// Time a connector waits for a user request reply.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(100);

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Host address; the manager listens on this bare channel name.
    pub ip: String,
    /// Replaces every class startup timeout when set.
    pub startup_timeout: Option<Duration>,
    /// Level of the manager's own logger.
    pub log_level: LogLevel,
    pub bus: BusConfig,
    /// Fusion settings for services the manager starts.
    pub fusion: FusionConfig,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            ip: local_ip(),
            startup_timeout: None,
            log_level: LogLevel::Info,
            bus: BusConfig::default(),
            fusion: FusionConfig::default(),
        }
    }
}

impl ManagerConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SIC_HOST_IP`: host address (default: detected)
    /// - `SIC_MANAGER_STARTUP_TIMEOUT_MS`: override of class startup timeouts
    /// - `SIC_MANAGER_LOG_LEVEL`: manager log level name or number (default: INFO)
    ///
    /// Bus and fusion settings are read by their own `from_env`.
    pub fn from_env() -> Self {
        Self {
            ip: local_ip(),
            startup_timeout: env::var("SIC_MANAGER_STARTUP_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis),
            log_level: env::var("SIC_MANAGER_LOG_LEVEL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(LogLevel::Info),
            bus: BusConfig::from_env(),
            fusion: FusionConfig::from_env(),
        }
    }

    #[must_use]
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = ip.into();
        self
    }
}

/// How a connector reaches and configures its component.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    pub ping_timeout: Duration,
    /// Wait for the manager's start reply. Defaults to the class startup
    /// timeout plus `ping_timeout`.
    pub start_timeout: Option<Duration>,
    pub request_timeout: Duration,
    /// Log level requested for a component the connector has started.
    pub log_level: LogLevel,
    /// Configuration for a component the connector has started.
    pub conf: Option<Box<dyn Message>>,
    /// Re-emit records from the logging channel through `tracing`.
    pub forward_logs: bool,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            ping_timeout: DEFAULT_PING_TIMEOUT,
            start_timeout: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            log_level: LogLevel::Info,
            conf: None,
            forward_logs: false,
        }
    }
}

impl ConnectorConfig {
    #[must_use]
    pub fn with_conf(mut self, conf: Box<dyn Message>) -> Self {
        self.conf = Some(conf);
        self
    }

    #[must_use]
    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }
}
