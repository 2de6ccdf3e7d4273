//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for the process-wide log subscriber.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup log line
    pub service_name: String,

    /// Subscriber filter directive (trace, debug, info, warn, error or a full
    /// `EnvFilter` expression)
    pub log_level: String,

    /// Whether to install a terminal layer
    pub console_output: bool,

    /// Whether to emit JSON formatted logs
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "sic".to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SIC_SERVICE_NAME`: Service name (default: sic)
    /// - `SIC_LOG_LEVEL` or `RUST_LOG`: Filter directive (default: info)
    /// - `SIC_CONSOLE_OUTPUT`: Enable terminal output (default: true)
    /// - `SIC_JSON_LOGS`: Enable JSON logs (default: false)
    pub fn from_env() -> Self {
        Self {
            service_name: env::var("SIC_SERVICE_NAME").unwrap_or_else(|_| "sic".to_string()),

            log_level: env::var("SIC_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            console_output: env::var("SIC_CONSOLE_OUTPUT")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(true),

            json_logs: env::var("SIC_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(false),
        }
    }

    /// Configuration for a named service, other fields from the environment.
    pub fn for_service(service_name: &str) -> Self {
        let mut config = Self::from_env();
        config.service_name = service_name.to_string();
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "sic");
        assert_eq!(config.log_level, "info");
        assert!(config.console_output);
        assert!(!config.json_logs);
    }

    #[test]
    fn test_for_service() {
        let config = TelemetryConfig::for_service("component-manager");
        assert_eq!(config.service_name, "component-manager");
    }
}
