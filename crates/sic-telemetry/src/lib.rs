//! # SIC Telemetry
//!
//! Logging for framework components.
//!
//! ## Components
//!
//! - **Levels**: standard severities plus two framework debug levels below `DEBUG`
//! - **Sinks**: the diagnostic write interface (`DiagnosticSink`) and its
//!   terminal implementation (`TracingSink`)
//! - **Logger**: `ComponentLogger`, gated by the component's own level and
//!   fanned out to every attached sink
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sic_telemetry::{init_logging, ComponentLogger, LogLevel, TelemetryConfig};
//!
//! init_logging(&TelemetryConfig::from_env())?;
//! let logger = ComponentLogger::new("FaceDetection 10.0.0.2", LogLevel::Info);
//! logger.info("Started");
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SIC_LOG_LEVEL` / `RUST_LOG` | `info` | Subscriber filter directive |
//! | `SIC_JSON_LOGS` | `false` | JSON formatted output |
//! | `SIC_CONSOLE_OUTPUT` | `true` | Install a terminal layer at all |

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod config;
mod level;
mod logger;
mod logging;
mod sink;

pub use config::TelemetryConfig;
pub use level::LogLevel;
pub use logger::ComponentLogger;
pub use logging::init_logging;
pub use sink::{format_record, DiagnosticSink, MemorySink, TracingSink};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to install log subscriber: {0}")]
    SubscriberInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}
