//! Diagnostic sinks.
//!
//! A sink receives every record a `ComponentLogger` lets through. The
//! terminal sink forwards to `tracing`; the broadcast sink that publishes
//! onto the shared logging channel lives with the bus.

use crate::LogLevel;
use parking_lot::Mutex;
use tracing::{debug, error, info, trace, warn};

/// Write interface for component diagnostics.
pub trait DiagnosticSink: Send + Sync {
    /// Write one record from the logger `name`.
    fn write(&self, name: &str, level: LogLevel, message: &str);
}

/// Render a record in the framework's line format.
///
/// `name` is expected to already carry the host address, e.g.
/// `"Camera 10.0.0.4"`.
#[must_use]
pub fn format_record(name: &str, level: LogLevel, message: &str) -> String {
    format!("[{}]: {}: {}\n", name, level.name(), message)
}

/// Sink that emits records as `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn write(&self, name: &str, level: LogLevel, message: &str) {
        match level {
            LogLevel::Critical | LogLevel::Error => {
                error!(component = name, level = level.name(), "{}", message)
            }
            LogLevel::Warning => warn!(component = name, "{}", message),
            LogLevel::Info => info!(component = name, "{}", message),
            LogLevel::Debug => debug!(component = name, "{}", message),
            LogLevel::Framework | LogLevel::FrameworkVerbose => {
                trace!(component = name, level = level.name(), "{}", message)
            }
        }
    }
}

/// Sink that keeps records in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<(String, LogLevel, String)>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All records written so far, oldest first.
    #[must_use]
    pub fn records(&self) -> Vec<(String, LogLevel, String)> {
        self.records.lock().clone()
    }

    /// Messages written at exactly `level`.
    #[must_use]
    pub fn messages_at(&self, level: LogLevel) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .filter(|(_, l, _)| *l == level)
            .map(|(_, _, m)| m.clone())
            .collect()
    }

    /// Whether any record contains `needle`.
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.records.lock().iter().any(|(_, _, m)| m.contains(needle))
    }
}

impl DiagnosticSink for MemorySink {
    fn write(&self, name: &str, level: LogLevel, message: &str) {
        self.records
            .lock()
            .push((name.to_string(), level, message.to_string()));
    }
}
