//! Component log levels.
//!
//! Numeric values follow the classic severity scale so a level can travel
//! inside a start request. The two framework levels sit below `Debug` and
//! are emitted through `tracing` at `TRACE`.

use crate::TelemetryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity of a component log record.
///
/// Variants are declared in ascending order so `Ord` matches the numeric
/// value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum LogLevel {
    /// Detailed framework messages, e.g. every input and output operation.
    FrameworkVerbose = 4,
    /// Sparse framework messages, e.g. lifecycle transitions.
    Framework = 6,
    Debug = 10,
    Info = 20,
    Warning = 30,
    Error = 40,
    Critical = 50,
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl LogLevel {
    pub const ALL: [LogLevel; 7] = [
        LogLevel::FrameworkVerbose,
        LogLevel::Framework,
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warning,
        LogLevel::Error,
        LogLevel::Critical,
    ];

    /// Numeric severity.
    #[must_use]
    pub fn value(self) -> u8 {
        self as u8
    }

    /// Level with exactly this numeric severity.
    #[must_use]
    pub fn from_value(value: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.value() == value)
    }

    /// Upper-case name used in formatted records.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            LogLevel::FrameworkVerbose => "SIC_DEBUG_FRAMEWORK_VERBOSE",
            LogLevel::Framework => "SIC_DEBUG_FRAMEWORK",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }

    /// The `tracing` level a record of this severity is emitted at.
    #[must_use]
    pub fn as_tracing(self) -> tracing::Level {
        match self {
            LogLevel::FrameworkVerbose | LogLevel::Framework => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warning => tracing::Level::WARN,
            LogLevel::Error | LogLevel::Critical => tracing::Level::ERROR,
        }
    }

    /// Whether a logger at `self` emits a record at `record`.
    #[must_use]
    pub fn enables(self, record: LogLevel) -> bool {
        record >= self
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LogLevel {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(value) = trimmed.parse::<u8>() {
            return Self::from_value(value)
                .ok_or_else(|| TelemetryError::Config(format!("unknown log level value {value}")));
        }

        match trimmed.to_ascii_uppercase().as_str() {
            "SIC_DEBUG_FRAMEWORK_VERBOSE" | "FRAMEWORK_VERBOSE" => Ok(LogLevel::FrameworkVerbose),
            "SIC_DEBUG_FRAMEWORK" | "FRAMEWORK" => Ok(LogLevel::Framework),
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARNING" | "WARN" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            "CRITICAL" => Ok(LogLevel::Critical),
            other => Err(TelemetryError::Config(format!("unknown log level {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_matches_values() {
        for pair in LogLevel::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].value() < pair[1].value());
        }
    }

    #[test]
    fn test_enables() {
        assert!(LogLevel::Info.enables(LogLevel::Error));
        assert!(LogLevel::Info.enables(LogLevel::Info));
        assert!(!LogLevel::Info.enables(LogLevel::Debug));
        assert!(LogLevel::FrameworkVerbose.enables(LogLevel::Framework));
    }

    #[test]
    fn test_parse_names_and_values() {
        assert_eq!("info".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert_eq!("WARN".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert_eq!(
            "SIC_DEBUG_FRAMEWORK".parse::<LogLevel>().unwrap(),
            LogLevel::Framework
        );
        assert_eq!("4".parse::<LogLevel>().unwrap(), LogLevel::FrameworkVerbose);
        assert!("7".parse::<LogLevel>().is_err());
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_framework_levels_map_to_trace() {
        assert_eq!(LogLevel::Framework.as_tracing(), tracing::Level::TRACE);
        assert_eq!(LogLevel::Critical.as_tracing(), tracing::Level::ERROR);
    }
}
