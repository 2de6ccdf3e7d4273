//! Per-component logger.

use crate::sink::{DiagnosticSink, TracingSink};
use crate::LogLevel;
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Logger owned by one component instance.
///
/// Records below the logger's level are discarded before any sink sees
/// them. Clones share the level and the sink list.
#[derive(Clone)]
pub struct ComponentLogger {
    name: Arc<str>,
    level: Arc<AtomicU8>,
    sinks: Arc<RwLock<Vec<Arc<dyn DiagnosticSink>>>>,
}

impl ComponentLogger {
    /// Logger writing to the terminal sink only.
    #[must_use]
    pub fn new(name: impl Into<String>, level: LogLevel) -> Self {
        Self::with_sinks(name, level, vec![Arc::new(TracingSink)])
    }

    /// Logger with an explicit sink list.
    #[must_use]
    pub fn with_sinks(
        name: impl Into<String>,
        level: LogLevel,
        sinks: Vec<Arc<dyn DiagnosticSink>>,
    ) -> Self {
        Self {
            name: Arc::from(name.into()),
            level: Arc::new(AtomicU8::new(level.value())),
            sinks: Arc::new(RwLock::new(sinks)),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn level(&self) -> LogLevel {
        LogLevel::from_value(self.level.load(Ordering::Relaxed)).unwrap_or_default()
    }

    pub fn set_level(&self, level: LogLevel) {
        self.level.store(level.value(), Ordering::Relaxed);
    }

    pub fn add_sink(&self, sink: Arc<dyn DiagnosticSink>) {
        self.sinks.write().push(sink);
    }

    #[must_use]
    pub fn sink_count(&self) -> usize {
        self.sinks.read().len()
    }

    #[must_use]
    pub fn enabled(&self, level: LogLevel) -> bool {
        self.level().enables(level)
    }

    pub fn log(&self, level: LogLevel, message: impl AsRef<str>) {
        if !self.enabled(level) {
            return;
        }
        let sinks = self.sinks.read().clone();
        for sink in sinks {
            sink.write(&self.name, level, message.as_ref());
        }
    }

    pub fn critical(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Critical, message);
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Error, message);
    }

    pub fn warning(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Warning, message);
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Info, message);
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Debug, message);
    }

    pub fn framework(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Framework, message);
    }

    pub fn framework_verbose(&self, message: impl AsRef<str>) {
        self.log(LogLevel::FrameworkVerbose, message);
    }
}

impl fmt::Debug for ComponentLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentLogger")
            .field("name", &self.name)
            .field("level", &self.level())
            .field("sinks", &self.sink_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    fn memory_logger(level: LogLevel) -> (ComponentLogger, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let logger = ComponentLogger::with_sinks("Test 127.0.0.1", level, vec![sink.clone()]);
        (logger, sink)
    }

    #[test]
    fn test_level_gate() {
        let (logger, sink) = memory_logger(LogLevel::Info);
        logger.debug("hidden");
        logger.framework("hidden");
        logger.info("shown");
        logger.critical("shown too");

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].1, LogLevel::Info);
        assert_eq!(records[1].1, LogLevel::Critical);
    }

    #[test]
    fn test_set_level_shared_by_clones() {
        let (logger, sink) = memory_logger(LogLevel::Warning);
        let clone = logger.clone();
        clone.set_level(LogLevel::FrameworkVerbose);

        logger.framework_verbose("now visible");
        assert_eq!(logger.level(), LogLevel::FrameworkVerbose);
        assert_eq!(sink.records().len(), 1);
    }

    #[test]
    fn test_fan_out_to_added_sink() {
        let (logger, first) = memory_logger(LogLevel::Info);
        let second = Arc::new(MemorySink::new());
        logger.add_sink(second.clone());

        logger.warning("both");
        assert!(first.contains("both"));
        assert!(second.contains("both"));
        assert_eq!(logger.sink_count(), 2);
    }

    #[test]
    fn test_records_carry_logger_name() {
        let (logger, sink) = memory_logger(LogLevel::Info);
        logger.error("boom");
        assert_eq!(sink.records()[0].0, "Test 127.0.0.1");
    }
}
