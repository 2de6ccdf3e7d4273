//! Diagnostic sink that broadcasts records on the shared logging channel.

use crate::bus::WeakBus;
use sic_message::{Log, LogMessage};
use sic_telemetry::{format_record, DiagnosticSink, LogLevel};
use tracing::debug;

/// Channel every component's diagnostics are broadcast on.
pub const LOG_CHANNEL: &str = "sic:logging";

/// Publishes each record as a [`LogMessage`] on [`LOG_CHANNEL`].
///
/// Holds the bus weakly so a logger attached to its own bus does not keep
/// that bus alive. Records written outside a tokio runtime or after the bus
/// closed are dropped.
pub struct BusLogSink {
    bus: WeakBus,
}

impl BusLogSink {
    #[must_use]
    pub fn new(bus: WeakBus) -> Self {
        Self { bus }
    }
}

impl DiagnosticSink for BusLogSink {
    fn write(&self, name: &str, level: LogLevel, message: &str) {
        let Some(bus) = self.bus.upgrade() else {
            return;
        };
        if bus.is_closed() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let record = LogMessage::new(Log {
            msg: format_record(name, level, message),
        });
        runtime.spawn(async move {
            if let Err(err) = bus.publish(LOG_CHANNEL, &record).await {
                debug!(bus = %bus.name(), error = %err, "Dropped log record");
            }
        });
    }
}
