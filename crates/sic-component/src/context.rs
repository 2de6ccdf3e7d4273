//! Per-instance runtime context handed to component code.

use crate::naming::{output_channel, reqreply_channel};
use parking_lot::Mutex;
use sic_bus::{Bus, BusError, Subscription};
use sic_message::Message;
use sic_telemetry::ComponentLogger;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Access to the bus, logger and stop signal of one running instance.
///
/// Cheap to clone.
#[derive(Clone)]
pub struct ComponentContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    name: &'static str,
    ip: String,
    output_channel: String,
    reqreply_channel: String,
    bus: Bus,
    logger: ComponentLogger,
    stop: CancellationToken,
    inputs: Mutex<HashMap<String, Subscription>>,
}

impl ComponentContext {
    pub(crate) fn new(
        name: &'static str,
        ip: String,
        bus: Bus,
        logger: ComponentLogger,
        stop: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                name,
                output_channel: output_channel(name, &ip),
                reqreply_channel: reqreply_channel(name, &ip),
                ip,
                bus,
                logger,
                stop,
                inputs: Mutex::new(HashMap::new()),
            }),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    #[must_use]
    pub fn ip(&self) -> &str {
        &self.inner.ip
    }

    #[must_use]
    pub fn output_channel(&self) -> &str {
        &self.inner.output_channel
    }

    #[must_use]
    pub fn reqreply_channel(&self) -> &str {
        &self.inner.reqreply_channel
    }

    #[must_use]
    pub fn bus(&self) -> &Bus {
        &self.inner.bus
    }

    #[must_use]
    pub fn logger(&self) -> &ComponentLogger {
        &self.inner.logger
    }

    #[must_use]
    pub fn is_stopping(&self) -> bool {
        self.inner.stop.is_cancelled()
    }

    /// Ask the instance to shut down.
    pub fn request_stop(&self) {
        self.inner.stop.cancel();
    }

    /// Resolves once a stop was requested.
    pub fn stopped(&self) -> WaitForCancellationFuture<'_> {
        self.inner.stop.cancelled()
    }

    /// Publish on the output channel with this component as origin.
    pub async fn output<M: Message>(&self, message: M) -> Result<usize, BusError> {
        self.output_boxed(Box::new(message)).await
    }

    pub async fn output_boxed(&self, mut message: Box<dyn Message>) -> Result<usize, BusError> {
        message.header_mut().origin = Some(self.inner.name.to_string());
        self.inner.logger.framework_verbose(format!(
            "Publishing {} on {}",
            message.type_tag(),
            self.inner.output_channel
        ));
        self.inner
            .bus
            .publish(&self.inner.output_channel, message.as_ref())
            .await
    }

    /// Channels this instance was connected to as input, sorted.
    #[must_use]
    pub fn connected_inputs(&self) -> Vec<String> {
        let mut channels: Vec<String> = self.inner.inputs.lock().keys().cloned().collect();
        channels.sort();
        channels
    }

    pub(crate) fn is_connected(&self, channel: &str) -> bool {
        self.inner.inputs.lock().contains_key(channel)
    }

    pub(crate) fn record_input(&self, channel: String, subscription: Subscription) {
        self.inner.inputs.lock().insert(channel, subscription);
    }
}
