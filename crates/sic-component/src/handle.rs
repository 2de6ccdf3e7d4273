//! Launch options and the owner's handle to a running instance.

use crate::config::FusionConfig;
use crate::error::ComponentError;
use crate::naming::{input_channel, output_channel, reqreply_channel};
use crate::state::ComponentState;
use parking_lot::Mutex;
use serde_json::json;
use sic_bus::{Broker, BusConfig};
use sic_message::{Message, MessageRegistry};
use sic_telemetry::{DiagnosticSink, LogLevel};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Everything an instance needs to start.
#[derive(Clone)]
pub struct LaunchOptions {
    pub broker: Arc<dyn Broker>,
    pub registry: Arc<MessageRegistry>,
    pub ip: String,
    pub log_level: LogLevel,
    /// Overrides the class default configuration.
    pub conf: Option<Box<dyn Message>>,
    pub bus: BusConfig,
    pub fusion: FusionConfig,
    /// Sinks added to the instance logger next to the terminal and the
    /// logging channel.
    pub sinks: Vec<Arc<dyn DiagnosticSink>>,
}

impl LaunchOptions {
    #[must_use]
    pub fn new(broker: Arc<dyn Broker>, registry: Arc<MessageRegistry>, ip: impl Into<String>) -> Self {
        Self {
            broker,
            registry,
            ip: ip.into(),
            log_level: LogLevel::default(),
            conf: None,
            bus: BusConfig::default(),
            fusion: FusionConfig::default(),
            sinks: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    #[must_use]
    pub fn with_conf(mut self, conf: Box<dyn Message>) -> Self {
        self.conf = Some(conf);
        self
    }

    #[must_use]
    pub fn with_fusion(mut self, fusion: FusionConfig) -> Self {
        self.fusion = fusion;
        self
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

/// Owner's view of one instance: state, stop and join.
pub struct ComponentHandle {
    name: &'static str,
    ip: String,
    state: watch::Receiver<ComponentState>,
    stop: CancellationToken,
    failure: Arc<Mutex<Option<String>>>,
    task: Mutex<Option<JoinHandle<Result<(), ComponentError>>>>,
}

impl ComponentHandle {
    pub(crate) fn new(
        name: &'static str,
        ip: String,
        state: watch::Receiver<ComponentState>,
        stop: CancellationToken,
        failure: Arc<Mutex<Option<String>>>,
        task: JoinHandle<Result<(), ComponentError>>,
    ) -> Self {
        Self {
            name,
            ip,
            state,
            stop,
            failure,
            task: Mutex::new(Some(task)),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn ip(&self) -> &str {
        &self.ip
    }

    #[must_use]
    pub fn output_channel(&self) -> String {
        output_channel(self.name, &self.ip)
    }

    #[must_use]
    pub fn reqreply_channel(&self) -> String {
        reqreply_channel(self.name, &self.ip)
    }

    #[must_use]
    pub fn input_channel(&self) -> String {
        input_channel(self.name, &self.ip)
    }

    #[must_use]
    pub fn state(&self) -> ComponentState {
        *self.state.borrow()
    }

    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ComponentState> {
        self.state.clone()
    }

    /// Startup failure text, if the start failed.
    #[must_use]
    pub fn failure(&self) -> Option<String> {
        self.failure.lock().clone()
    }

    /// Wait until the instance serves requests.
    ///
    /// Fails with the construction error if startup failed, or with
    /// `StartupTimeout` if `timeout` elapses first.
    pub async fn wait_ready(&self, timeout: Duration) -> Result<(), ComponentError> {
        let mut state = self.state.clone();
        let reached = tokio::time::timeout(
            timeout,
            state.wait_for(|s| *s >= ComponentState::Ready),
        )
        .await;

        let current = match reached {
            Err(_) => {
                return Err(ComponentError::StartupTimeout {
                    name: self.name.to_string(),
                    timeout,
                })
            }
            Ok(Err(_)) => {
                return Err(ComponentError::Start {
                    name: self.name.to_string(),
                    reason: self
                        .failure()
                        .unwrap_or_else(|| "lifecycle task ended before ready".to_string()),
                })
            }
            Ok(Ok(current)) => *current,
        };

        match (current, self.failure()) {
            (ComponentState::Stopped, Some(reason)) => Err(ComponentError::Start {
                name: self.name.to_string(),
                reason,
            }),
            _ => Ok(()),
        }
    }

    /// Ask the instance to stop. Returns immediately.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the lifecycle task. Later calls return `Ok`.
    pub async fn join(&self) -> Result<(), ComponentError> {
        let task = self.task.lock().take();
        match task {
            Some(task) => task
                .await
                .map_err(|e| ComponentError::Join(e.to_string()))?,
            None => Ok(()),
        }
    }

    /// Stop and wait for the instance to finish.
    pub async fn shutdown(&self) -> Result<(), ComponentError> {
        self.stop();
        self.join().await
    }

    pub fn status(&self) -> serde_json::Value {
        json!({
            "name": self.name,
            "ip": self.ip,
            "state": self.state().as_str(),
            "failure": self.failure(),
        })
    }
}
