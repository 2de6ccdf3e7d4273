//! # Component Manager
//!
//! Starts component instances on this host when asked over the bus.
//!
//! ```text
//! client ── StartComponentRequest{name, level, conf} ──► "{ip}"
//!                                                          │
//!                       unknown name ◄── lookup ───────────┤
//!                       reply Ignored                      │ known
//!                                                          ▼
//!                                        launch ─► wait_ready(class timeout)
//!                                                    │        │         │
//!                                                  ready    slow     failed
//!                                                 Success  Success  NotStarted(reason)
//! ```
//!
//! Every start request creates a new instance. Reuse of an already running
//! instance is the caller's decision (see the connector's ping).

use crate::config::ManagerConfig;
use crate::error::ManagerError;
use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use serde_json::json;
use sic_bus::{Broker, Bus, BusError, BusLogSink, HandlerError, RequestHandler};
use sic_component::{
    launch, launch_actuator, launch_sensor, launch_service, manager_channel, Actuator,
    Component, ComponentError, ComponentHandle, LaunchOptions, Sensor, Service,
};
use sic_message::{
    IgnoredMessage, Message, MessageRegistry, NotStartedMessage, PingRequest, PongMessage,
    RequestId, StartComponentRequest, StopRequest, SuccessMessage,
};
use sic_telemetry::{ComponentLogger, DiagnosticSink, TracingSink};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

type LaunchFn = fn(LaunchOptions) -> ComponentHandle;

#[derive(Clone, Copy)]
struct ComponentClass {
    startup_timeout: Duration,
    launch: LaunchFn,
}

/// Collects the component classes a manager can start.
pub struct ManagerBuilder {
    broker: Arc<dyn Broker>,
    registry: Arc<MessageRegistry>,
    config: ManagerConfig,
    classes: BTreeMap<&'static str, ComponentClass>,
    sinks: Vec<Arc<dyn DiagnosticSink>>,
    duplicate: Option<&'static str>,
}

impl ManagerBuilder {
    #[must_use]
    pub fn new(broker: Arc<dyn Broker>, registry: Arc<MessageRegistry>, config: ManagerConfig) -> Self {
        Self {
            broker,
            registry,
            config,
            classes: BTreeMap::new(),
            sinks: Vec::new(),
            duplicate: None,
        }
    }

    fn add(mut self, name: &'static str, startup_timeout: Duration, launch: LaunchFn) -> Self {
        info!("[Manager] Registering component class {}", name);
        let previous = self.classes.insert(
            name,
            ComponentClass {
                startup_timeout,
                launch,
            },
        );
        if previous.is_some() {
            self.duplicate.get_or_insert(name);
        }
        self
    }

    /// Register a reactive component.
    #[must_use]
    pub fn register<C: Component>(self) -> Self {
        self.add(C::NAME, C::STARTUP_TIMEOUT, launch::<C>)
    }

    #[must_use]
    pub fn register_sensor<S: Sensor>(self) -> Self {
        self.add(S::NAME, S::STARTUP_TIMEOUT, launch_sensor::<S>)
    }

    #[must_use]
    pub fn register_service<S: Service>(self) -> Self {
        self.add(S::NAME, S::STARTUP_TIMEOUT, launch_service::<S>)
    }

    #[must_use]
    pub fn register_actuator<A: Actuator>(self) -> Self {
        self.add(A::NAME, A::STARTUP_TIMEOUT, launch_actuator::<A>)
    }

    /// Extra sink for the loggers of every instance started.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Connect to the broker and start serving `"{ip}"`.
    pub async fn start(self) -> Result<ComponentManager, ManagerError> {
        if let Some(name) = self.duplicate {
            return Err(ManagerError::DuplicateClass(name));
        }

        let channel = manager_channel(&self.config.ip);
        let bus = Bus::connect_with_config(
            self.broker.as_ref(),
            format!("manager:{}", self.config.ip),
            self.registry.clone(),
            self.config.bus.clone(),
        )
        .await?;
        let sinks: Vec<Arc<dyn DiagnosticSink>> = vec![
            Arc::new(TracingSink),
            Arc::new(BusLogSink::new(bus.downgrade())),
        ];
        let logger = ComponentLogger::with_sinks(
            format!("Manager {}", self.config.ip),
            self.config.log_level,
            sinks,
        );
        bus.set_logger(logger.clone());

        let inner = Arc::new(ManagerInner {
            broker: self.broker,
            registry: self.registry,
            config: self.config,
            classes: self.classes,
            sinks: self.sinks,
            bus,
            logger,
            channel,
            stop: CancellationToken::new(),
            stopped: AtomicBool::new(false),
            instances: Mutex::new(Vec::new()),
            started: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            ignored: AtomicU64::new(0),
        });

        let handler = ManagerHandler {
            inner: Arc::downgrade(&inner),
        };
        if let Err(err) = inner
            .bus
            .register_request_handler(&inner.channel, handler)
            .await
        {
            if let Err(close_err) = inner.bus.close().await {
                warn!(
                    channel = %inner.channel,
                    error = %close_err,
                    "[Manager] ✗ Failed to close bus after start failure"
                );
            }
            return Err(err.into());
        }

        info!(
            "[Manager] ✓ Serving {} component classes on {}",
            inner.classes.len(),
            inner.channel
        );
        Ok(ComponentManager { inner })
    }
}

struct ManagerInner {
    broker: Arc<dyn Broker>,
    registry: Arc<MessageRegistry>,
    config: ManagerConfig,
    classes: BTreeMap<&'static str, ComponentClass>,
    sinks: Vec<Arc<dyn DiagnosticSink>>,
    bus: Bus,
    logger: ComponentLogger,
    channel: String,
    stop: CancellationToken,
    stopped: AtomicBool,
    instances: Mutex<Vec<ComponentHandle>>,
    started: AtomicU64,
    failed: AtomicU64,
    ignored: AtomicU64,
}

impl ManagerInner {
    /// Reply that no waiting caller matches.
    fn ignored() -> Box<dyn Message> {
        IgnoredMessage::default()
            .with_request_id(RequestId::DETACHED)
            .boxed()
    }

    async fn start_component(&self, request: StartComponentRequest) -> Box<dyn Message> {
        let request = request.into_payload();
        let name = request.component_name;

        let Some(class) = self.classes.get(name.as_str()).copied() else {
            self.ignored.fetch_add(1, Ordering::Relaxed);
            self.logger
                .debug(format!("{name} is not registered here, ignoring"));
            return Self::ignored();
        };

        self.logger.info(format!("Starting {name}"));
        let options = LaunchOptions {
            broker: self.broker.clone(),
            registry: self.registry.clone(),
            ip: self.config.ip.clone(),
            log_level: request.log_level,
            conf: request.conf,
            bus: self.config.bus.clone(),
            fusion: self.config.fusion.clone(),
            sinks: self.sinks.clone(),
        };
        let handle = (class.launch)(options);
        let timeout = self.config.startup_timeout.unwrap_or(class.startup_timeout);

        match handle.wait_ready(timeout).await {
            Ok(()) => {
                info!("[Manager] ✓ {} started on {}", name, self.config.ip);
                self.keep(handle);
                SuccessMessage::default().boxed()
            }
            Err(ComponentError::StartupTimeout { timeout, .. }) => {
                self.logger.error(format!(
                    "{name} did not become ready within {timeout:?}, continuing start in the background"
                ));
                self.keep(handle);
                SuccessMessage::default().boxed()
            }
            Err(err) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                let reason = err.reason();
                self.logger
                    .error(format!("{name} failed to start: {reason}"));
                if let Err(stop_err) = handle.shutdown().await {
                    info!("[Manager] ✗ {} ended with: {}", name, stop_err);
                }
                NotStartedMessage::with_reason(reason).boxed()
            }
        }
    }

    fn keep(&self, handle: ComponentHandle) {
        self.started.fetch_add(1, Ordering::Relaxed);
        let mut instances = self.instances.lock();
        instances.retain(|h| !h.is_finished());
        instances.push(handle);
    }
}

/// Serves the `"{ip}"` channel.
struct ManagerHandler {
    inner: Weak<ManagerInner>,
}

#[async_trait]
impl RequestHandler for ManagerHandler {
    async fn handle(&self, request: Box<dyn Message>) -> Result<Box<dyn Message>, HandlerError> {
        let inner = self.inner.upgrade().ok_or(BusError::ConnectionClosed)?;

        if request.is::<PingRequest>() {
            return Ok(PongMessage::default().boxed());
        }
        if request.is::<StopRequest>() {
            inner.logger.info("Stop requested");
            inner.stop.cancel();
            return Ok(SuccessMessage::default().boxed());
        }
        if request.is::<StartComponentRequest>() {
            let request = request.downcast::<StartComponentRequest>()?;
            return Ok(inner.start_component(request).await);
        }

        inner
            .logger
            .warning(format!("Unsupported request {}, ignoring", request.type_tag()));
        Ok(ManagerInner::ignored())
    }
}

/// A running component manager.
///
/// A `StartComponentRequest` naming a class this manager does not serve is
/// answered with an `IgnoredMessage` carrying [`RequestId::DETACHED`]. That
/// reply never matches the caller's request id, so a requester sees
/// `BusError::Timeout` rather than a typed reply, and `Connector::connect`
/// reports `ConnectorError::Unreachable`.
pub struct ComponentManager {
    inner: Arc<ManagerInner>,
}

impl ComponentManager {
    #[must_use]
    pub fn builder(
        broker: Arc<dyn Broker>,
        registry: Arc<MessageRegistry>,
        config: ManagerConfig,
    ) -> ManagerBuilder {
        ManagerBuilder::new(broker, registry, config)
    }

    #[must_use]
    pub fn ip(&self) -> &str {
        &self.inner.config.ip
    }

    #[must_use]
    pub fn channel(&self) -> &str {
        &self.inner.channel
    }

    #[must_use]
    pub fn classes(&self) -> Vec<&'static str> {
        self.inner.classes.keys().copied().collect()
    }

    /// Instances started and not yet finished.
    #[must_use]
    pub fn running(&self) -> usize {
        self.inner
            .instances
            .lock()
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }

    #[must_use]
    pub fn is_stopping(&self) -> bool {
        self.inner.stop.is_cancelled()
    }

    /// Ask `serve` to return.
    pub fn request_stop(&self) {
        self.inner.stop.cancel();
    }

    /// Run until a stop request or Ctrl-C, then stop everything.
    pub async fn serve(&self) {
        info!("[Manager] Serving on {}. Press Ctrl+C to stop.", self.inner.channel);
        tokio::select! {
            _ = self.inner.stop.cancelled() => {}
            signal = tokio::signal::ctrl_c() => {
                if let Err(err) = signal {
                    warn!("[Manager] Ctrl-C handler failed: {}", err);
                }
            }
        }
        self.stop().await;
    }

    /// Stop every started instance, then close the manager's bus.
    ///
    /// Teardown errors are logged. Calling it again is a no-op.
    pub async fn stop(&self) {
        if self.inner.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.stop.cancel();
        info!("[Manager] Stopping all components");

        let handles: Vec<ComponentHandle> = self.inner.instances.lock().drain(..).collect();
        let results = join_all(handles.iter().map(ComponentHandle::shutdown)).await;
        for (handle, result) in handles.iter().zip(results) {
            match result {
                Ok(()) => info!("[Manager] ✓ {} stopped", handle.name()),
                Err(err) => error!("[Manager] ✗ {} failed to stop cleanly: {}", handle.name(), err),
            }
        }

        if let Err(err) = self.inner.bus.close().await {
            error!("[Manager] ✗ Bus close failed: {}", err);
        }
        info!("[Manager] All components stopped");
    }

    pub fn status(&self) -> serde_json::Value {
        let instances: Vec<serde_json::Value> = self
            .inner
            .instances
            .lock()
            .iter()
            .map(ComponentHandle::status)
            .collect();
        json!({
            "ip": self.inner.config.ip,
            "channel": self.inner.channel,
            "classes": self.classes(),
            "instances": instances,
            "started": self.inner.started.load(Ordering::Relaxed),
            "failed": self.inner.failed.load(Ordering::Relaxed),
            "ignored": self.inner.ignored.load(Ordering::Relaxed),
            "stopping": self.is_stopping(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sic_bus::{handler_fn, BrokerConnection, BrokerSubscription, InMemoryBroker};
    use sic_component::{reqreply_channel, ComponentContext};
    use sic_message::{NoConf, StartComponent, TextMessage, TextRequest};
    use sic_telemetry::LogLevel;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    const IP: &str = "10.0.0.5";
    const WAIT: Duration = Duration::from_secs(2);

    struct Echo;

    #[async_trait]
    impl Component for Echo {
        const NAME: &'static str = "Echo";
        type Conf = NoConf;

        async fn create(_ctx: &ComponentContext, _conf: NoConf) -> Result<Self, HandlerError> {
            Ok(Echo)
        }

        async fn on_request(
            &self,
            _ctx: &ComponentContext,
            request: Box<dyn Message>,
        ) -> Result<Box<dyn Message>, HandlerError> {
            let request = request.downcast::<TextRequest>()?;
            Ok(TextMessage::new(request.into_payload()).boxed())
        }
    }

    struct Broken;

    #[async_trait]
    impl Component for Broken {
        const NAME: &'static str = "Broken";
        type Conf = NoConf;

        async fn create(_ctx: &ComponentContext, _conf: NoConf) -> Result<Self, HandlerError> {
            Err("camera unplugged".into())
        }
    }

    fn registry() -> Arc<MessageRegistry> {
        Arc::new(MessageRegistry::with_core_types())
    }

    async fn start(broker: &InMemoryBroker) -> ComponentManager {
        ComponentManager::builder(
            Arc::new(broker.clone()),
            registry(),
            ManagerConfig::default().with_ip(IP),
        )
        .register::<Echo>()
        .register::<Broken>()
        .start()
        .await
        .unwrap()
    }

    async fn client(broker: &InMemoryBroker) -> Bus {
        Bus::connect(broker, "client", registry()).await.unwrap()
    }

    fn start_request(name: &str) -> StartComponentRequest {
        StartComponentRequest::new(StartComponent::new(name, LogLevel::Info))
    }

    #[tokio::test]
    async fn test_start_known_component() {
        let broker = InMemoryBroker::new();
        let manager = start(&broker).await;
        assert_eq!(manager.channel(), IP);
        assert_eq!(manager.classes(), vec!["Broken", "Echo"]);

        let client = client(&broker).await;
        let reply = client
            .request(IP, &start_request("Echo"), WAIT, true)
            .await
            .unwrap()
            .unwrap();
        assert!(reply.is::<SuccessMessage>());
        assert_eq!(manager.running(), 1);

        let echoed = client
            .request_as::<TextMessage>(
                &reqreply_channel("Echo", IP),
                &TextRequest::new("hi".into()),
                WAIT,
            )
            .await
            .unwrap();
        assert_eq!(echoed.text, "hi");

        manager.stop().await;
        assert_eq!(broker.subscriber_count(&reqreply_channel("Echo", IP)), 0);
        assert_eq!(broker.subscriber_count(IP), 0);
    }

    #[tokio::test]
    async fn test_each_start_creates_an_instance() {
        let broker = InMemoryBroker::new();
        let manager = start(&broker).await;
        let client = client(&broker).await;

        for _ in 0..2 {
            client
                .request_as::<SuccessMessage>(IP, &start_request("Echo"), WAIT)
                .await
                .unwrap();
        }
        assert_eq!(manager.running(), 2);
        assert_eq!(manager.status()["started"], 2);

        manager.stop().await;
    }

    #[tokio::test]
    async fn test_unknown_component_is_ignored() {
        let broker = InMemoryBroker::new();
        let manager = start(&broker).await;
        let client = client(&broker).await;

        let (tx, mut replies) = mpsc::unbounded_channel();
        client
            .subscribe(
                [IP],
                handler_fn(move |message: Box<dyn Message>| {
                    let tx = tx.clone();
                    async move {
                        let _ = tx.send(message);
                        Ok::<(), HandlerError>(())
                    }
                }),
                true,
            )
            .await
            .unwrap();

        let err = client
            .request(IP, &start_request("Camera"), Duration::from_millis(300), true)
            .await
            .unwrap_err();
        assert!(err.is_timeout());

        let ignored = timeout(WAIT, replies.recv()).await.unwrap().unwrap();
        assert!(ignored.is::<IgnoredMessage>());
        assert!(ignored.request_id().is_some_and(|id| id.is_detached()));
        assert_eq!(manager.running(), 0);
        assert_eq!(manager.status()["ignored"], 1);

        manager.stop().await;
    }

    #[tokio::test]
    async fn test_failed_start_replies_not_started() {
        let broker = InMemoryBroker::new();
        let manager = start(&broker).await;
        let client = client(&broker).await;

        let reply = client
            .request_as::<NotStartedMessage>(IP, &start_request("Broken"), WAIT)
            .await
            .unwrap();
        assert!(reply.message.contains("camera unplugged"));
        assert_eq!(manager.running(), 0);
        assert_eq!(manager.status()["failed"], 1);
        assert_eq!(broker.subscriber_count(&reqreply_channel("Broken", IP)), 0);

        manager.stop().await;
    }

    #[tokio::test]
    async fn test_ping_and_stop_request_end_serve() {
        let broker = InMemoryBroker::new();
        let manager = start(&broker).await;
        let client = client(&broker).await;

        client
            .request_as::<PongMessage>(IP, &PingRequest::default(), WAIT)
            .await
            .unwrap();
        client
            .request_as::<SuccessMessage>(IP, &start_request("Echo"), WAIT)
            .await
            .unwrap();

        let stopper = client.clone();
        tokio::spawn(async move {
            let _ = stopper
                .request(IP, &StopRequest::default(), WAIT, false)
                .await;
        });
        timeout(WAIT, manager.serve()).await.unwrap();

        assert!(manager.is_stopping());
        assert_eq!(broker.subscriber_count(&reqreply_channel("Echo", IP)), 0);
        manager.stop().await;
    }

    /// Broker whose connections refuse subscriptions and fail to close.
    #[derive(Default)]
    struct RefusingBroker {
        closes: Arc<AtomicU64>,
    }

    struct RefusingConnection {
        closes: Arc<AtomicU64>,
        closed: AtomicBool,
    }

    #[async_trait]
    impl Broker for RefusingBroker {
        async fn connect(&self, _client: &str) -> Result<Box<dyn BrokerConnection>, BusError> {
            Ok(Box::new(RefusingConnection {
                closes: self.closes.clone(),
                closed: AtomicBool::new(false),
            }))
        }
    }

    #[async_trait]
    impl BrokerConnection for RefusingConnection {
        async fn publish(&self, _channel: &str, _payload: Vec<u8>) -> Result<usize, BusError> {
            Ok(0)
        }

        async fn subscribe(&self, _channels: &[String]) -> Result<BrokerSubscription, BusError> {
            Err(BusError::Broker("subscriptions refused".to_string()))
        }

        async fn close(&self) -> Result<(), BusError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            self.closed.store(true, Ordering::SeqCst);
            Err(BusError::Broker("close refused".to_string()))
        }

        fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    #[tokio::test]
    async fn test_failed_start_closes_bus_and_reports_subscribe_error() {
        let broker = Arc::new(RefusingBroker::default());
        let closes = broker.closes.clone();
        let result = ComponentManager::builder(broker, registry(), ManagerConfig::default().with_ip(IP))
            .register::<Echo>()
            .start()
            .await;

        match result {
            Err(ManagerError::Bus(BusError::Broker(reason))) => {
                assert_eq!(reason, "subscriptions refused");
            }
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("manager started without a subscription"),
        }
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_duplicate_class_is_rejected() {
        let broker = InMemoryBroker::new();
        let result = ComponentManager::builder(
            Arc::new(broker.clone()),
            registry(),
            ManagerConfig::default().with_ip(IP),
        )
        .register::<Echo>()
        .register::<Echo>()
        .start()
        .await;
        assert!(matches!(result, Err(ManagerError::DuplicateClass("Echo"))));
        assert_eq!(broker.channel_count(), 0);
    }
}
