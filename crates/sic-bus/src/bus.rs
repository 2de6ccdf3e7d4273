//! # Channel Bus
//!
//! A `Bus` owns one broker connection and decodes every inbound payload
//! through its registry before dispatch. Each subscription runs on its own
//! task:
//!
//! ```text
//! broker ──▶ BrokerSubscription ──▶ decode ──▶ [request filter] ──▶ handler
//!                                      │                              │
//!                                      └──── error: log, end task ◀───┘
//! ```
//!
//! A failing decode or handler ends that subscription. The error is
//! logged and returned by [`Bus::unsubscribe`]. While the bus is closing
//! such errors are expected and only logged at debug level.

use crate::broker::{Broker, BrokerConnection, BrokerSubscription, Delivery};
use crate::config::BusConfig;
use crate::handler::MessageHandler;
use crate::BusError;
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use sic_message::{encode, Message, MessageRegistry};
use sic_telemetry::{ComponentLogger, LogLevel};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

/// State shared between the bus and its subscription tasks.
struct Shared {
    name: String,
    registry: Arc<MessageRegistry>,
    stopping: AtomicBool,
    logger: RwLock<Option<ComponentLogger>>,
    messages_received: AtomicU64,
}

impl Shared {
    fn report(&self, level: LogLevel, message: &str) {
        let logger = self.logger.read().clone();
        match logger {
            Some(logger) => logger.log(level, message),
            None => error!(bus = %self.name, "{}", message),
        }
    }
}

struct SubscriptionTask {
    channels: Vec<String>,
    token: CancellationToken,
    join: JoinHandle<Result<(), BusError>>,
}

struct BusInner {
    shared: Arc<Shared>,
    connection: Box<dyn BrokerConnection>,
    config: BusConfig,
    shutdown: CancellationToken,
    closed: AtomicBool,
    next_subscription: AtomicU64,
    tasks: Mutex<HashMap<u64, SubscriptionTask>>,
    messages_published: AtomicU64,
}

/// Handle to one active subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    id: u64,
    channels: Vec<String>,
}

impl Subscription {
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn channels(&self) -> &[String] {
        &self.channels
    }
}

/// Channel bus over one exclusive broker connection.
///
/// Clones share the connection. The bus must be closed explicitly with
/// [`Bus::close`]; it must not be closed from inside one of its own
/// handlers.
#[derive(Clone)]
pub struct Bus {
    inner: Arc<BusInner>,
}

/// Non-owning reference to a [`Bus`].
#[derive(Clone)]
pub struct WeakBus {
    inner: Weak<BusInner>,
}

impl WeakBus {
    #[must_use]
    pub fn upgrade(&self) -> Option<Bus> {
        self.inner.upgrade().map(|inner| Bus { inner })
    }
}

impl Bus {
    /// Open a connection on `broker` with default configuration.
    pub async fn connect(
        broker: &dyn Broker,
        name: impl Into<String>,
        registry: Arc<MessageRegistry>,
    ) -> Result<Self, BusError> {
        Self::connect_with_config(broker, name, registry, BusConfig::default()).await
    }

    pub async fn connect_with_config(
        broker: &dyn Broker,
        name: impl Into<String>,
        registry: Arc<MessageRegistry>,
        config: BusConfig,
    ) -> Result<Self, BusError> {
        let name = name.into();
        let connection = broker.connect(&name).await?;
        debug!(bus = %name, "Bus connected");

        Ok(Self {
            inner: Arc::new(BusInner {
                shared: Arc::new(Shared {
                    name,
                    registry,
                    stopping: AtomicBool::new(false),
                    logger: RwLock::new(None),
                    messages_received: AtomicU64::new(0),
                }),
                connection,
                config,
                shutdown: CancellationToken::new(),
                closed: AtomicBool::new(false),
                next_subscription: AtomicU64::new(1),
                tasks: Mutex::new(HashMap::new()),
                messages_published: AtomicU64::new(0),
            }),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.shared.name
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<MessageRegistry> {
        &self.inner.shared.registry
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakBus {
        WeakBus {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Route subscription failures to a component logger instead of plain
    /// `tracing`.
    pub fn set_logger(&self, logger: ComponentLogger) {
        *self.inner.shared.logger.write() = Some(logger);
    }

    /// Whether `close()` has started.
    #[must_use]
    pub fn is_stopping(&self) -> bool {
        self.inner.shared.stopping.load(Ordering::Acquire)
    }

    /// Whether the broker connection has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Number of subscriptions not yet unsubscribed.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.inner.tasks.lock().len()
    }

    /// Whether a subscription's task has ended, by cancellation or error.
    #[must_use]
    pub fn is_finished(&self, subscription: &Subscription) -> bool {
        self.inner
            .tasks
            .lock()
            .get(&subscription.id)
            .map_or(true, |task| task.join.is_finished())
    }

    /// Encode and publish a message. Returns the number of subscribers
    /// reached.
    pub async fn publish(&self, channel: &str, message: &dyn Message) -> Result<usize, BusError> {
        let bytes = encode(message)?;
        let receivers = self.publish_bytes(channel, bytes).await?;
        trace!(
            bus = %self.name(),
            channel = channel,
            message = message.type_tag(),
            receivers = receivers,
            "Message published"
        );
        Ok(receivers)
    }

    /// Publish already encoded bytes.
    pub async fn publish_bytes(&self, channel: &str, bytes: Vec<u8>) -> Result<usize, BusError> {
        if self.is_closed() {
            return Err(BusError::ConnectionClosed);
        }
        let receivers = self.inner.connection.publish(channel, bytes).await?;
        self.inner.messages_published.fetch_add(1, Ordering::Relaxed);
        Ok(receivers)
    }

    /// Subscribe `handler` to every channel in `channels` on a new task.
    ///
    /// With `ignore_requests`, request-kind messages are dropped before
    /// dispatch.
    pub async fn subscribe<H: MessageHandler>(
        &self,
        channels: impl IntoIterator<Item = impl Into<String>>,
        handler: H,
        ignore_requests: bool,
    ) -> Result<Subscription, BusError> {
        if self.is_stopping() {
            return Err(BusError::ConnectionClosed);
        }
        let channels: Vec<String> = channels.into_iter().map(Into::into).collect();
        if channels.is_empty() {
            return Err(BusError::ContractViolation(
                "subscribe requires at least one channel".to_string(),
            ));
        }

        let stream = self.inner.connection.subscribe(&channels).await?;
        let id = self.inner.next_subscription.fetch_add(1, Ordering::Relaxed);
        let token = self.inner.shutdown.child_token();
        let join = tokio::spawn(run_subscription(
            self.inner.shared.clone(),
            channels.clone(),
            stream,
            handler,
            ignore_requests,
            token.clone(),
        ));

        self.inner.tasks.lock().insert(
            id,
            SubscriptionTask {
                channels: channels.clone(),
                token,
                join,
            },
        );
        debug!(bus = %self.name(), channels = ?channels, subscription = id, "Subscribed");

        Ok(Subscription { id, channels })
    }

    /// Stop a subscription and wait for its task.
    ///
    /// Returns the error that ended the task, if any.
    pub async fn unsubscribe(&self, subscription: &Subscription) -> Result<(), BusError> {
        let Some(task) = self.inner.tasks.lock().remove(&subscription.id) else {
            return Ok(());
        };
        task.token.cancel();
        debug!(bus = %self.name(), channels = ?task.channels, "Unsubscribed");

        match task.join.await {
            Ok(result) => result,
            Err(e) => Err(BusError::Join(e.to_string())),
        }
    }

    /// Close the bus.
    ///
    /// Cancels every subscription, waits up to the shutdown grace for
    /// in-flight handlers (their replies are still published), then closes
    /// the broker connection. Calling it again is a no-op.
    pub async fn close(&self) -> Result<(), BusError> {
        if self.inner.shared.stopping.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.inner.shutdown.cancel();

        let tasks: Vec<SubscriptionTask> = self
            .inner
            .tasks
            .lock()
            .drain()
            .map(|(_, task)| task)
            .collect();
        let mut joins: Vec<JoinHandle<Result<(), BusError>>> =
            tasks.into_iter().map(|task| task.join).collect();

        let grace = self.inner.config.shutdown_grace;
        if tokio::time::timeout(grace, join_all(joins.iter_mut()))
            .await
            .is_err()
        {
            warn!(bus = %self.name(), grace = ?grace, "Subscription tasks still running after grace period, aborting");
            for join in &joins {
                join.abort();
            }
        }

        let closed = self.inner.connection.close().await;
        self.inner.closed.store(true, Ordering::Release);
        *self.inner.shared.logger.write() = None;
        debug!(bus = %self.name(), "Bus closed");
        closed
    }

    /// Counters as JSON.
    #[must_use]
    pub fn metrics(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name(),
            "subscriptions": self.subscription_count(),
            "messages_published": self.inner.messages_published.load(Ordering::Relaxed),
            "messages_received": self.inner.shared.messages_received.load(Ordering::Relaxed),
            "stopping": self.is_stopping(),
            "closed": self.is_closed(),
        })
    }
}

impl fmt::Debug for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bus")
            .field("name", &self.name())
            .field("subscriptions", &self.subscription_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

async fn run_subscription<H: MessageHandler>(
    shared: Arc<Shared>,
    channels: Vec<String>,
    mut stream: BrokerSubscription,
    handler: H,
    ignore_requests: bool,
    token: CancellationToken,
) -> Result<(), BusError> {
    loop {
        let delivery = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(()),
            delivery = stream.recv() => delivery,
        };
        let Some(delivery) = delivery else {
            debug!(bus = %shared.name, channels = ?channels, "Broker stream ended");
            return Ok(());
        };

        if let Err(err) = dispatch(&shared, &handler, ignore_requests, &delivery).await {
            if shared.stopping.load(Ordering::Acquire) {
                debug!(bus = %shared.name, channel = %delivery.channel, error = %err, "Handler error during shutdown");
                return Ok(());
            }
            shared.report(
                LogLevel::Error,
                &format!(
                    "Subscription on {} ended by error: {}",
                    delivery.channel, err
                ),
            );
            return Err(err);
        }
    }
}

async fn dispatch<H: MessageHandler>(
    shared: &Shared,
    handler: &H,
    ignore_requests: bool,
    delivery: &Delivery,
) -> Result<(), BusError> {
    let message = shared.registry.decode(&delivery.payload)?;
    shared.messages_received.fetch_add(1, Ordering::Relaxed);

    if ignore_requests && message.is_request() {
        return Ok(());
    }
    handler
        .handle(message)
        .await
        .map_err(BusError::from_handler)
}
