//! # In-Memory Broker
//!
//! Single-host broker shared by every connection created from it. Each
//! subscription owns an unbounded queue, so a publisher never waits on a
//! slow subscriber.

use crate::broker::{Broker, BrokerConnection, BrokerSubscription, Delivery};
use crate::BusError;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tracing::debug;

struct Subscriber {
    id: u64,
    sender: mpsc::UnboundedSender<Delivery>,
}

#[derive(Default)]
struct Hub {
    channels: RwLock<HashMap<String, Vec<Subscriber>>>,
    next_id: AtomicU64,
    messages_published: AtomicU64,
}

impl Hub {
    fn remove(&self, id: u64) {
        let mut channels = self.channels.write();
        channels.retain(|_, subscribers| {
            subscribers.retain(|s| s.id != id);
            !subscribers.is_empty()
        });
    }
}

/// In-process broker.
///
/// Cloning yields another handle to the same hub.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    hub: Arc<Hub>,
}

impl InMemoryBroker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscriptions on a channel.
    #[must_use]
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.hub
            .channels
            .read()
            .get(channel)
            .map_or(0, |subscribers| subscribers.len())
    }

    /// Number of channels with at least one subscriber.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.hub.channels.read().len()
    }

    /// Total publish calls served.
    #[must_use]
    pub fn messages_published(&self) -> u64 {
        self.hub.messages_published.load(Ordering::Relaxed)
    }

    /// Open a connection without going through the async trait.
    #[must_use]
    pub fn connection(&self, client: &str) -> InMemoryConnection {
        InMemoryConnection {
            client: client.to_string(),
            hub: self.hub.clone(),
            closed: AtomicBool::new(false),
            owned: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn connect(&self, client: &str) -> Result<Box<dyn BrokerConnection>, BusError> {
        debug!(client = client, "Broker connection opened");
        Ok(Box::new(self.connection(client)))
    }
}

/// Connection to an [`InMemoryBroker`].
pub struct InMemoryConnection {
    client: String,
    hub: Arc<Hub>,
    closed: AtomicBool,
    /// Subscription ids opened through this connection.
    owned: Mutex<Vec<u64>>,
}

impl InMemoryConnection {
    fn ensure_open(&self) -> Result<(), BusError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BusError::ConnectionClosed);
        }
        Ok(())
    }
}

#[async_trait]
impl BrokerConnection for InMemoryConnection {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<usize, BusError> {
        self.ensure_open()?;
        self.hub.messages_published.fetch_add(1, Ordering::Relaxed);

        let channels = self.hub.channels.read();
        let Some(subscribers) = channels.get(channel) else {
            debug!(client = %self.client, channel = channel, "Published to channel without subscribers");
            return Ok(0);
        };

        let mut delivered = 0;
        for subscriber in subscribers {
            let delivery = Delivery {
                channel: channel.to_string(),
                payload: payload.clone(),
            };
            if subscriber.sender.send(delivery).is_ok() {
                delivered += 1;
            }
        }
        Ok(delivered)
    }

    async fn subscribe(&self, channels: &[String]) -> Result<BrokerSubscription, BusError> {
        self.ensure_open()?;
        let id = self.hub.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();

        {
            let mut table = self.hub.channels.write();
            for channel in channels {
                table.entry(channel.clone()).or_default().push(Subscriber {
                    id,
                    sender: sender.clone(),
                });
            }
        }
        self.owned.lock().push(id);
        debug!(client = %self.client, channels = ?channels, id = id, "Subscribed");

        let hub: Weak<Hub> = Arc::downgrade(&self.hub);
        Ok(BrokerSubscription::new(receiver, move || {
            if let Some(hub) = hub.upgrade() {
                hub.remove(id);
            }
        }))
    }

    async fn close(&self) -> Result<(), BusError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let owned = std::mem::take(&mut *self.owned.lock());
        for id in owned {
            self.hub.remove(id);
        }
        debug!(client = %self.client, "Broker connection closed");
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
