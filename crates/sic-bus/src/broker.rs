//! # Broker Interface
//!
//! The broker is an external collaborator: channel-addressed publish,
//! multi-channel subscribe, in-order delivery per subscriber within a
//! channel. Each bus owns exactly one connection.

use crate::BusError;
use async_trait::async_trait;
use std::fmt;
use tokio::sync::mpsc;

/// A raw payload delivered on a channel.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub channel: String,
    pub payload: Vec<u8>,
}

/// Factory for broker connections.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Open a connection for `client`, which names it in broker-side logs.
    async fn connect(&self, client: &str) -> Result<Box<dyn BrokerConnection>, BusError>;
}

/// One exclusive broker connection.
#[async_trait]
pub trait BrokerConnection: Send + Sync {
    /// Publish a payload, returning the number of subscribers it reached.
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<usize, BusError>;

    /// Subscribe to every channel in `channels` with a single stream.
    async fn subscribe(&self, channels: &[String]) -> Result<BrokerSubscription, BusError>;

    /// Close the connection. Every subscription opened through it ends.
    async fn close(&self) -> Result<(), BusError>;

    fn is_closed(&self) -> bool;
}

/// Delivery stream of one broker subscription.
///
/// When dropped, the subscription is removed from the broker.
pub struct BrokerSubscription {
    receiver: mpsc::UnboundedReceiver<Delivery>,
    on_drop: Option<Box<dyn FnOnce() + Send>>,
}

impl BrokerSubscription {
    pub fn new(
        receiver: mpsc::UnboundedReceiver<Delivery>,
        on_drop: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            receiver,
            on_drop: Some(Box::new(on_drop)),
        }
    }

    /// Next delivery, or `None` once the broker side is gone.
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.receiver.recv().await
    }
}

impl Drop for BrokerSubscription {
    fn drop(&mut self) {
        if let Some(on_drop) = self.on_drop.take() {
            on_drop();
        }
    }
}

impl fmt::Debug for BrokerSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerSubscription").finish_non_exhaustive()
    }
}
