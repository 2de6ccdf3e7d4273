//! Integration flows over an in-memory broker.

pub mod choreography;
pub mod flows;
pub mod fusion;

use sic_bus::{handler_fn, Bus, HandlerError, InMemoryBroker};
use sic_message::{Message, MessageRegistry};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Registry with the built-in message types.
pub fn registry() -> Arc<MessageRegistry> {
    Arc::new(MessageRegistry::with_core_types())
}

/// A plain bus client on `broker`.
pub async fn client(broker: &InMemoryBroker, name: &str) -> anyhow::Result<Bus> {
    Ok(Bus::connect(broker, name, registry()).await?)
}

/// Forward every message on `channel` into a receiver.
pub async fn collect(
    bus: &Bus,
    channel: impl Into<String>,
) -> anyhow::Result<mpsc::UnboundedReceiver<Box<dyn Message>>> {
    let (tx, rx) = mpsc::unbounded_channel();
    bus.subscribe(
        [channel.into()],
        handler_fn(move |message: Box<dyn Message>| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(message);
                Ok::<(), HandlerError>(())
            }
        }),
        true,
    )
    .await?;
    Ok(rx)
}
