//! # Request/Reply
//!
//! Correlation is by request id only. A blocking caller subscribes to the
//! channel first and publishes second, so a reply can never arrive before
//! someone is listening for it:
//!
//! ```text
//! caller                      channel                      handler
//!   │ subscribe (replies only)   │                            │
//!   │──────────────────────────▶│                            │
//!   │ publish request(id)        │                            │
//!   │──────────────────────────▶│──────────────────────────▶│
//!   │                            │      publish reply(id)     │
//!   │◀──────────────────────────│◀──────────────────────────│
//!   │ unsubscribe                │                            │
//! ```
//!
//! Handlers on one channel run one request at a time.

use crate::bus::{Bus, Subscription, WeakBus};
use crate::handler::{MessageHandler, RequestHandler};
use crate::{BusError, HandlerError};
use async_trait::async_trait;
use parking_lot::Mutex;
use sic_message::{Message, RequestId, TypedMessage};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

/// Waits for the first non-request message carrying `request_id`.
struct ReplyWaiter {
    request_id: RequestId,
    slot: Mutex<Option<oneshot::Sender<Box<dyn Message>>>>,
}

#[async_trait]
impl MessageHandler for ReplyWaiter {
    async fn handle(&self, message: Box<dyn Message>) -> Result<(), HandlerError> {
        if message.request_id() != Some(self.request_id) {
            return Ok(());
        }
        if let Some(sender) = self.slot.lock().take() {
            // The caller may already have timed out.
            let _ = sender.send(message);
        }
        Ok(())
    }
}

/// Runs a request handler and publishes its reply.
struct RequestDispatch<H> {
    bus: WeakBus,
    channel: String,
    handler: H,
}

#[async_trait]
impl<H: RequestHandler> MessageHandler for RequestDispatch<H> {
    async fn handle(&self, message: Box<dyn Message>) -> Result<(), HandlerError> {
        if !message.is_request() {
            return Ok(());
        }
        let request_tag = message.type_tag();
        let request_id = message.request_id();

        let mut reply = self.handler.handle(message).await?;
        if reply.is_request() {
            return Err(Box::new(BusError::ContractViolation(format!(
                "reply to {} on {} is itself a request ({})",
                request_tag,
                self.channel,
                reply.type_tag()
            ))));
        }
        if reply.request_id().is_none() {
            reply.header_mut().request_id = request_id;
        }

        let bus = self.bus.upgrade().ok_or(BusError::ConnectionClosed)?;
        bus.publish(&self.channel, reply.as_ref()).await?;
        Ok(())
    }
}

impl Bus {
    /// Send a request on `channel`.
    ///
    /// A request without a correlation id is sent with a fresh one. With
    /// `block = false` this returns `None` right after publishing;
    /// otherwise it waits up to `timeout` for the matching reply.
    pub async fn request(
        &self,
        channel: &str,
        request: &dyn Message,
        timeout: Duration,
        block: bool,
    ) -> Result<Option<Box<dyn Message>>, BusError> {
        if !request.is_request() {
            return Err(BusError::ContractViolation(format!(
                "{} is not a request",
                request.type_tag()
            )));
        }

        let mut with_id: Option<Box<dyn Message>> = None;
        let request_id = match request.request_id() {
            Some(id) => id,
            None => {
                let id = RequestId::new();
                let mut copy = request.clone_boxed();
                copy.header_mut().request_id = Some(id);
                with_id = Some(copy);
                id
            }
        };
        let request: &dyn Message = with_id.as_deref().unwrap_or(request);

        if !block {
            self.publish(channel, request).await?;
            return Ok(None);
        }

        let (sender, receiver) = oneshot::channel();
        let waiter = ReplyWaiter {
            request_id,
            slot: Mutex::new(Some(sender)),
        };
        let subscription = self.subscribe([channel], waiter, true).await?;

        let outcome = match self.publish(channel, request).await {
            Ok(_) => tokio::time::timeout(timeout, receiver).await,
            Err(err) => {
                self.discard(&subscription).await;
                return Err(err);
            }
        };
        self.discard(&subscription).await;

        match outcome {
            Ok(Ok(reply)) => Ok(Some(reply)),
            Ok(Err(_)) => Err(BusError::ConnectionClosed),
            Err(_) => Err(BusError::Timeout {
                request: request.type_tag(),
                channel: channel.to_string(),
                timeout,
            }),
        }
    }

    /// Blocking request that requires a reply of type `R`.
    pub async fn request_as<R: TypedMessage>(
        &self,
        channel: &str,
        request: &dyn Message,
        timeout: Duration,
    ) -> Result<R, BusError> {
        let reply = self
            .request(channel, request, timeout, true)
            .await?
            .ok_or(BusError::ConnectionClosed)?;
        if !reply.is::<R>() {
            return Err(BusError::UnexpectedReply {
                expected: R::TYPE_TAG,
                found: reply.type_tag(),
            });
        }
        Ok(reply.downcast::<R>()?)
    }

    /// Serve requests arriving on `channel`.
    ///
    /// Each reply is published on the same channel. A reply whose
    /// correlation id is unset inherits the request's. A reply that is
    /// itself a request is a contract violation and ends the subscription.
    pub async fn register_request_handler<H: RequestHandler>(
        &self,
        channel: &str,
        handler: H,
    ) -> Result<Subscription, BusError> {
        let dispatch = RequestDispatch {
            bus: self.downgrade(),
            channel: channel.to_string(),
            handler,
        };
        self.subscribe([channel], dispatch, false).await
    }

    async fn discard(&self, subscription: &Subscription) {
        if let Err(err) = self.unsubscribe(subscription).await {
            debug!(bus = %self.name(), error = %err, "Reply subscription ended with error");
        }
    }
}
