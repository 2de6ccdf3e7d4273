//! Handler traits for subscriptions and request channels.

use crate::HandlerError;
use async_trait::async_trait;
use sic_message::Message;
use std::future::Future;

/// Receives decoded messages from a subscription.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    async fn handle(&self, message: Box<dyn Message>) -> Result<(), HandlerError>;
}

/// Produces the reply to a request.
#[async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    async fn handle(&self, request: Box<dyn Message>) -> Result<Box<dyn Message>, HandlerError>;
}

/// A [`MessageHandler`] backed by an async closure.
pub struct MessageFn<F>(F);

/// A [`RequestHandler`] backed by an async closure.
pub struct RequestFn<F>(F);

/// Wrap an async closure as a message handler.
pub fn handler_fn<F, Fut>(f: F) -> MessageFn<F>
where
    F: Fn(Box<dyn Message>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    MessageFn(f)
}

/// Wrap an async closure as a request handler.
pub fn request_fn<F, Fut>(f: F) -> RequestFn<F>
where
    F: Fn(Box<dyn Message>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Box<dyn Message>, HandlerError>> + Send + 'static,
{
    RequestFn(f)
}

#[async_trait]
impl<F, Fut> MessageHandler for MessageFn<F>
where
    F: Fn(Box<dyn Message>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(&self, message: Box<dyn Message>) -> Result<(), HandlerError> {
        (self.0)(message).await
    }
}

#[async_trait]
impl<F, Fut> RequestHandler for RequestFn<F>
where
    F: Fn(Box<dyn Message>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Box<dyn Message>, HandlerError>> + Send + 'static,
{
    async fn handle(&self, request: Box<dyn Message>) -> Result<Box<dyn Message>, HandlerError> {
        (self.0)(request).await
    }
}
