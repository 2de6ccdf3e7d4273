//! Component roles.
//!
//! Every component implements [`Component`]. A component that produces
//! data without input is additionally a [`Sensor`]; one that computes over
//! aligned inputs is a [`Service`]. An [`Actuator`] turns each request into
//! an action and answers with its result.

use crate::config::DEFAULT_STARTUP_TIMEOUT;
use crate::context::ComponentContext;
use crate::fusion::{FusedInputs, InputSpec};
use async_trait::async_trait;
use sic_bus::HandlerError;
use sic_message::{Message, TypedMessage};
use std::time::Duration;

#[async_trait]
pub trait Component: Send + Sync + Sized + 'static {
    /// Class name; also the first segment of every channel of an instance.
    const NAME: &'static str;

    /// Time the instance gets to reach `Ready`.
    const STARTUP_TIMEOUT: Duration = DEFAULT_STARTUP_TIMEOUT;

    /// Configuration message. `Default` is used when none is supplied.
    type Conf: TypedMessage + Default;

    /// Build the instance. Failing here aborts the start and is reported
    /// to whoever requested it.
    async fn create(ctx: &ComponentContext, conf: Self::Conf) -> Result<Self, HandlerError>;

    /// Message arriving on a connected input channel.
    async fn on_message(
        &self,
        ctx: &ComponentContext,
        message: Box<dyn Message>,
    ) -> Result<(), HandlerError> {
        ctx.logger().framework_verbose(format!(
            "No input handler, dropping {}",
            message.type_tag()
        ));
        Ok(())
    }

    /// Request other than the built-in control requests.
    async fn on_request(
        &self,
        _ctx: &ComponentContext,
        request: Box<dyn Message>,
    ) -> Result<Box<dyn Message>, HandlerError> {
        Err(format!("{} does not handle {}", Self::NAME, request.type_tag()).into())
    }

    /// Called once while stopping, before the bus is closed.
    async fn on_stop(&self, _ctx: &ComponentContext) {}
}

/// A producer: `execute` is called in a loop and each message it returns
/// is published on the output channel.
#[async_trait]
pub trait Sensor: Component {
    /// Capture one message. `None` publishes nothing this round.
    async fn execute(&self, ctx: &ComponentContext)
        -> Result<Option<Box<dyn Message>>, HandlerError>;
}

/// A fusion consumer: `execute` is called with one aligned tuple of the
/// declared inputs at a time.
#[async_trait]
pub trait Service: Component {
    /// Declared inputs. At least one is required.
    fn inputs() -> Vec<InputSpec>;

    /// Compute over one tuple. A returned message is published carrying
    /// the tuple's timestamp.
    async fn execute(
        &self,
        ctx: &ComponentContext,
        inputs: FusedInputs,
    ) -> Result<Option<Box<dyn Message>>, HandlerError>;
}

/// A request consumer: every request that is not a control request is
/// passed to `execute` and its result is the reply.
#[async_trait]
pub trait Actuator: Component {
    async fn execute(
        &self,
        ctx: &ComponentContext,
        request: Box<dyn Message>,
    ) -> Result<Box<dyn Message>, HandlerError>;
}
