//! # Connector
//!
//! Client-side proxy for one component class on one host.
//!
//! Connecting pings the component first. If nothing answers, the host's
//! component manager is asked to start it. Either way the component is then
//! subscribed to its client-facing input channel, so
//! [`Connector::send_message`] reaches it.

use crate::config::ConnectorConfig;
use crate::error::ConnectorError;
use parking_lot::Mutex;
use sic_bus::{Broker, Bus, BusError, MessageHandler, Subscription, LOG_CHANNEL};
use sic_bus::handler_fn;
use sic_component::{
    input_channel, local_ip, manager_channel, output_channel, reqreply_channel, Component,
};
use sic_message::{
    now_timestamp, ConnectRequest, LogMessage, Message, MessageRegistry, NotStartedMessage,
    PingRequest, StartComponent, StartComponentRequest, StopRequest, TypedMessage,
};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub struct Connector<C> {
    bus: Bus,
    ip: String,
    output_channel: String,
    input_channel: String,
    reqreply_channel: String,
    config: ConnectorConfig,
    callbacks: Mutex<Vec<Subscription>>,
    component: PhantomData<fn() -> C>,
}

impl<C: Component> Connector<C> {
    /// Reach `C` on `ip`, starting it through the manager if needed.
    ///
    /// `"localhost"` and `"127.0.0.1"` resolve to this host's address.
    pub async fn connect(
        broker: &dyn Broker,
        registry: Arc<MessageRegistry>,
        ip: &str,
        config: ConnectorConfig,
    ) -> Result<Self, ConnectorError> {
        let ip = match ip {
            "localhost" | "127.0.0.1" => local_ip(),
            other => other.to_string(),
        };
        let bus = Bus::connect(broker, format!("connector:{}:{}", C::NAME, ip), registry).await?;

        let connector = Self {
            output_channel: output_channel(C::NAME, &ip),
            input_channel: input_channel(C::NAME, &ip),
            reqreply_channel: reqreply_channel(C::NAME, &ip),
            bus,
            ip,
            config,
            callbacks: Mutex::new(Vec::new()),
            component: PhantomData,
        };

        if let Err(err) = connector.establish().await {
            connector.close().await;
            return Err(err);
        }
        Ok(connector)
    }

    async fn establish(&self) -> Result<(), ConnectorError> {
        if self.config.forward_logs {
            self.forward_logs().await?;
        }
        if !self.ping().await? {
            self.start_component().await?;
        }

        let connect = ConnectRequest::to_channel(self.input_channel.clone());
        self.bus
            .request(&self.reqreply_channel, &connect, self.config.ping_timeout, true)
            .await
            .map_err(|err| self.unreachable_on_timeout(err))?;
        debug!(component = C::NAME, ip = %self.ip, "Connector ready");
        Ok(())
    }

    /// Whether a running instance answers a ping.
    pub async fn ping(&self) -> Result<bool, ConnectorError> {
        match self
            .bus
            .request(
                &self.reqreply_channel,
                &PingRequest::default(),
                self.config.ping_timeout,
                true,
            )
            .await
        {
            Ok(_) => Ok(true),
            Err(err) if err.is_timeout() => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn start_component(&self) -> Result<(), ConnectorError> {
        info!(
            "{} not running, requesting it from the manager on {}",
            C::NAME,
            self.ip
        );
        let mut payload = StartComponent::new(C::NAME, self.config.log_level);
        payload.conf = self.config.conf.clone();
        let request = StartComponentRequest::new(payload);
        let timeout = self
            .config
            .start_timeout
            .unwrap_or(C::STARTUP_TIMEOUT + self.config.ping_timeout);

        let reply = self
            .bus
            .request(&manager_channel(&self.ip), &request, timeout, true)
            .await
            .map_err(|err| self.unreachable_on_timeout(err))?
            .ok_or(BusError::ConnectionClosed)?;

        if reply.is::<NotStartedMessage>() {
            let not_started = reply.downcast::<NotStartedMessage>()?;
            return Err(ConnectorError::NotStarted {
                name: C::NAME.to_string(),
                reason: not_started.into_payload().message,
            });
        }
        Ok(())
    }

    fn unreachable_on_timeout(&self, err: BusError) -> ConnectorError {
        if err.is_timeout() {
            ConnectorError::Unreachable {
                name: C::NAME.to_string(),
                ip: self.ip.clone(),
            }
        } else {
            err.into()
        }
    }

    async fn forward_logs(&self) -> Result<(), ConnectorError> {
        let subscription = self
            .bus
            .subscribe(
                [LOG_CHANNEL],
                handler_fn(|message: Box<dyn Message>| async move {
                    if let Some(log) = message.downcast_ref::<LogMessage>() {
                        info!(target: "sic::remote", "{}", log.msg.trim_end());
                    }
                    Ok::<(), sic_bus::HandlerError>(())
                }),
                true,
            )
            .await?;
        self.callbacks.lock().push(subscription);
        Ok(())
    }

    /// Blocking request with the configured request timeout.
    ///
    /// The request is stamped with the current time before sending.
    pub async fn request(&self, request: &dyn Message) -> Result<Box<dyn Message>, ConnectorError> {
        let reply = self
            .request_with(request, self.config.request_timeout, true)
            .await?;
        Ok(reply.ok_or(BusError::ConnectionClosed)?)
    }

    /// Request with an explicit timeout; `block = false` returns `None`
    /// right after sending.
    pub async fn request_with(
        &self,
        request: &dyn Message,
        timeout: Duration,
        block: bool,
    ) -> Result<Option<Box<dyn Message>>, ConnectorError> {
        let mut request = request.clone_boxed();
        request.header_mut().timestamp = Some(now_timestamp());
        Ok(self
            .bus
            .request(&self.reqreply_channel, request.as_ref(), timeout, block)
            .await?)
    }

    /// Blocking request that requires a reply of type `R`.
    pub async fn request_as<R: TypedMessage>(&self, request: &dyn Message) -> Result<R, ConnectorError> {
        let reply = self.request(request).await?;
        if !reply.is::<R>() {
            return Err(BusError::UnexpectedReply {
                expected: R::TYPE_TAG,
                found: reply.type_tag(),
            }
            .into());
        }
        Ok(reply.downcast::<R>()?)
    }

    /// Publish on the component's input channel, stamped with the current
    /// time.
    pub async fn send_message<M: Message>(&self, mut message: M) -> Result<usize, ConnectorError> {
        message.header_mut().timestamp = Some(now_timestamp());
        Ok(self.bus.publish(&self.input_channel, &message).await?)
    }

    /// Receive everything the component outputs.
    pub async fn register_callback<H: MessageHandler>(&self, handler: H) -> Result<(), ConnectorError> {
        let subscription = self
            .bus
            .subscribe([self.output_channel.clone()], handler, true)
            .await?;
        self.callbacks.lock().push(subscription);
        Ok(())
    }

    /// Feed the output of `other` into this component.
    pub async fn connect_to<O: Component>(&self, other: &Connector<O>) -> Result<(), ConnectorError> {
        let request = ConnectRequest::to_channel(other.output_channel());
        self.bus
            .request(&self.reqreply_channel, &request, self.config.request_timeout, true)
            .await?;
        Ok(())
    }

    /// Ask the component to stop, then close this connector.
    pub async fn stop(&self) -> Result<(), ConnectorError> {
        let sent = self
            .bus
            .request(&self.reqreply_channel, &StopRequest::default(), self.config.ping_timeout, false)
            .await;
        self.close().await;
        sent?;
        Ok(())
    }

    /// Drop callbacks and close the bus connection. The component keeps
    /// running.
    pub async fn close(&self) {
        self.callbacks.lock().clear();
        if let Err(err) = self.bus.close().await {
            debug!(component = C::NAME, error = %err, "Connector bus close failed");
        }
    }

    #[must_use]
    pub fn ip(&self) -> &str {
        &self.ip
    }

    #[must_use]
    pub fn output_channel(&self) -> &str {
        &self.output_channel
    }

    #[must_use]
    pub fn input_channel(&self) -> &str {
        &self.input_channel
    }

    #[must_use]
    pub fn reqreply_channel(&self) -> &str {
        &self.reqreply_channel
    }

    #[must_use]
    pub fn bus(&self) -> &Bus {
        &self.bus
    }
}
