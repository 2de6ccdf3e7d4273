//! # Component Runtime
//!
//! Runs one instance from bus connection to shutdown on its own task.
//!
//! ```text
//! launch ──► ConnectingBus ──► Starting ──► Ready ──► Running ──► Stopping ──► Stopped
//!              Bus::connect     resolve conf  control     drive       on_stop     bus closed
//!                               create()      handler     loop
//!                   │               │
//!                   └── failure ────┴──────────────────────────────────────────► Stopped
//! ```
//!
//! The request channel of every instance first answers the control
//! requests (`Ping`, `Stop`, `Connect`); anything else reaches the
//! component's own request handler.

use crate::context::ComponentContext;
use crate::error::ComponentError;
use crate::fusion::{Alignment, FusionBuffers, PushOutcome};
use crate::handle::{ComponentHandle, LaunchOptions};
use crate::naming::output_channel;
use crate::state::ComponentState;
use crate::traits::{Actuator, Component, Sensor, Service};
use async_trait::async_trait;
use parking_lot::Mutex;
use sic_bus::{Bus, BusLogSink, HandlerError, MessageHandler, RequestHandler};
use sic_message::{
    encode, now_timestamp, ConnectRequest, Message, PingRequest, PongMessage, StopRequest,
    SuccessMessage,
};
use sic_telemetry::{ComponentLogger, DiagnosticSink, TracingSink};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Role-specific behaviour plugged into the shared lifecycle.
#[async_trait]
trait Runtime: Send + Sync + 'static {
    async fn deliver(
        &self,
        ctx: &ComponentContext,
        message: Box<dyn Message>,
    ) -> Result<(), HandlerError>;

    async fn request(
        &self,
        ctx: &ComponentContext,
        request: Box<dyn Message>,
    ) -> Result<Box<dyn Message>, HandlerError>;

    /// Main loop; returns once a stop was requested or on failure.
    async fn drive(&self, ctx: &ComponentContext) -> Result<(), ComponentError>;

    async fn stopping(&self, ctx: &ComponentContext);
}

/// Reacts to inputs and requests only.
struct Reactive<C>(C);

#[async_trait]
impl<C: Component> Runtime for Reactive<C> {
    async fn deliver(
        &self,
        ctx: &ComponentContext,
        message: Box<dyn Message>,
    ) -> Result<(), HandlerError> {
        self.0.on_message(ctx, message).await
    }

    async fn request(
        &self,
        ctx: &ComponentContext,
        request: Box<dyn Message>,
    ) -> Result<Box<dyn Message>, HandlerError> {
        self.0.on_request(ctx, request).await
    }

    async fn drive(&self, ctx: &ComponentContext) -> Result<(), ComponentError> {
        ctx.stopped().await;
        Ok(())
    }

    async fn stopping(&self, ctx: &ComponentContext) {
        self.0.on_stop(ctx).await;
    }
}

/// Answers requests through the actuator's `execute`.
struct Actuated<A>(A);

#[async_trait]
impl<A: Actuator> Runtime for Actuated<A> {
    async fn deliver(
        &self,
        ctx: &ComponentContext,
        message: Box<dyn Message>,
    ) -> Result<(), HandlerError> {
        self.0.on_message(ctx, message).await
    }

    async fn request(
        &self,
        ctx: &ComponentContext,
        request: Box<dyn Message>,
    ) -> Result<Box<dyn Message>, HandlerError> {
        Actuator::execute(&self.0, ctx, request).await
    }

    async fn drive(&self, ctx: &ComponentContext) -> Result<(), ComponentError> {
        ctx.stopped().await;
        Ok(())
    }

    async fn stopping(&self, ctx: &ComponentContext) {
        self.0.on_stop(ctx).await;
    }
}

/// Publishes whatever the sensor captures until stopped.
struct Producer<S>(S);

#[async_trait]
impl<S: Sensor> Runtime for Producer<S> {
    async fn deliver(
        &self,
        ctx: &ComponentContext,
        message: Box<dyn Message>,
    ) -> Result<(), HandlerError> {
        self.0.on_message(ctx, message).await
    }

    async fn request(
        &self,
        ctx: &ComponentContext,
        request: Box<dyn Message>,
    ) -> Result<Box<dyn Message>, HandlerError> {
        self.0.on_request(ctx, request).await
    }

    async fn drive(&self, ctx: &ComponentContext) -> Result<(), ComponentError> {
        loop {
            let captured = tokio::select! {
                biased;
                _ = ctx.stopped() => return Ok(()),
                captured = Sensor::execute(&self.0, ctx) => captured,
            };
            match captured {
                Ok(Some(mut message)) => {
                    if message.timestamp().is_none() {
                        message.header_mut().timestamp = Some(now_timestamp());
                    }
                    ctx.output_boxed(message).await?;
                }
                Ok(None) => tokio::task::yield_now().await,
                Err(err) => return Err(ComponentError::Execute(err.to_string())),
            }
        }
    }

    async fn stopping(&self, ctx: &ComponentContext) {
        self.0.on_stop(ctx).await;
    }
}

/// Buffers inputs and runs the service on every aligned tuple.
struct Fused<S> {
    service: S,
    buffers: FusionBuffers,
}

#[async_trait]
impl<S: Service> Runtime for Fused<S> {
    async fn deliver(
        &self,
        ctx: &ComponentContext,
        message: Box<dyn Message>,
    ) -> Result<(), HandlerError> {
        let tag = message.type_tag();
        let origin = message.origin().unwrap_or("unknown").to_string();
        match self.buffers.push(message) {
            PushOutcome::Buffered => {
                ctx.logger()
                    .framework_verbose(format!("Buffered {tag} from {origin}"));
            }
            PushOutcome::Evicted { dropped, warn } => {
                let text = format!("Input buffer for {tag} from {origin} full, dropped {dropped} so far");
                if warn {
                    ctx.logger().warning(text);
                } else {
                    ctx.logger().framework_verbose(text);
                }
            }
            PushOutcome::Undeclared => {
                ctx.logger()
                    .debug(format!("{tag} from {origin} is not a declared input, ignoring"));
            }
            PushOutcome::MissingTimestamp => {
                ctx.logger()
                    .framework_verbose(format!("{tag} from {origin} has no timestamp, ignoring"));
            }
        }
        Ok(())
    }

    async fn request(
        &self,
        ctx: &ComponentContext,
        request: Box<dyn Message>,
    ) -> Result<Box<dyn Message>, HandlerError> {
        self.service.on_request(ctx, request).await
    }

    async fn drive(&self, ctx: &ComponentContext) -> Result<(), ComponentError> {
        let poll = self.buffers.config().poll_interval;
        loop {
            loop {
                match self.buffers.try_align() {
                    Alignment::Fused(inputs) => {
                        let timestamp = inputs.timestamp();
                        ctx.logger().framework_verbose(format!(
                            "Fused {} inputs at {timestamp:.3}",
                            inputs.len()
                        ));
                        match Service::execute(&self.service, ctx, inputs).await {
                            Ok(Some(mut output)) => {
                                output.header_mut().timestamp = Some(timestamp);
                                ctx.output_boxed(output).await?;
                            }
                            Ok(None) => {}
                            Err(err) => return Err(ComponentError::Execute(err.to_string())),
                        }
                        if ctx.is_stopping() {
                            return Ok(());
                        }
                    }
                    Alignment::OutOfTolerance { candidate } => {
                        ctx.logger().framework_verbose(format!(
                            "No aligned inputs around {candidate:.3}"
                        ));
                        break;
                    }
                    Alignment::Incomplete => break,
                }
            }

            if let Some(missing) = self.buffers.check_stall() {
                let waiting = if missing.is_empty() {
                    "inputs out of tolerance".to_string()
                } else {
                    format!("waiting on {}", missing.join(", "))
                };
                ctx.logger().warning(format!(
                    "No fused inputs for {:?}, {waiting}",
                    self.buffers.config().stall_warning_after
                ));
            }

            tokio::select! {
                biased;
                _ = ctx.stopped() => return Ok(()),
                _ = self.buffers.notified() => {}
                _ = tokio::time::sleep(poll) => {}
            }
        }
    }

    async fn stopping(&self, ctx: &ComponentContext) {
        ctx.logger().framework(format!(
            "Fusion stats at stop: {}",
            self.buffers.stats()
        ));
        self.service.on_stop(ctx).await;
    }
}

/// Serves the request channel of an instance.
struct ControlHandler<R> {
    runtime: Arc<R>,
    ctx: ComponentContext,
}

#[async_trait]
impl<R: Runtime> RequestHandler for ControlHandler<R> {
    async fn handle(&self, request: Box<dyn Message>) -> Result<Box<dyn Message>, HandlerError> {
        if request.is::<PingRequest>() {
            return Ok(PongMessage::default().boxed());
        }
        if request.is::<StopRequest>() {
            self.ctx.logger().framework("Stop requested");
            self.ctx.request_stop();
            return Ok(SuccessMessage::default().boxed());
        }
        if let Some(connect) = request.downcast_ref::<ConnectRequest>() {
            let channel = connect.channel.clone();
            self.connect_input(channel).await?;
            return Ok(SuccessMessage::default().boxed());
        }

        match self.runtime.request(&self.ctx, request).await {
            Ok(reply) => Ok(reply),
            Err(err) => {
                self.ctx
                    .logger()
                    .error(format!("Request handler failed, stopping: {err}"));
                self.ctx.request_stop();
                Err(err)
            }
        }
    }
}

impl<R: Runtime> ControlHandler<R> {
    async fn connect_input(&self, channel: String) -> Result<(), HandlerError> {
        if self.ctx.is_connected(&channel) {
            self.ctx
                .logger()
                .debug(format!("Already connected to {channel}"));
            return Ok(());
        }
        let input = InputHandler {
            runtime: self.runtime.clone(),
            ctx: self.ctx.clone(),
        };
        let subscription = self
            .ctx
            .bus()
            .subscribe([channel.clone()], input, true)
            .await?;
        self.ctx
            .logger()
            .framework(format!("Connected input channel {channel}"));
        self.ctx.record_input(channel, subscription);
        Ok(())
    }
}

/// Feeds messages from a connected input channel to the runtime.
struct InputHandler<R> {
    runtime: Arc<R>,
    ctx: ComponentContext,
}

#[async_trait]
impl<R: Runtime> MessageHandler for InputHandler<R> {
    async fn handle(&self, message: Box<dyn Message>) -> Result<(), HandlerError> {
        if let Err(err) = self.runtime.deliver(&self.ctx, message).await {
            self.ctx
                .logger()
                .error(format!("Input handler failed, stopping: {err}"));
            self.ctx.request_stop();
            return Err(err);
        }
        Ok(())
    }
}

/// Start an instance of a reactive component.
///
/// Must be called from within a Tokio runtime.
pub fn launch<C: Component>(options: LaunchOptions) -> ComponentHandle {
    spawn_lifecycle(C::NAME, options, |ctx, conf| async move {
        Ok(Reactive(construct::<C>(&ctx, conf).await?))
    })
}

/// Start an instance of an actuator.
pub fn launch_actuator<A: Actuator>(options: LaunchOptions) -> ComponentHandle {
    spawn_lifecycle(A::NAME, options, |ctx, conf| async move {
        Ok(Actuated(construct::<A>(&ctx, conf).await?))
    })
}

/// Start an instance of a sensor.
pub fn launch_sensor<S: Sensor>(options: LaunchOptions) -> ComponentHandle {
    spawn_lifecycle(S::NAME, options, |ctx, conf| async move {
        Ok(Producer(construct::<S>(&ctx, conf).await?))
    })
}

/// Start an instance of a service with its fusion buffers.
pub fn launch_service<S: Service>(options: LaunchOptions) -> ComponentHandle {
    let fusion = options.fusion.clone();
    spawn_lifecycle(S::NAME, options, move |ctx, conf| async move {
        let buffers = FusionBuffers::new(S::inputs(), fusion)?;
        let service = construct::<S>(&ctx, conf).await?;
        Ok(Fused { service, buffers })
    })
}

fn spawn_lifecycle<R, B, Fut>(
    name: &'static str,
    options: LaunchOptions,
    build: B,
) -> ComponentHandle
where
    R: Runtime,
    B: FnOnce(ComponentContext, Option<Box<dyn Message>>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<R, ComponentError>> + Send + 'static,
{
    let (state_tx, state_rx) = watch::channel(ComponentState::Created);
    let stop = CancellationToken::new();
    let failure = Arc::new(Mutex::new(None));
    let ip = options.ip.clone();

    let task = tokio::spawn(run_lifecycle(
        name,
        options,
        state_tx,
        stop.clone(),
        failure.clone(),
        build,
    ));
    ComponentHandle::new(name, ip, state_rx, stop, failure, task)
}

async fn run_lifecycle<R, B, Fut>(
    name: &'static str,
    options: LaunchOptions,
    state: watch::Sender<ComponentState>,
    stop: CancellationToken,
    failure: Arc<Mutex<Option<String>>>,
    build: B,
) -> Result<(), ComponentError>
where
    R: Runtime,
    B: FnOnce(ComponentContext, Option<Box<dyn Message>>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<R, ComponentError>> + Send + 'static,
{
    let LaunchOptions {
        broker,
        registry,
        ip,
        log_level,
        conf,
        bus: bus_config,
        fusion: _,
        sinks,
    } = options;

    state.send_replace(ComponentState::ConnectingBus);
    let bus = match Bus::connect_with_config(
        broker.as_ref(),
        output_channel(name, &ip),
        registry,
        bus_config,
    )
    .await
    {
        Ok(bus) => bus,
        Err(err) => return abort_start(name, None, &state, &failure, err.into()).await,
    };

    let mut all_sinks: Vec<Arc<dyn DiagnosticSink>> = vec![
        Arc::new(TracingSink),
        Arc::new(BusLogSink::new(bus.downgrade())),
    ];
    all_sinks.extend(sinks);
    let logger = ComponentLogger::with_sinks(format!("{name} {ip}"), log_level, all_sinks);
    bus.set_logger(logger.clone());
    let ctx = ComponentContext::new(name, ip, bus.clone(), logger, stop.clone());

    state.send_replace(ComponentState::Starting);
    ctx.logger().framework(format!("Starting {name}"));
    let runtime = match build(ctx.clone(), conf).await {
        Ok(runtime) => Arc::new(runtime),
        Err(err) => return abort_start(name, Some(&bus), &state, &failure, err).await,
    };

    let control = ControlHandler {
        runtime: runtime.clone(),
        ctx: ctx.clone(),
    };
    if let Err(err) = bus
        .register_request_handler(ctx.reqreply_channel(), control)
        .await
    {
        runtime.stopping(&ctx).await;
        return abort_start(name, Some(&bus), &state, &failure, err.into()).await;
    }

    ctx.logger().framework(format!(
        "Started {name}, serving {}",
        ctx.reqreply_channel()
    ));
    state.send_replace(ComponentState::Ready);
    state.send_replace(ComponentState::Running);

    let outcome = runtime.drive(&ctx).await;
    if let Err(err) = &outcome {
        ctx.logger().error(format!("Stopping after error: {err}"));
    }

    state.send_replace(ComponentState::Stopping);
    stop.cancel();
    runtime.stopping(&ctx).await;
    if let Err(err) = bus.close().await {
        warn!(component = name, error = %err, "Bus close failed");
    }
    state.send_replace(ComponentState::Stopped);
    debug!(component = name, "Stopped");
    outcome
}

async fn abort_start(
    name: &'static str,
    bus: Option<&Bus>,
    state: &watch::Sender<ComponentState>,
    failure: &Mutex<Option<String>>,
    err: ComponentError,
) -> Result<(), ComponentError> {
    let reason = err.reason();
    warn!(component = name, reason = %reason, "Start failed");
    if let Some(bus) = bus {
        if let Err(close_err) = bus.close().await {
            debug!(component = name, error = %close_err, "Bus close after failed start");
        }
    }
    *failure.lock() = Some(reason.clone());
    state.send_replace(ComponentState::Stopped);
    Err(ComponentError::Start {
        name: name.to_string(),
        reason,
    })
}

async fn construct<C: Component>(
    ctx: &ComponentContext,
    conf: Option<Box<dyn Message>>,
) -> Result<C, ComponentError> {
    let conf = resolve_conf::<C>(ctx, conf)?;
    C::create(ctx, conf)
        .await
        .map_err(|err| ComponentError::Start {
            name: C::NAME.to_string(),
            reason: err.to_string(),
        })
}

/// The supplied configuration, or the class default when none was given.
fn resolve_conf<C: Component>(
    ctx: &ComponentContext,
    conf: Option<Box<dyn Message>>,
) -> Result<C::Conf, ComponentError> {
    let default = C::Conf::default();
    let Some(conf) = conf else {
        ctx.logger().framework("Using default configuration");
        return Ok(default);
    };

    let conf = conf
        .downcast::<C::Conf>()
        .map_err(|err| ComponentError::Conf {
            name: C::NAME.to_string(),
            reason: err.to_string(),
        })?;

    let mut probe = conf.clone();
    *probe.header_mut() = default.header().clone();
    if encode(&probe)? == encode(&default)? {
        ctx.logger()
            .info("Supplied configuration equals the default");
    } else {
        ctx.logger().framework("Applying supplied configuration");
    }
    Ok(conf)
}
