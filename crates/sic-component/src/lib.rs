//! # SIC Component Runtime
//!
//! Lifecycle, control protocol and role drivers for SIC components.
//!
//! ## Roles
//!
//! | Role | Trait | Driver |
//! |------|-------|--------|
//! | Reactive | [`Component`] | waits for stop, serves requests |
//! | Actuator | [`Actuator`] | answers each request with `execute` |
//! | Sensor | [`Sensor`] | loops `execute`, publishes each capture |
//! | Service | [`Service`] | aligns declared inputs, publishes each result |
//!
//! ## Channels
//!
//! An instance of class `Name` on host `ip` owns:
//!
//! - `Name:ip`: output
//! - `Name:reqreply:ip`: control and user requests
//! - `Name:input:ip`: conventional input channel for clients
//!
//! ## Usage
//!
//! ```ignore
//! let handle = launch_sensor::<Camera>(LaunchOptions::new(broker, registry, local_ip()));
//! handle.wait_ready(Camera::STARTUP_TIMEOUT).await?;
//! // ...
//! handle.shutdown().await?;
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod context;
pub mod error;
pub mod fusion;
pub mod handle;
pub mod naming;
pub mod runtime;
pub mod state;
pub mod traits;

pub use config::{FusionConfig, DEFAULT_STARTUP_TIMEOUT};
pub use context::ComponentContext;
pub use error::ComponentError;
pub use fusion::{FusedInputs, FusionBuffers, InputSpec};
pub use handle::{ComponentHandle, LaunchOptions};
pub use naming::{input_channel, local_ip, manager_channel, output_channel, reqreply_channel};
pub use runtime::{launch, launch_actuator, launch_sensor, launch_service};
pub use state::ComponentState;
pub use traits::{Actuator, Component, Sensor, Service};
