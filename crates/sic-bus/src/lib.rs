//! # SIC Bus - Channel Bus for Component Communication
//!
//! Typed publish/subscribe and request/reply on top of a broker.
//!
//! ## Pattern
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │ Component A  │                    │ Component B  │
//! │              │    publish()       │              │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │    Broker    │          │
//!                  │              │ ─────────┘
//!                  └──────────────┘  subscribe()
//! ```
//!
//! ## Rules
//!
//! - One broker connection per [`Bus`]; no shared process-wide connection
//! - Every inbound payload is decoded through the bus's registry
//! - Handler or decode failure ends that subscription only
//! - [`Bus::close`] is explicit and bounded by the shutdown grace

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod broker;
pub mod bus;
pub mod config;
pub mod error;
pub mod handler;
pub mod log_sink;
pub mod memory;
pub mod request;

pub use broker::{Broker, BrokerConnection, BrokerSubscription, Delivery};
pub use bus::{Bus, Subscription, WeakBus};
pub use config::BusConfig;
pub use error::{BusError, HandlerError};
pub use handler::{handler_fn, request_fn, MessageFn, MessageHandler, RequestFn, RequestHandler};
pub use log_sink::{BusLogSink, LOG_CHANNEL};
pub use memory::{InMemoryBroker, InMemoryConnection};
