//! # SIC Manager
//!
//! Per-host component manager and the client-side connector.
//!
//! ## Start Flow
//!
//! ```text
//! Connector<C>::connect(ip)
//!     │
//!     ├─ Ping "C:reqreply:ip" ──── Pong ──────────────────────┐
//!     │                                                       │
//!     └─ timeout ─► StartComponentRequest on "ip"             │
//!                       │                                     │
//!                       ├─ Success ───────────────────────────┤
//!                       ├─ NotStarted(reason) ─► error        │
//!                       └─ timeout ─► Unreachable             ▼
//!                                             ConnectRequest("C:input:ip")
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! let manager = ComponentManager::builder(broker.clone(), registry.clone(), ManagerConfig::from_env())
//!     .register_sensor::<Camera>()
//!     .register_service::<FaceDetection>()
//!     .start()
//!     .await?;
//! manager.serve().await;
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod connector;
pub mod error;
pub mod manager;

pub use config::{ConnectorConfig, ManagerConfig, DEFAULT_PING_TIMEOUT, DEFAULT_REQUEST_TIMEOUT};
pub use connector::Connector;
pub use error::{ConnectorError, ManagerError};
pub use manager::{ComponentManager, ManagerBuilder};
