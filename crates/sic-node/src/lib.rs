//! # SIC Node
//!
//! A single-process node: one in-memory broker, one component manager and a
//! small camera pipeline driven through connectors.
//!
//! ```text
//!   TopCamera:{ip} ────┐
//!                      ├──► MergeImages (fusion) ──► MergeImages:{ip}
//!   BottomCamera:{ip} ─┘
//! ```
//!
//! - `components` - demo sensor and service classes
//! - `pipeline` - manager and connector wiring

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod components;
pub mod pipeline;

pub use components::{BottomCamera, Camera, CameraConf, MergeImages, TopCamera};
pub use pipeline::{NodeConfig, Pipeline};
