//! # SIC Test Suite
//!
//! Unified test crate for flows that cross crate boundaries.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── flows.rs          # request/reply and lifecycle over one broker
//!     ├── fusion.rs         # multi-stream alignment through a running service
//!     └── choreography.rs   # manager + connectors driving a pipeline
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p sic-tests
//!
//! # By flow
//! cargo test -p sic-tests integration::fusion::
//!
//! # Benchmarks
//! cargo bench -p sic-tests
//! ```

#![allow(dead_code)]

pub mod integration;
