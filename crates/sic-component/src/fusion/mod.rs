//! # Stream Fusion
//!
//! Buffers the inputs of a service per (message type, origin) and selects
//! one tuple of messages whose timestamps agree within a tolerance.

mod align;
mod buffer;
mod inputs;

pub use align::{Alignment, FusionBuffers, PushOutcome};
pub use buffer::{is_drop_warning, InputBuffer, DROP_WARNING_THRESHOLDS};
pub use inputs::{FusedInputs, InputSpec};
