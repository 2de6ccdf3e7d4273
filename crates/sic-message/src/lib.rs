//! # SIC Message
//!
//! Typed messages and the hybrid wire codec.
//!
//! ## Model
//!
//! - [`Message`]: object-safe view (tag, kind, header, field encoder)
//! - [`Envelope<P, K>`]: a payload `P` embedded in a message of kind `K`
//! - [`MessageRegistry`]: receiver-side tag → decoder table
//!
//! ## Wire Format
//!
//! ```text
//! ┌──────┬─────────┬──────────┬──────┬────────┬──────────────────────────┐
//! │ SICM │ version │ type tag │ kind │ header │ [(name, flag, bytes), …] │
//! └──────┴─────────┴──────────┴──────┴────────┴──────────────────────────┘
//! ```
//!
//! Field flags are `Plain` (bincode), `Nested` (recursive message),
//! `Array` (lossless numeric array) and `Image` (JPEG colour image).
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sic_message::{encode, MessageRegistry, TextMessage};
//!
//! let registry = MessageRegistry::with_core_types();
//! let bytes = encode(&TextMessage::new("hello".into()))?;
//! let message = registry.decode(&bytes)?;
//! assert!(message.is::<TextMessage>());
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod array;
pub mod codec;
pub mod error;
pub mod header;
mod jpeg;
pub mod kind;
pub mod message;
pub mod registry;
pub mod types;

pub use array::{DType, Element, NdArray};
pub use codec::{
    encode, peek, FieldEncoding, FieldReader, FieldWriter, MAX_WIRE_BYTES, WIRE_MAGIC,
    WIRE_VERSION,
};
pub use error::CodecError;
pub use header::{now_timestamp, Header, RequestId};
pub use jpeg::JPEG_QUALITY;
pub use kind::MessageKind;
pub use message::{Envelope, Message, Payload, Tagged, TypedMessage};
pub use registry::MessageRegistry;
pub use types::*;

/// Wrapper aliases for user payloads.
pub type DataMessage<P> = Envelope<P, kind::Data>;
pub type RequestMessage<P> = Envelope<P, kind::Request>;
pub type ConfMessage<P> = Envelope<P, kind::Conf>;
