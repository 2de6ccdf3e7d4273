//! # Hybrid Codec
//!
//! Every payload field is written with a flag describing how its bytes
//! were produced:
//!
//! | Flag | Field value | Bytes |
//! |------|-------------|-------|
//! | `Plain` | any serde value | bincode |
//! | `Nested` | another message | recursive [`encode`] |
//! | `Array` | [`NdArray`] | lossless dtype/shape-prefixed form |
//! | `Image` | `[h, w, 3]` u8 array on a compressing type | shape prefix + JPEG |
//!
//! The flagged field list, type tag, kind and header are then serialized
//! with bincode behind a 4-byte magic and a wire version.

use crate::array::NdArray;
use crate::error::CodecError;
use crate::header::Header;
use crate::jpeg;
use crate::kind::MessageKind;
use crate::message::{Message, TypedMessage};
use crate::registry::MessageRegistry;
use bincode::Options;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Leading bytes of every encoded message.
pub const WIRE_MAGIC: [u8; 4] = *b"SICM";

/// Current wire layout version.
pub const WIRE_VERSION: u16 = 1;

/// Upper bound on a single encoded message.
pub const MAX_WIRE_BYTES: u64 = 256 * 1024 * 1024;

fn wire_options() -> impl Options {
    bincode::DefaultOptions::new().with_limit(MAX_WIRE_BYTES)
}

/// How a field's bytes were produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldEncoding {
    Plain,
    Nested,
    Array,
    Image,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct WireField {
    name: String,
    encoding: FieldEncoding,
    bytes: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct WireMessage {
    magic: [u8; 4],
    version: u16,
    pub(crate) type_tag: String,
    pub(crate) kind: MessageKind,
    pub(crate) header: Header,
    pub(crate) fields: Vec<WireField>,
}

/// Encode a message to wire bytes.
pub fn encode(message: &dyn Message) -> Result<Vec<u8>, CodecError> {
    let mut writer = FieldWriter::new(message.compress_images());
    message.encode_fields(&mut writer)?;

    let wire = WireMessage {
        magic: WIRE_MAGIC,
        version: WIRE_VERSION,
        type_tag: message.type_tag().to_string(),
        kind: message.kind(),
        header: message.header().clone(),
        fields: writer.fields,
    };
    wire_options()
        .serialize(&wire)
        .map_err(|e| CodecError::Encode(e.to_string()))
}

pub(crate) fn decode_wire(bytes: &[u8]) -> Result<WireMessage, CodecError> {
    if !bytes.starts_with(&WIRE_MAGIC) {
        return Err(CodecError::Decode("not an encoded message".to_string()));
    }
    let wire: WireMessage = wire_options().deserialize(bytes)?;
    if wire.version != WIRE_VERSION {
        return Err(CodecError::Decode(format!(
            "unsupported wire version {} (expected {})",
            wire.version, WIRE_VERSION
        )));
    }
    Ok(wire)
}

/// Type tag and kind of an encoded message, without decoding its fields.
pub fn peek(bytes: &[u8]) -> Result<(String, MessageKind), CodecError> {
    let wire = decode_wire(bytes)?;
    Ok((wire.type_tag, wire.kind))
}

/// Collects flagged fields while a message encodes itself.
#[derive(Debug)]
pub struct FieldWriter {
    compress_images: bool,
    fields: Vec<WireField>,
}

impl FieldWriter {
    pub(crate) fn new(compress_images: bool) -> Self {
        Self {
            compress_images,
            fields: Vec::new(),
        }
    }

    fn push(&mut self, name: &str, encoding: FieldEncoding, bytes: Vec<u8>) -> &mut Self {
        self.fields.push(WireField {
            name: name.to_string(),
            encoding,
            bytes,
        });
        self
    }

    /// Any serde value.
    pub fn plain<T: Serialize + ?Sized>(
        &mut self,
        name: &str,
        value: &T,
    ) -> Result<&mut Self, CodecError> {
        let bytes = wire_options()
            .serialize(value)
            .map_err(|e| CodecError::Encode(format!("field {name}: {e}")))?;
        Ok(self.push(name, FieldEncoding::Plain, bytes))
    }

    /// A numeric array, JPEG-compressed when the message type asks for it
    /// and the array is a non-empty colour image within JPEG limits.
    pub fn array(&mut self, name: &str, value: &NdArray) -> Result<&mut Self, CodecError> {
        if self.compress_images && jpeg::is_encodable(value) {
            let bytes = jpeg::encode_jpeg(value)?;
            return Ok(self.push(name, FieldEncoding::Image, bytes));
        }
        Ok(self.push(name, FieldEncoding::Array, value.to_bytes()))
    }

    /// A nested message.
    pub fn nested(&mut self, name: &str, value: &dyn Message) -> Result<&mut Self, CodecError> {
        let bytes = encode(value)?;
        Ok(self.push(name, FieldEncoding::Nested, bytes))
    }

    /// A nested message that may be absent. Absent fields are not written.
    pub fn nested_opt(
        &mut self,
        name: &str,
        value: Option<&dyn Message>,
    ) -> Result<&mut Self, CodecError> {
        match value {
            Some(message) => self.nested(name, message),
            None => Ok(self),
        }
    }
}

/// Hands flagged fields back to a decoding message.
#[derive(Debug)]
pub struct FieldReader<'a> {
    registry: &'a MessageRegistry,
    type_tag: String,
    fields: Vec<WireField>,
}

impl<'a> FieldReader<'a> {
    pub(crate) fn new(registry: &'a MessageRegistry, type_tag: String, fields: Vec<WireField>) -> Self {
        Self {
            registry,
            type_tag,
            fields,
        }
    }

    /// Whether a field with this name is present.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    fn take(&mut self, name: &str) -> Result<WireField, CodecError> {
        let index = self
            .fields
            .iter()
            .position(|f| f.name == name)
            .ok_or_else(|| {
                CodecError::Decode(format!("{} is missing field {}", self.type_tag, name))
            })?;
        Ok(self.fields.remove(index))
    }

    fn mismatch(&self, field: &WireField, expected: &str) -> CodecError {
        CodecError::mismatch(
            format!("{} field {} as {}", self.type_tag, field.name, expected),
            format!("{:?}", field.encoding),
        )
    }

    pub fn plain<T: DeserializeOwned>(&mut self, name: &str) -> Result<T, CodecError> {
        let field = self.take(name)?;
        if field.encoding != FieldEncoding::Plain {
            return Err(self.mismatch(&field, "Plain"));
        }
        wire_options()
            .deserialize(&field.bytes)
            .map_err(|e| CodecError::Decode(format!("{} field {}: {}", self.type_tag, name, e)))
    }

    /// Reconstruct an array written by [`FieldWriter::array`], lossless or
    /// lossy.
    pub fn array(&mut self, name: &str) -> Result<NdArray, CodecError> {
        let field = self.take(name)?;
        match field.encoding {
            FieldEncoding::Array => NdArray::from_bytes(&field.bytes),
            FieldEncoding::Image => jpeg::decode_jpeg(&field.bytes),
            _ => Err(self.mismatch(&field, "Array")),
        }
    }

    pub fn nested(&mut self, name: &str) -> Result<Box<dyn Message>, CodecError> {
        let field = self.take(name)?;
        if field.encoding != FieldEncoding::Nested {
            return Err(self.mismatch(&field, "Nested"));
        }
        self.registry.decode(&field.bytes)
    }

    pub fn nested_opt(&mut self, name: &str) -> Result<Option<Box<dyn Message>>, CodecError> {
        if !self.has(name) {
            return Ok(None);
        }
        self.nested(name).map(Some)
    }

    pub fn nested_as<M: TypedMessage>(&mut self, name: &str) -> Result<M, CodecError> {
        self.nested(name)?.downcast::<M>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PingRequest, TextMessage};

    #[test]
    fn test_encoded_bytes_start_with_magic() {
        let bytes = encode(&TextMessage::new("hi".into())).unwrap();
        assert!(bytes.starts_with(&WIRE_MAGIC));
    }

    #[test]
    fn test_peek_reports_tag_and_kind() {
        let bytes = encode(&PingRequest::default()).unwrap();
        let (tag, kind) = peek(&bytes).unwrap();
        assert_eq!(tag, "PingRequest");
        assert_eq!(kind, MessageKind::ControlRequest);
    }

    #[test]
    fn test_garbage_is_decode_error() {
        assert!(matches!(
            decode_wire(b"definitely not a message"),
            Err(CodecError::Decode(_))
        ));
        assert!(matches!(
            decode_wire(b"SICM\xff\xff\xff"),
            Err(CodecError::Decode(_))
        ));
        assert!(matches!(decode_wire(&[]), Err(CodecError::Decode(_))));
    }

    #[test]
    fn test_truncated_message_is_decode_error() {
        let bytes = encode(&TextMessage::new("truncate me".into())).unwrap();
        assert!(matches!(
            decode_wire(&bytes[..bytes.len() - 3]),
            Err(CodecError::Decode(_))
        ));
    }
}
