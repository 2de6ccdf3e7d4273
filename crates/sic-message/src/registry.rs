//! # Message Registry
//!
//! Maps type tags to decoders on the receiving side. A registry is an
//! explicit value owned by whoever builds the bus; there is no process-wide
//! table. Unknown tags fail with [`CodecError::MissingType`].

use crate::codec::{self, FieldReader};
use crate::error::CodecError;
use crate::header::Header;
use crate::kind::MessageKind;
use crate::message::{Message, TypedMessage};
use crate::types;
use std::collections::HashMap;
use std::fmt;

type DecodeFn = fn(Header, &mut FieldReader<'_>) -> Result<Box<dyn Message>, CodecError>;

#[derive(Clone, Copy)]
struct Entry {
    kind: MessageKind,
    decode: DecodeFn,
}

fn decode_boxed<M: TypedMessage>(
    header: Header,
    fields: &mut FieldReader<'_>,
) -> Result<Box<dyn Message>, CodecError> {
    Ok(Box::new(M::decode_fields(header, fields)?))
}

/// Tag-to-decoder table.
#[derive(Clone, Default)]
pub struct MessageRegistry {
    entries: HashMap<&'static str, Entry>,
}

impl MessageRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every framework and common message type registered.
    #[must_use]
    pub fn with_core_types() -> Self {
        let mut registry = Self::new();
        types::register_core_types(&mut registry);
        registry
    }

    /// Register a concrete type under its tag, replacing any previous
    /// decoder for the same tag.
    pub fn register<M: TypedMessage>(&mut self) -> &mut Self {
        self.entries.insert(
            M::TYPE_TAG,
            Entry {
                kind: M::KIND,
                decode: decode_boxed::<M>,
            },
        );
        self
    }

    #[must_use]
    pub fn contains(&self, type_tag: &str) -> bool {
        self.entries.contains_key(type_tag)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered tags in sorted order.
    #[must_use]
    pub fn tags(&self) -> Vec<&'static str> {
        let mut tags: Vec<_> = self.entries.keys().copied().collect();
        tags.sort_unstable();
        tags
    }

    /// Decode wire bytes into the registered concrete type.
    pub fn decode(&self, bytes: &[u8]) -> Result<Box<dyn Message>, CodecError> {
        let wire = codec::decode_wire(bytes)?;
        let entry = self
            .entries
            .get(wire.type_tag.as_str())
            .copied()
            .ok_or_else(|| CodecError::MissingType(wire.type_tag.clone()))?;
        if entry.kind != wire.kind {
            return Err(CodecError::mismatch(
                format!("{} as {}", wire.type_tag, entry.kind),
                wire.kind.to_string(),
            ));
        }

        let mut fields = FieldReader::new(self, wire.type_tag, wire.fields);
        (entry.decode)(wire.header, &mut fields)
    }

    /// Decode and require a specific type.
    pub fn decode_as<M: TypedMessage>(&self, bytes: &[u8]) -> Result<M, CodecError> {
        self.decode(bytes)?.downcast::<M>()
    }
}

impl fmt::Debug for MessageRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageRegistry")
            .field("tags", &self.tags())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode;
    use crate::types::{PingRequest, PongMessage, TextMessage, TextRequest};

    #[test]
    fn test_core_types_registered() {
        let registry = MessageRegistry::with_core_types();
        for tag in ["PingRequest", "PongMessage", "StartComponentRequest", "TextMessage"] {
            assert!(registry.contains(tag), "{tag} missing");
        }
    }

    #[test]
    fn test_missing_type() {
        let registry = MessageRegistry::new();
        let bytes = encode(&PongMessage::default()).unwrap();
        assert_eq!(
            registry.decode(&bytes).unwrap_err(),
            CodecError::MissingType("PongMessage".to_string())
        );
    }

    #[test]
    fn test_decode_as_wrong_type() {
        let registry = MessageRegistry::with_core_types();
        let bytes = encode(&PingRequest::default()).unwrap();
        assert!(matches!(
            registry.decode_as::<PongMessage>(&bytes),
            Err(CodecError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_same_payload_different_kinds_are_distinct() {
        let registry = MessageRegistry::with_core_types();
        let data = registry
            .decode(&encode(&TextMessage::new("a".into())).unwrap())
            .unwrap();
        let request = registry
            .decode(&encode(&TextRequest::new("a".into())).unwrap())
            .unwrap();

        assert!(data.is::<TextMessage>());
        assert!(!data.is_request());
        assert!(request.is::<TextRequest>());
        assert!(request.is_request());
    }

    #[test]
    fn test_user_registration() {
        let mut registry = MessageRegistry::new();
        registry.register::<TextMessage>();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.tags(), vec!["TextMessage"]);
    }
}
