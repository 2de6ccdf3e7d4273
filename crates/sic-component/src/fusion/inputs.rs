//! Input declarations and fused tuples.

use sic_message::{Message, TypedMessage};
use std::fmt;

/// One declared service input: a message type, optionally pinned to the
/// component that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InputSpec {
    pub type_tag: &'static str,
    pub origin: Option<String>,
}

impl InputSpec {
    /// Accept `M` from any producer.
    #[must_use]
    pub fn of<M: TypedMessage>() -> Self {
        Self {
            type_tag: M::TYPE_TAG,
            origin: None,
        }
    }

    /// Accept only messages whose origin is `component`.
    #[must_use]
    pub fn from_component(mut self, component: impl Into<String>) -> Self {
        self.origin = Some(component.into());
        self
    }

    #[must_use]
    pub fn is_keyed(&self) -> bool {
        self.origin.is_some()
    }
}

impl fmt::Display for InputSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.origin {
            Some(origin) => write!(f, "{} from {}", self.type_tag, origin),
            None => f.write_str(self.type_tag),
        }
    }
}

/// Messages selected together by one alignment, plus the candidate
/// timestamp they were aligned on.
#[derive(Debug, Clone)]
pub struct FusedInputs {
    timestamp: f64,
    messages: Vec<Box<dyn Message>>,
}

impl FusedInputs {
    pub(crate) fn new(timestamp: f64, messages: Vec<Box<dyn Message>>) -> Self {
        Self {
            timestamp,
            messages,
        }
    }

    #[must_use]
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Message> {
        self.messages.iter().map(|m| m.as_ref())
    }

    /// First fused message of type `M`.
    #[must_use]
    pub fn get<M: TypedMessage>(&self) -> Option<&M> {
        self.iter().find_map(|m| m.downcast_ref::<M>())
    }

    /// Fused message of type `M` produced by `origin`.
    #[must_use]
    pub fn get_from<M: TypedMessage>(&self, origin: &str) -> Option<&M> {
        self.iter()
            .filter(|m| m.origin() == Some(origin))
            .find_map(|m| m.downcast_ref::<M>())
    }

    /// Every fused message of type `M`, one per producer.
    #[must_use]
    pub fn all<M: TypedMessage>(&self) -> Vec<&M> {
        self.iter().filter_map(|m| m.downcast_ref::<M>()).collect()
    }

    #[must_use]
    pub fn into_messages(self) -> Vec<Box<dyn Message>> {
        self.messages
    }
}
