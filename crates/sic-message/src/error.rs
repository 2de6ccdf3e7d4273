//! Codec errors.

use thiserror::Error;

/// Errors produced while encoding or decoding messages.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The payload is not a recognised encoded message.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The receiver has no decoder registered for this type tag.
    #[error("No message type registered for tag {0:?}")]
    MissingType(String),

    /// A field or message had a different type or shape than required.
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// A field could not be encoded.
    #[error("Encode error: {0}")]
    Encode(String),
}

impl CodecError {
    pub(crate) fn mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }
}

impl From<bincode::Error> for CodecError {
    fn from(err: bincode::Error) -> Self {
        CodecError::Decode(err.to_string())
    }
}
