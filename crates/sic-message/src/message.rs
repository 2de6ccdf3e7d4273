//! # Message Model
//!
//! A message is a [`Header`] plus payload fields. Concrete message types are
//! built by composition: a payload struct implementing [`Payload`] is
//! embedded by value in an [`Envelope`], whose second parameter is the kind
//! marker. [`message_types!`](crate::message_types) binds a payload/kind pair
//! to a type tag and a type alias:
//!
//! ```rust,ignore
//! #[derive(Debug, Clone, Default)]
//! pub struct Text { pub text: String }
//! payload_fields!(Text { text });
//!
//! message_types! {
//!     pub TextMessage = Text as Data;
//!     pub TextRequest = Text as Request;
//! }
//! ```
//!
//! Type identity across processes is the tag string, never the Rust type.

use crate::codec::{FieldReader, FieldWriter};
use crate::error::CodecError;
use crate::header::{Header, RequestId};
use crate::kind::{Kind, MessageKind};
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

/// Object-safe view of any message.
pub trait Message: Any + Send + Sync + fmt::Debug {
    /// Cross-process type identity.
    fn type_tag(&self) -> &'static str;

    fn kind(&self) -> MessageKind;

    fn header(&self) -> &Header;

    fn header_mut(&mut self) -> &mut Header;

    /// Whether `[h, w, 3]` u8 arrays of this type are sent as JPEG.
    fn compress_images(&self) -> bool {
        false
    }

    /// Write payload fields in declaration order.
    fn encode_fields(&self, out: &mut FieldWriter) -> Result<(), CodecError>;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;

    fn clone_boxed(&self) -> Box<dyn Message>;
}

/// A concrete message type that a registry can decode.
pub trait TypedMessage: Message + Clone + Sized {
    const TYPE_TAG: &'static str;
    const KIND: MessageKind;

    fn decode_fields(header: Header, fields: &mut FieldReader<'_>) -> Result<Self, CodecError>;
}

/// Payload fields of a message.
pub trait Payload: fmt::Debug + Clone + Send + Sync + 'static {
    /// Enables lossy JPEG for colour image arrays.
    const COMPRESS_IMAGES: bool = false;

    fn write_fields(&self, out: &mut FieldWriter) -> Result<(), CodecError>;

    fn read_fields(fields: &mut FieldReader<'_>) -> Result<Self, CodecError>;
}

/// Binds a payload used with kind `K` to its type tag.
pub trait Tagged<K: Kind>: Payload {
    const TAG: &'static str;
}

/// A payload embedded in a message of kind `K`.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope<P, K> {
    pub header: Header,
    pub payload: P,
    kind: PhantomData<K>,
}

impl<P: Tagged<K>, K: Kind> Envelope<P, K> {
    /// Wrap a payload. Request kinds receive a fresh correlation id.
    #[must_use]
    pub fn new(payload: P) -> Self {
        let request_id = K::KIND.is_request().then(RequestId::new);
        Self {
            header: Header {
                request_id,
                ..Header::default()
            },
            payload,
            kind: PhantomData,
        }
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.header.timestamp = Some(timestamp);
        self
    }

    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.header.origin = Some(origin.into());
        self
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.header.request_id = Some(request_id);
        self
    }

    pub fn into_payload(self) -> P {
        self.payload
    }

    #[must_use]
    pub fn boxed(self) -> Box<dyn Message> {
        Box::new(self)
    }
}

impl<P: Tagged<K> + Default, K: Kind> Default for Envelope<P, K> {
    fn default() -> Self {
        Self::new(P::default())
    }
}

impl<P, K> Deref for Envelope<P, K> {
    type Target = P;

    fn deref(&self) -> &P {
        &self.payload
    }
}

impl<P, K> DerefMut for Envelope<P, K> {
    fn deref_mut(&mut self) -> &mut P {
        &mut self.payload
    }
}

impl<P: Tagged<K>, K: Kind> Message for Envelope<P, K> {
    fn type_tag(&self) -> &'static str {
        <P as Tagged<K>>::TAG
    }

    fn kind(&self) -> MessageKind {
        K::KIND
    }

    fn header(&self) -> &Header {
        &self.header
    }

    fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    fn compress_images(&self) -> bool {
        P::COMPRESS_IMAGES
    }

    fn encode_fields(&self, out: &mut FieldWriter) -> Result<(), CodecError> {
        self.payload.write_fields(out)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }

    fn clone_boxed(&self) -> Box<dyn Message> {
        Box::new(self.clone())
    }
}

impl<P: Tagged<K>, K: Kind> TypedMessage for Envelope<P, K> {
    const TYPE_TAG: &'static str = <P as Tagged<K>>::TAG;
    const KIND: MessageKind = K::KIND;

    fn decode_fields(header: Header, fields: &mut FieldReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            header,
            payload: P::read_fields(fields)?,
            kind: PhantomData,
        })
    }
}

impl dyn Message {
    /// Tag comparison against a concrete type.
    pub fn is<M: TypedMessage>(&self) -> bool {
        self.type_tag() == M::TYPE_TAG
    }

    pub fn downcast_ref<M: TypedMessage>(&self) -> Option<&M> {
        self.as_any().downcast_ref::<M>()
    }

    pub fn downcast<M: TypedMessage>(self: Box<Self>) -> Result<M, CodecError> {
        let found = self.type_tag();
        self.into_any()
            .downcast::<M>()
            .map(|message| *message)
            .map_err(|_| CodecError::mismatch(M::TYPE_TAG, found))
    }

    pub fn is_request(&self) -> bool {
        self.kind().is_request()
    }

    pub fn timestamp(&self) -> Option<f64> {
        self.header().timestamp
    }

    pub fn origin(&self) -> Option<&str> {
        self.header().origin.as_deref()
    }

    pub fn request_id(&self) -> Option<RequestId> {
        self.header().request_id
    }
}

impl Clone for Box<dyn Message> {
    fn clone(&self) -> Self {
        self.clone_boxed()
    }
}

/// Implement [`Payload`] for a struct whose fields are all plain serde values.
#[macro_export]
macro_rules! payload_fields {
    ($payload:ty { $($field:ident),* $(,)? }) => {
        impl $crate::Payload for $payload {
            #[allow(unused_variables)]
            fn write_fields(
                &self,
                out: &mut $crate::FieldWriter,
            ) -> ::std::result::Result<(), $crate::CodecError> {
                $( out.plain(stringify!($field), &self.$field)?; )*
                Ok(())
            }

            #[allow(unused_variables)]
            fn read_fields(
                fields: &mut $crate::FieldReader<'_>,
            ) -> ::std::result::Result<Self, $crate::CodecError> {
                Ok(Self {
                    $( $field: fields.plain(stringify!($field))?, )*
                })
            }
        }
    };
}

/// Declare message types as payload/kind pairs tagged with the alias name.
#[macro_export]
macro_rules! message_types {
    ($( $(#[$doc:meta])* $vis:vis $alias:ident = $payload:ty as $kind:ident; )*) => {
        $(
            impl $crate::Tagged<$crate::kind::$kind> for $payload {
                const TAG: &'static str = stringify!($alias);
            }

            $(#[$doc])*
            $vis type $alias = $crate::Envelope<$payload, $crate::kind::$kind>;
        )*
    };
}
