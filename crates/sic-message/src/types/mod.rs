//! Built-in message types.

mod common;
mod control;

pub use common::{
    Audio, AudioMessage, AudioRequest, BoundingBox, BoundingBoxes, BoundingBoxesMessage,
    CompressedImage, CompressedImageMessage, CompressedImageRequest, Empty, Log, LogMessage,
    NoConf, Text, TextMessage, TextRequest, UncompressedImage, UncompressedImageMessage,
};
pub use control::{
    Connect, ConnectRequest, Ignored, IgnoredMessage, NotStarted, NotStartedMessage, Ping,
    PingRequest, Pong, PongMessage, StartComponent, StartComponentRequest, Stop, StopRequest,
    Success, SuccessMessage,
};

use crate::registry::MessageRegistry;

pub(crate) fn register_core_types(registry: &mut MessageRegistry) {
    registry
        .register::<PingRequest>()
        .register::<PongMessage>()
        .register::<SuccessMessage>()
        .register::<StopRequest>()
        .register::<IgnoredMessage>()
        .register::<ConnectRequest>()
        .register::<StartComponentRequest>()
        .register::<NotStartedMessage>()
        .register::<TextMessage>()
        .register::<TextRequest>()
        .register::<AudioMessage>()
        .register::<AudioRequest>()
        .register::<CompressedImageMessage>()
        .register::<CompressedImageRequest>()
        .register::<UncompressedImageMessage>()
        .register::<BoundingBoxesMessage>()
        .register::<LogMessage>()
        .register::<NoConf>();
}
