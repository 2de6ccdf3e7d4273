//! Common payloads shared by device and service components.

use crate::array::NdArray;
use crate::codec::{FieldReader, FieldWriter};
use crate::error::CodecError;
use crate::message::Payload;
use crate::{message_types, payload_fields};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Text {
    pub text: String,
}
payload_fields!(Text { text });

impl From<&str> for Text {
    fn from(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

impl From<String> for Text {
    fn from(text: String) -> Self {
        Self { text }
    }
}

/// Raw PCM audio, 16-bit signed little-endian samples.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Audio {
    pub waveform: Vec<u8>,
    pub sample_rate: u32,
}
payload_fields!(Audio {
    waveform,
    sample_rate
});

/// Colour image sent as JPEG.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressedImage {
    /// `[h, w, 3]` u8 array.
    pub image: NdArray,
}

impl Payload for CompressedImage {
    const COMPRESS_IMAGES: bool = true;

    fn write_fields(&self, out: &mut FieldWriter) -> Result<(), CodecError> {
        out.array("image", &self.image)?;
        Ok(())
    }

    fn read_fields(fields: &mut FieldReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            image: fields.array("image")?,
        })
    }
}

/// Image or any other array sent losslessly.
#[derive(Debug, Clone, PartialEq)]
pub struct UncompressedImage {
    pub image: NdArray,
}

impl Payload for UncompressedImage {
    fn write_fields(&self, out: &mut FieldWriter) -> Result<(), CodecError> {
        out.array("image", &self.image)?;
        Ok(())
    }

    fn read_fields(fields: &mut FieldReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            image: fields.array("image")?,
        })
    }
}

/// A detection: `(x, y)` is the top-left pixel, `(w, h)` the size.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
    pub identifier: Option<String>,
    pub confidence: Option<f32>,
}

impl BoundingBox {
    #[must_use]
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self {
            x,
            y,
            w,
            h,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn xywh(&self) -> [i32; 4] {
        [self.x, self.y, self.w, self.h]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundingBoxes {
    pub bboxes: Vec<BoundingBox>,
}
payload_fields!(BoundingBoxes { bboxes });

/// One formatted diagnostic line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Log {
    pub msg: String,
}
payload_fields!(Log { msg });

/// Configuration payload for components without configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Empty;
payload_fields!(Empty {});

message_types! {
    pub TextMessage = Text as Data;
    pub TextRequest = Text as Request;
    pub AudioMessage = Audio as Data;
    pub AudioRequest = Audio as Request;
    pub CompressedImageMessage = CompressedImage as Data;
    pub CompressedImageRequest = CompressedImage as Request;
    pub UncompressedImageMessage = UncompressedImage as Data;
    pub BoundingBoxesMessage = BoundingBoxes as Data;
    /// Broadcast on the shared logging channel.
    pub LogMessage = Log as Data;
    pub NoConf = Empty as Conf;
}
