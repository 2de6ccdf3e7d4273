//! Lossy image fields.
//!
//! A `[h, w, 3]` u8 array is stored as an 8-byte shape prefix (`h`, `w` as
//! little-endian u32) followed by a baseline JPEG.

use crate::array::{DType, NdArray};
use crate::error::CodecError;
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageFormat};

/// JPEG quality used for compressed image fields.
pub const JPEG_QUALITY: u8 = 85;

/// Largest height or width a baseline JPEG can carry.
const MAX_DIMENSION: usize = 65535;

/// Whether `array` is a colour image the JPEG path can carry. Other
/// arrays, including empty images, stay lossless.
pub(crate) fn is_encodable(array: &NdArray) -> bool {
    array.is_rgb_image()
        && array.shape()[..2]
            .iter()
            .all(|&d| (1..=MAX_DIMENSION).contains(&d))
}

pub(crate) fn encode_jpeg(array: &NdArray) -> Result<Vec<u8>, CodecError> {
    if !array.is_rgb_image() {
        return Err(CodecError::mismatch(
            "u8 array [h, w, 3]",
            format!("{:?} {:?}", array.dtype(), array.shape()),
        ));
    }
    let height = dimension(array.shape()[0])?;
    let width = dimension(array.shape()[1])?;

    let mut out = Vec::with_capacity(8 + array.as_bytes().len() / 8);
    out.extend_from_slice(&height.to_le_bytes());
    out.extend_from_slice(&width.to_le_bytes());
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
        .write_image(array.as_bytes(), width, height, ExtendedColorType::Rgb8)
        .map_err(|e| CodecError::Encode(format!("jpeg: {e}")))?;
    Ok(out)
}

pub(crate) fn decode_jpeg(bytes: &[u8]) -> Result<NdArray, CodecError> {
    if bytes.len() < 8 {
        return Err(CodecError::Decode("truncated image field".to_string()));
    }
    let (prefix, jpeg) = bytes.split_at(8);
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&prefix[..4]);
    let height = u32::from_le_bytes(raw);
    raw.copy_from_slice(&prefix[4..]);
    let width = u32::from_le_bytes(raw);

    let decoded = image::load_from_memory_with_format(jpeg, ImageFormat::Jpeg)
        .map_err(|e| CodecError::Decode(format!("jpeg: {e}")))?
        .to_rgb8();
    let (decoded_width, decoded_height) = decoded.dimensions();
    if (decoded_height, decoded_width) != (height, width) {
        return Err(CodecError::mismatch(
            format!("image [{height}, {width}, 3]"),
            format!("image [{decoded_height}, {decoded_width}, 3]"),
        ));
    }

    NdArray::from_raw(
        DType::U8,
        vec![height as usize, width as usize, 3],
        decoded.into_raw(),
    )
}

fn dimension(value: usize) -> Result<u32, CodecError> {
    if !(1..=MAX_DIMENSION).contains(&value) {
        return Err(CodecError::Encode(format!(
            "image dimension {value} outside 1..={MAX_DIMENSION}"
        )));
    }
    u32::try_from(value).map_err(|_| CodecError::Encode(format!("image dimension {value} too large")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(height: usize, width: usize) -> NdArray {
        let mut pixels = Vec::with_capacity(height * width * 3);
        for y in 0..height {
            for x in 0..width {
                pixels.push((x * 255 / width.max(1)) as u8);
                pixels.push((y * 255 / height.max(1)) as u8);
                pixels.push(128);
            }
        }
        NdArray::from_vec(vec![height, width, 3], pixels).unwrap()
    }

    #[test]
    fn test_jpeg_preserves_shape() {
        let image = gradient(24, 40);
        let encoded = encode_jpeg(&image).unwrap();
        let decoded = decode_jpeg(&encoded).unwrap();

        assert_eq!(decoded.shape(), &[24, 40, 3]);
        assert_eq!(decoded.dtype(), DType::U8);
    }

    #[test]
    fn test_jpeg_is_close_to_source() {
        let image = gradient(16, 16);
        let decoded = decode_jpeg(&encode_jpeg(&image).unwrap()).unwrap();

        let source = image.to_vec::<u8>().unwrap();
        let lossy = decoded.to_vec::<u8>().unwrap();
        let mean_error: f64 = source
            .iter()
            .zip(&lossy)
            .map(|(a, b)| (f64::from(*a) - f64::from(*b)).abs())
            .sum::<f64>()
            / source.len() as f64;
        assert!(mean_error < 16.0, "mean error {mean_error}");
    }

    #[test]
    fn test_non_image_rejected() {
        let array = NdArray::zeros(DType::U8, vec![4, 4, 4]).unwrap();
        assert!(matches!(
            encode_jpeg(&array),
            Err(CodecError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_encodable_dimensions() {
        let image = |shape: Vec<usize>| NdArray::zeros(DType::U8, shape).unwrap();
        assert!(is_encodable(&image(vec![1, 1, 3])));
        assert!(is_encodable(&image(vec![1, 65535, 3])));
        assert!(!is_encodable(&image(vec![0, 4, 3])));
        assert!(!is_encodable(&image(vec![4, 0, 3])));
        assert!(!is_encodable(&image(vec![1, 65536, 3])));
    }

    #[test]
    fn test_empty_image_rejected() {
        let array = NdArray::zeros(DType::U8, vec![0, 4, 3]).unwrap();
        assert!(matches!(encode_jpeg(&array), Err(CodecError::Encode(_))));
    }

    #[test]
    fn test_truncated_prefix_rejected() {
        let encoded = encode_jpeg(&gradient(8, 8)).unwrap();
        for len in 0..8 {
            assert!(matches!(
                decode_jpeg(&encoded[..len]),
                Err(CodecError::Decode(_))
            ));
        }
    }

    #[test]
    fn test_shape_prefix_mismatch() {
        let mut encoded = encode_jpeg(&gradient(8, 8)).unwrap();
        encoded[0] = 9;
        assert!(matches!(
            decode_jpeg(&encoded),
            Err(CodecError::TypeMismatch { .. })
        ));
    }
}
