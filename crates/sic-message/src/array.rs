//! # Dense Numeric Arrays
//!
//! `NdArray` holds a contiguous little-endian buffer with a dtype and a
//! shape. Its lossless binary form is:
//!
//! ```text
//! ┌───────┬──────────┬─────────────────┬──────────────┐
//! │ dtype │ ndim u32 │ dims u64 × ndim │ element data │
//! └───────┴──────────┴─────────────────┴──────────────┘
//! ```
//!
//! All integers are little-endian. The element data length must equal the
//! product of the dims times the dtype size.

use crate::error::CodecError;
use serde::{Deserialize, Serialize};

/// Element type of an [`NdArray`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
}

impl DType {
    const ALL: [DType; 10] = [
        DType::U8,
        DType::I8,
        DType::U16,
        DType::I16,
        DType::U32,
        DType::I32,
        DType::U64,
        DType::I64,
        DType::F32,
        DType::F64,
    ];

    /// Size of one element in bytes.
    #[must_use]
    pub fn size(self) -> usize {
        match self {
            DType::U8 | DType::I8 => 1,
            DType::U16 | DType::I16 => 2,
            DType::U32 | DType::I32 | DType::F32 => 4,
            DType::U64 | DType::I64 | DType::F64 => 8,
        }
    }

    fn code(self) -> u8 {
        self as u8
    }

    fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.code() == code)
    }
}

/// Rust scalar types that can be stored in an [`NdArray`].
pub trait Element: Copy + Send + Sync + 'static {
    const DTYPE: DType;

    fn write_le(self, out: &mut Vec<u8>);

    /// `bytes` is exactly `DTYPE.size()` long.
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_element {
    ($($ty:ty => $dtype:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const DTYPE: DType = DType::$dtype;

                fn write_le(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }

                fn read_le(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    <$ty>::from_le_bytes(raw)
                }
            }
        )*
    };
}

impl_element! {
    u8 => U8, i8 => I8, u16 => U16, i16 => I16, u32 => U32,
    i32 => I32, u64 => U64, i64 => I64, f32 => F32, f64 => F64,
}

/// Dense n-dimensional numeric array.
#[derive(Debug, Clone, PartialEq)]
pub struct NdArray {
    dtype: DType,
    shape: Vec<usize>,
    data: Vec<u8>,
}

impl NdArray {
    /// Build an array from typed values in row-major order.
    pub fn from_vec<T: Element>(shape: Vec<usize>, values: Vec<T>) -> Result<Self, CodecError> {
        let expected = element_count(&shape)?;
        if values.len() != expected {
            return Err(CodecError::mismatch(
                format!("{expected} elements for shape {shape:?}"),
                format!("{} elements", values.len()),
            ));
        }
        let mut data = Vec::with_capacity(expected * T::DTYPE.size());
        for value in values {
            value.write_le(&mut data);
        }
        Ok(Self {
            dtype: T::DTYPE,
            shape,
            data,
        })
    }

    /// Build an array from an already little-endian buffer.
    pub fn from_raw(dtype: DType, shape: Vec<usize>, data: Vec<u8>) -> Result<Self, CodecError> {
        let expected = element_count(&shape)?
            .checked_mul(dtype.size())
            .ok_or_else(|| CodecError::Decode(format!("array shape {shape:?} overflows")))?;
        if data.len() != expected {
            return Err(CodecError::mismatch(
                format!("{expected} bytes for {dtype:?} {shape:?}"),
                format!("{} bytes", data.len()),
            ));
        }
        Ok(Self { dtype, shape, data })
    }

    /// Zero-filled array.
    pub fn zeros(dtype: DType, shape: Vec<usize>) -> Result<Self, CodecError> {
        let len = element_count(&shape)? * dtype.size();
        Self::from_raw(dtype, shape, vec![0; len])
    }

    #[must_use]
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len() / self.dtype.size()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw little-endian element bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Typed copy of the elements.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>, CodecError> {
        if self.dtype != T::DTYPE {
            return Err(CodecError::mismatch(
                format!("{:?}", T::DTYPE),
                format!("{:?}", self.dtype),
            ));
        }
        Ok(self
            .data
            .chunks_exact(self.dtype.size())
            .map(T::read_le)
            .collect())
    }

    /// Whether this array is an 8-bit colour image laid out `[h, w, 3]`.
    #[must_use]
    pub fn is_rgb_image(&self) -> bool {
        self.dtype == DType::U8 && self.shape.len() == 3 && self.shape[2] == 3
    }

    /// Lossless binary form.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(5 + self.shape.len() * 8 + self.data.len());
        out.push(self.dtype.code());
        out.extend_from_slice(&(self.shape.len() as u32).to_le_bytes());
        for dim in &self.shape {
            out.extend_from_slice(&(*dim as u64).to_le_bytes());
        }
        out.extend_from_slice(&self.data);
        out
    }

    /// Parse the lossless binary form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let (&code, rest) = bytes
            .split_first()
            .ok_or_else(|| CodecError::Decode("empty array field".to_string()))?;
        let dtype = DType::from_code(code)
            .ok_or_else(|| CodecError::Decode(format!("unknown array dtype code {code}")))?;

        let (ndim, mut rest) = take_u32(rest)?;
        let mut shape = Vec::with_capacity((ndim as usize).min(32));
        for _ in 0..ndim {
            let (dim, tail) = take_u64(rest)?;
            let dim = usize::try_from(dim)
                .map_err(|_| CodecError::Decode(format!("array dim {dim} too large")))?;
            shape.push(dim);
            rest = tail;
        }

        Self::from_raw(dtype, shape, rest.to_vec())
    }
}

fn element_count(shape: &[usize]) -> Result<usize, CodecError> {
    shape
        .iter()
        .try_fold(1usize, |acc, dim| acc.checked_mul(*dim))
        .ok_or_else(|| CodecError::Decode(format!("array shape {shape:?} overflows")))
}

fn take_u32(bytes: &[u8]) -> Result<(u32, &[u8]), CodecError> {
    if bytes.len() < 4 {
        return Err(CodecError::Decode("truncated array header".to_string()));
    }
    let (head, tail) = bytes.split_at(4);
    let mut raw = [0u8; 4];
    raw.copy_from_slice(head);
    Ok((u32::from_le_bytes(raw), tail))
}

fn take_u64(bytes: &[u8]) -> Result<(u64, &[u8]), CodecError> {
    if bytes.len() < 8 {
        return Err(CodecError::Decode("truncated array shape".to_string()));
    }
    let (head, tail) = bytes.split_at(8);
    let mut raw = [0u8; 8];
    raw.copy_from_slice(head);
    Ok((u64::from_le_bytes(raw), tail))
}
