//! Pixel scalar types.

use crate::tile::SampleBuffer;
use num_traits::{Bounded, NumCast};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The scalar type of a tile's samples.
///
/// `UInt11` is an 11-bit quantity stored in 16-bit words, common for
/// satellite sensors; it only differs from `UInt16` in its valid range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    #[default]
    Unknown,
    UInt8,
    Int8,
    UInt11,
    UInt16,
    Int16,
    UInt32,
    Int32,
    UInt64,
    Int64,
    Float32,
    Float64,
}

impl ScalarType {
    /// Size of one sample in bytes. Unknown types report zero.
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            Self::Unknown => 0,
            Self::UInt8 | Self::Int8 => 1,
            Self::UInt11 | Self::UInt16 | Self::Int16 => 2,
            Self::UInt32 | Self::Int32 | Self::Float32 => 4,
            Self::UInt64 | Self::Int64 | Self::Float64 => 8,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    /// Default null pixel value. Integer types reserve their lowest value,
    /// floating point types use NaN.
    pub fn default_null(&self) -> f64 {
        match self {
            Self::Unknown => 0.0,
            Self::UInt8 | Self::UInt11 | Self::UInt16 | Self::UInt32 | Self::UInt64 => 0.0,
            Self::Int8 => i8::MIN as f64,
            Self::Int16 => i16::MIN as f64,
            Self::Int32 => i32::MIN as f64,
            Self::Int64 => i64::MIN as f64,
            Self::Float32 | Self::Float64 => f64::NAN,
        }
    }

    /// Default minimum valid pixel value (one above the integer null).
    pub fn default_min(&self) -> f64 {
        match self {
            Self::Unknown => 0.0,
            Self::UInt8 | Self::UInt11 | Self::UInt16 | Self::UInt32 | Self::UInt64 => 1.0,
            Self::Int8 => i8::MIN as f64 + 1.0,
            Self::Int16 => i16::MIN as f64 + 1.0,
            Self::Int32 => i32::MIN as f64 + 1.0,
            Self::Int64 => i64::MIN as f64 + 1.0,
            Self::Float32 => -(f32::MAX as f64),
            Self::Float64 => -f64::MAX,
        }
    }

    /// Default maximum valid pixel value.
    pub fn default_max(&self) -> f64 {
        match self {
            Self::Unknown => 0.0,
            Self::UInt8 => u8::MAX as f64,
            Self::Int8 => i8::MAX as f64,
            Self::UInt11 => 2047.0,
            Self::UInt16 => u16::MAX as f64,
            Self::Int16 => i16::MAX as f64,
            Self::UInt32 => u32::MAX as f64,
            Self::Int32 => i32::MAX as f64,
            Self::UInt64 => u64::MAX as f64,
            Self::Int64 => i64::MAX as f64,
            Self::Float32 => f32::MAX as f64,
            Self::Float64 => f64::MAX,
        }
    }

    /// Parse from string (case-insensitive). Unrecognized names map to
    /// `Unknown`.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "uint8" | "u8" | "uchar" => Self::UInt8,
            "int8" | "i8" | "schar" => Self::Int8,
            "uint11" | "u11" => Self::UInt11,
            "uint16" | "u16" | "ushort" => Self::UInt16,
            "int16" | "i16" | "sshort" => Self::Int16,
            "uint32" | "u32" => Self::UInt32,
            "int32" | "i32" => Self::Int32,
            "uint64" | "u64" => Self::UInt64,
            "int64" | "i64" => Self::Int64,
            "float32" | "f32" | "float" => Self::Float32,
            "float64" | "f64" | "double" => Self::Float64,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::UInt8 => "uint8",
            Self::Int8 => "int8",
            Self::UInt11 => "uint11",
            Self::UInt16 => "uint16",
            Self::Int16 => "int16",
            Self::UInt32 => "uint32",
            Self::Int32 => "int32",
            Self::UInt64 => "uint64",
            Self::Int64 => "int64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A primitive sample type that a tile buffer can hold.
///
/// Resampling and endian code is written generically over this trait and
/// monomorphized per storage type, so there is no dynamic dispatch per pixel.
pub trait Sample:
    bytemuck::Pod + NumCast + Bounded + PartialOrd + Default + Send + Sync + 'static
{
    /// Storage scalar type for this primitive. `u16` reports `UInt16` even
    /// when the tile is tagged `UInt11`.
    const SCALAR: ScalarType;
    const IS_FLOAT: bool;

    /// Typed view of a buffer holding this primitive.
    fn samples(buf: &SampleBuffer) -> Option<&[Self]>;
    fn samples_mut(buf: &mut SampleBuffer) -> Option<&mut [Self]>;
    fn wrap(samples: Vec<Self>) -> SampleBuffer;

    #[inline]
    fn to_f64(self) -> f64 {
        num_traits::cast(self).unwrap_or(f64::NAN)
    }

    /// Convert from f64, rounding integer targets and saturating at the
    /// type's bounds. NaN maps to zero for integer targets.
    #[inline]
    fn from_f64(value: f64) -> Self {
        let v = if Self::IS_FLOAT { value } else { value.round() };
        match NumCast::from(v) {
            Some(s) => s,
            None if v.is_nan() => Self::default(),
            None if v > 0.0 => Self::max_value(),
            None => Self::min_value(),
        }
    }
}

macro_rules! impl_sample {
    ($t:ty, $variant:ident, $scalar:expr, $float:expr) => {
        impl Sample for $t {
            const SCALAR: ScalarType = $scalar;
            const IS_FLOAT: bool = $float;

            fn samples(buf: &SampleBuffer) -> Option<&[Self]> {
                match buf {
                    SampleBuffer::$variant(v) => Some(v.as_slice()),
                    _ => None,
                }
            }

            fn samples_mut(buf: &mut SampleBuffer) -> Option<&mut [Self]> {
                match buf {
                    SampleBuffer::$variant(v) => Some(v.as_mut_slice()),
                    _ => None,
                }
            }

            fn wrap(samples: Vec<Self>) -> SampleBuffer {
                SampleBuffer::$variant(samples)
            }
        }
    };
}

impl_sample!(u8, U8, ScalarType::UInt8, false);
impl_sample!(i8, I8, ScalarType::Int8, false);
impl_sample!(u16, U16, ScalarType::UInt16, false);
impl_sample!(i16, I16, ScalarType::Int16, false);
impl_sample!(u32, U32, ScalarType::UInt32, false);
impl_sample!(i32, I32, ScalarType::Int32, false);
impl_sample!(u64, U64, ScalarType::UInt64, false);
impl_sample!(i64, I64, ScalarType::Int64, false);
impl_sample!(f32, F32, ScalarType::Float32, true);
impl_sample!(f64, F64, ScalarType::Float64, true);
