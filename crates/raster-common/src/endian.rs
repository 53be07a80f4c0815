//! Byte-order normalization for raw pixel data.
//!
//! Format readers know the byte order of the file they read; when it
//! differs from the host they swap samples in place before handing the
//! buffer on. Single-byte samples have no byte order and are left alone.

use crate::scalar::ScalarType;

/// Byte order of a data stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    /// Byte order of the running host.
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Endian::Big
        } else {
            Endian::Little
        }
    }

    /// True when data in this byte order must be swapped on this host.
    pub fn needs_swap(&self) -> bool {
        *self != Self::native()
    }
}

/// In-place byte swapping for fixed-width numeric samples.
pub trait EndianSwap: Copy {
    fn swap_in_place(&mut self);

    fn swap_slice(values: &mut [Self]) {
        for v in values.iter_mut() {
            v.swap_in_place();
        }
    }
}

macro_rules! impl_swap_int {
    ($($t:ty),*) => {
        $(impl EndianSwap for $t {
            #[inline]
            fn swap_in_place(&mut self) {
                *self = self.swap_bytes();
            }
        })*
    };
}

impl_swap_int!(u8, i8, u16, i16, u32, i32, u64, i64);

impl EndianSwap for f32 {
    #[inline]
    fn swap_in_place(&mut self) {
        *self = f32::from_bits(self.to_bits().swap_bytes());
    }
}

impl EndianSwap for f64 {
    #[inline]
    fn swap_in_place(&mut self) {
        *self = f64::from_bits(self.to_bits().swap_bytes());
    }
}

/// Swap a raw byte buffer holding samples of `scalar` type.
///
/// 16-bit types swap every 2 bytes, 32-bit types every 4 and 64-bit types
/// every 8. Unknown and 8-bit types are a no-op. A trailing partial sample
/// is left untouched.
pub fn swap_raw(scalar: ScalarType, bytes: &mut [u8]) {
    let width = match scalar {
        ScalarType::UInt11 | ScalarType::UInt16 | ScalarType::Int16 => 2,
        ScalarType::UInt32 | ScalarType::Int32 | ScalarType::Float32 => 4,
        ScalarType::UInt64 | ScalarType::Int64 | ScalarType::Float64 => 8,
        ScalarType::Unknown | ScalarType::UInt8 | ScalarType::Int8 => return,
    };
    for chunk in bytes.chunks_exact_mut(width) {
        chunk.reverse();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_scalars() {
        let mut a: u16 = 0x1234;
        a.swap_in_place();
        assert_eq!(a, 0x3412);

        let mut b: i32 = 0x0102_0304;
        b.swap_in_place();
        assert_eq!(b, 0x0403_0201);

        let mut c: f64 = 1.5;
        c.swap_in_place();
        assert_ne!(c.to_bits(), 1.5f64.to_bits());
        c.swap_in_place();
        assert_eq!(c, 1.5);
    }

    #[test]
    fn test_swap_slice() {
        let mut values = [0x0001u16, 0x0100, 0xABCD];
        u16::swap_slice(&mut values);
        assert_eq!(values, [0x0100, 0x0001, 0xCDAB]);
    }

    #[test]
    fn test_swap_raw_matches_typed_swap() {
        let original: f32 = 273.15;
        let mut bytes = original.to_le_bytes();
        swap_raw(ScalarType::Float32, &mut bytes);
        assert_eq!(f32::from_be_bytes(bytes), original);
    }

    #[test]
    fn test_swap_raw_eight_bit_is_noop() {
        let mut bytes = [1u8, 2, 3, 4];
        swap_raw(ScalarType::UInt8, &mut bytes);
        assert_eq!(bytes, [1, 2, 3, 4]);
        swap_raw(ScalarType::Unknown, &mut bytes);
        assert_eq!(bytes, [1, 2, 3, 4]);
    }

    #[test]
    fn test_swap_raw_sixteen_bit() {
        let mut bytes = [0x12u8, 0x34, 0x56, 0x78, 0x9A];
        swap_raw(ScalarType::UInt11, &mut bytes);
        assert_eq!(bytes, [0x34, 0x12, 0x78, 0x56, 0x9A]);
    }
}
