//! The image tile: a rectangle-addressed, multi-band pixel buffer.

use crate::endian::swap_raw;
use crate::geometry::{IntPoint, IntRect};
use crate::scalar::{Sample, ScalarType};
use serde::{Deserialize, Serialize};

/// How much of a tile holds valid (non-null) samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DataObjectStatus {
    /// No buffer has been allocated.
    #[default]
    Null,
    /// Buffer allocated, every sample is null.
    Empty,
    /// Some samples are null.
    Partial,
    /// No sample is null.
    Full,
}

/// Sample storage, one variant per supported primitive.
///
/// Bands are stored sequentially: band `b` occupies
/// `[b * width * height, (b + 1) * width * height)`.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleBuffer {
    U8(Vec<u8>),
    I8(Vec<i8>),
    U16(Vec<u16>),
    I16(Vec<i16>),
    U32(Vec<u32>),
    I32(Vec<i32>),
    U64(Vec<u64>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

/// Run `$body` with `$v` bound to the typed vector inside a [`SampleBuffer`].
#[macro_export]
macro_rules! with_samples {
    ($buf:expr, $v:ident => $body:expr) => {
        match $buf {
            $crate::SampleBuffer::U8($v) => $body,
            $crate::SampleBuffer::I8($v) => $body,
            $crate::SampleBuffer::U16($v) => $body,
            $crate::SampleBuffer::I16($v) => $body,
            $crate::SampleBuffer::U32($v) => $body,
            $crate::SampleBuffer::I32($v) => $body,
            $crate::SampleBuffer::U64($v) => $body,
            $crate::SampleBuffer::I64($v) => $body,
            $crate::SampleBuffer::F32($v) => $body,
            $crate::SampleBuffer::F64($v) => $body,
        }
    };
}

/// Run `$same` when two buffers hold the same primitive, `$other` otherwise.
#[macro_export]
macro_rules! with_sample_pair {
    ($a:expr, $b:expr, ($x:ident, $y:ident) => $same:expr, _ => $other:expr) => {
        match ($a, $b) {
            ($crate::SampleBuffer::U8($x), $crate::SampleBuffer::U8($y)) => $same,
            ($crate::SampleBuffer::I8($x), $crate::SampleBuffer::I8($y)) => $same,
            ($crate::SampleBuffer::U16($x), $crate::SampleBuffer::U16($y)) => $same,
            ($crate::SampleBuffer::I16($x), $crate::SampleBuffer::I16($y)) => $same,
            ($crate::SampleBuffer::U32($x), $crate::SampleBuffer::U32($y)) => $same,
            ($crate::SampleBuffer::I32($x), $crate::SampleBuffer::I32($y)) => $same,
            ($crate::SampleBuffer::U64($x), $crate::SampleBuffer::U64($y)) => $same,
            ($crate::SampleBuffer::I64($x), $crate::SampleBuffer::I64($y)) => $same,
            ($crate::SampleBuffer::F32($x), $crate::SampleBuffer::F32($y)) => $same,
            ($crate::SampleBuffer::F64($x), $crate::SampleBuffer::F64($y)) => $same,
            _ => $other,
        }
    };
}

impl SampleBuffer {
    /// Allocate a zeroed buffer of `len` samples. Unknown scalar types get
    /// an empty byte buffer.
    pub fn allocate(scalar: ScalarType, len: usize) -> Self {
        match scalar {
            ScalarType::Unknown => Self::U8(Vec::new()),
            ScalarType::UInt8 => Self::U8(vec![0; len]),
            ScalarType::Int8 => Self::I8(vec![0; len]),
            ScalarType::UInt11 | ScalarType::UInt16 => Self::U16(vec![0; len]),
            ScalarType::Int16 => Self::I16(vec![0; len]),
            ScalarType::UInt32 => Self::U32(vec![0; len]),
            ScalarType::Int32 => Self::I32(vec![0; len]),
            ScalarType::UInt64 => Self::U64(vec![0; len]),
            ScalarType::Int64 => Self::I64(vec![0; len]),
            ScalarType::Float32 => Self::F32(vec![0.0; len]),
            ScalarType::Float64 => Self::F64(vec![0.0; len]),
        }
    }

    pub fn len(&self) -> usize {
        with_samples!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read one sample as f64.
    #[inline]
    pub fn get_f64(&self, index: usize) -> Option<f64> {
        with_samples!(self, v => v.get(index).map(|s| Sample::to_f64(*s)))
    }

    /// Write one sample from f64. Out-of-range indices are ignored.
    #[inline]
    pub fn set_f64(&mut self, index: usize, value: f64) {
        with_samples!(self, v => {
            if let Some(s) = v.get_mut(index) {
                *s = Sample::from_f64(value);
            }
        })
    }

    fn fill_f64(&mut self, range: std::ops::Range<usize>, value: f64) {
        with_samples!(self, v => {
            let s = Sample::from_f64(value);
            if let Some(slice) = v.get_mut(range) {
                slice.fill(s);
            }
        })
    }

    fn swap_bytes(&mut self) {
        with_samples!(self, v => swap_samples(v.as_mut_slice()))
    }
}

/// Swap the samples through their raw byte view.
fn swap_samples<T: Sample>(values: &mut [T]) {
    swap_raw(T::SCALAR, bytemuck::cast_slice_mut(values));
}

/// A rectangular, multi-band block of pixel samples plus per-band
/// null/min/max values and a completeness status.
///
/// `Clone` is the deep copy; share tiles between readers with
/// `Arc<ImageData>`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    scalar: ScalarType,
    bands: usize,
    rect: IntRect,
    null_pix: Vec<f64>,
    min_pix: Vec<f64>,
    max_pix: Vec<f64>,
    status: DataObjectStatus,
    buffer: SampleBuffer,
}

impl ImageData {
    /// Create a tile covering `rect` with every sample set to the scalar
    /// type's default null value.
    pub fn new(scalar: ScalarType, bands: usize, rect: IntRect) -> Self {
        let len = if scalar == ScalarType::Unknown {
            0
        } else {
            rect.area() * bands
        };
        let mut tile = Self {
            scalar,
            bands,
            rect,
            null_pix: vec![scalar.default_null(); bands],
            min_pix: vec![scalar.default_min(); bands],
            max_pix: vec![scalar.default_max(); bands],
            status: DataObjectStatus::Null,
            buffer: SampleBuffer::allocate(scalar, len),
        };
        tile.make_blank();
        tile
    }

    /// Wrap existing band-sequential samples. The status is computed from
    /// the data.
    pub fn from_samples<T: Sample>(rect: IntRect, bands: usize, samples: Vec<T>) -> Self {
        let mut tile = Self::new(T::SCALAR, bands, rect);
        if samples.len() == tile.buffer.len() {
            tile.buffer = T::wrap(samples);
        }
        tile.validate();
        tile
    }

    pub fn scalar_type(&self) -> ScalarType {
        self.scalar
    }

    pub fn number_of_bands(&self) -> usize {
        self.bands
    }

    pub fn origin(&self) -> IntPoint {
        self.rect.ul()
    }

    /// Move the tile without touching its samples.
    pub fn set_origin(&mut self, origin: IntPoint) {
        self.rect = self.rect.with_origin(origin);
    }

    pub fn image_rect(&self) -> IntRect {
        self.rect
    }

    pub fn width(&self) -> u32 {
        self.rect.width()
    }

    pub fn height(&self) -> u32 {
        self.rect.height()
    }

    /// Number of samples in one band.
    pub fn plane_len(&self) -> usize {
        self.rect.area()
    }

    /// Total payload size: width * height * bands * bytes per sample.
    pub fn data_size_in_bytes(&self) -> usize {
        self.rect.area() * self.bands * self.scalar.bytes_per_sample()
    }

    pub fn null_pix(&self, band: usize) -> f64 {
        self.null_pix.get(band).copied().unwrap_or(f64::NAN)
    }

    pub fn min_pix(&self, band: usize) -> f64 {
        self.min_pix.get(band).copied().unwrap_or(f64::NAN)
    }

    pub fn max_pix(&self, band: usize) -> f64 {
        self.max_pix.get(band).copied().unwrap_or(f64::NAN)
    }

    pub fn set_null_pix(&mut self, band: usize, value: f64) {
        if let Some(v) = self.null_pix.get_mut(band) {
            *v = value;
        }
    }

    pub fn set_min_pix(&mut self, band: usize, value: f64) {
        if let Some(v) = self.min_pix.get_mut(band) {
            *v = value;
        }
    }

    pub fn set_max_pix(&mut self, band: usize, value: f64) {
        if let Some(v) = self.max_pix.get_mut(band) {
            *v = value;
        }
    }

    /// True when `value` equals the band's null value. NaN nulls match NaN.
    #[inline]
    pub fn is_null(&self, band: usize, value: f64) -> bool {
        let null = self.null_pix(band);
        if null.is_nan() {
            value.is_nan()
        } else {
            value == null
        }
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut SampleBuffer {
        &mut self.buffer
    }

    /// Typed view of one band. `None` when `T` is not the storage type or
    /// the band does not exist.
    pub fn band<T: Sample>(&self, band: usize) -> Option<&[T]> {
        let plane = self.plane_len();
        T::samples(&self.buffer)?.get(band * plane..(band + 1) * plane)
    }

    pub fn band_mut<T: Sample>(&mut self, band: usize) -> Option<&mut [T]> {
        let plane = self.plane_len();
        T::samples_mut(&mut self.buffer)?.get_mut(band * plane..(band + 1) * plane)
    }

    #[inline]
    fn index_of(&self, band: usize, x: i32, y: i32) -> Option<usize> {
        let p = IntPoint::new(x, y);
        if band >= self.bands || !self.rect.contains(p) {
            return None;
        }
        let local_x = (x - self.rect.ul().x) as usize;
        let local_y = (y - self.rect.ul().y) as usize;
        Some(band * self.plane_len() + local_y * self.rect.width() as usize + local_x)
    }

    /// Sample at absolute image position `(x, y)`, or the band's null value
    /// when the position is outside the tile.
    pub fn value(&self, band: usize, x: i32, y: i32) -> f64 {
        self.index_of(band, x, y)
            .and_then(|i| self.buffer.get_f64(i))
            .unwrap_or_else(|| self.null_pix(band))
    }

    /// Write a sample at absolute image position `(x, y)`. Positions outside
    /// the tile are ignored.
    pub fn set_value(&mut self, band: usize, x: i32, y: i32, value: f64) {
        if let Some(i) = self.index_of(band, x, y) {
            self.buffer.set_f64(i, value);
        }
    }

    /// One band converted to f64.
    pub fn band_values(&self, band: usize) -> Vec<f64> {
        let plane = self.plane_len();
        (band * plane..(band + 1) * plane)
            .map(|i| self.buffer.get_f64(i).unwrap_or(f64::NAN))
            .collect()
    }

    /// Overwrite one band from f64 values, saturating into the storage type.
    pub fn set_band_values(&mut self, band: usize, values: &[f64]) {
        if band >= self.bands {
            return;
        }
        let offset = band * self.plane_len();
        for (i, &v) in values.iter().take(self.plane_len()).enumerate() {
            self.buffer.set_f64(offset + i, v);
        }
    }

    /// Fill every band with its null value.
    pub fn make_blank(&mut self) {
        if self.buffer.is_empty() {
            self.status = DataObjectStatus::Null;
            return;
        }
        let plane = self.plane_len();
        for band in 0..self.bands {
            let null = self.null_pix(band);
            self.buffer.fill_f64(band * plane..(band + 1) * plane, null);
        }
        self.status = DataObjectStatus::Empty;
    }

    /// Recompute the completeness status from the samples.
    pub fn validate(&mut self) -> DataObjectStatus {
        self.status = self.scan_status();
        self.status
    }

    /// Completeness of the samples as they are now, without touching the
    /// cached status. Writes through `band_mut` or `set_value` are only
    /// reflected in [`ImageData::status`] after [`ImageData::validate`].
    pub fn scan_status(&self) -> DataObjectStatus {
        if !self.has_full_buffer() {
            return DataObjectStatus::Null;
        }
        let plane = self.plane_len();
        let total = plane * self.bands;
        let mut nulls = 0usize;
        for band in 0..self.bands {
            for i in band * plane..(band + 1) * plane {
                let v = self.buffer.get_f64(i).unwrap_or(f64::NAN);
                if self.is_null(band, v) {
                    nulls += 1;
                }
            }
        }
        if nulls == 0 {
            DataObjectStatus::Full
        } else if nulls == total {
            DataObjectStatus::Empty
        } else {
            DataObjectStatus::Partial
        }
    }

    /// True when the buffer holds every sample of every band.
    fn has_full_buffer(&self) -> bool {
        !self.buffer.is_empty() && self.buffer.len() == self.plane_len() * self.bands
    }

    pub fn status(&self) -> DataObjectStatus {
        self.status
    }

    pub fn set_status(&mut self, status: DataObjectStatus) {
        self.status = status;
    }

    /// Copy the region where `src` overlaps this tile, band by band, then
    /// revalidate. Bands beyond either tile's band count are skipped.
    /// Tiles without a complete buffer (unknown scalar type) are left alone.
    pub fn load_tile(&mut self, src: &ImageData) {
        if !self.has_full_buffer() || !src.has_full_buffer() {
            return;
        }
        let Some(overlap) = self.rect.intersection(&src.rect) else {
            return;
        };
        let bands = self.bands.min(src.bands);
        let dst_rect = self.rect;
        let src_rect = src.rect;
        let same_storage =
            std::mem::discriminant(&src.buffer) == std::mem::discriminant(&self.buffer);
        if same_storage {
            with_sample_pair!(
                &src.buffer,
                &mut self.buffer,
                (s, d) => copy_region(s, src_rect, d, dst_rect, overlap, bands),
                _ => {}
            );
        } else {
            tracing::trace!(
                from = %src.scalar,
                to = %self.scalar,
                "converting tile samples through f64"
            );
            for band in 0..bands {
                for y in overlap.ul().y..=overlap.lr().y {
                    for x in overlap.ul().x..=overlap.lr().x {
                        let v = src.value(band, x, y);
                        if let Some(i) = self.index_of(band, x, y) {
                            self.buffer.set_f64(i, v);
                        }
                    }
                }
            }
        }
        self.validate();
    }

    /// Reverse the byte order of every sample in place.
    pub fn swap_bytes(&mut self) {
        self.buffer.swap_bytes();
    }
}

fn copy_region<T: Copy>(
    src: &[T],
    src_rect: IntRect,
    dst: &mut [T],
    dst_rect: IntRect,
    overlap: IntRect,
    bands: usize,
) {
    let src_plane = src_rect.area();
    let dst_plane = dst_rect.area();
    let row_len = overlap.width() as usize;
    for band in 0..bands {
        for y in overlap.ul().y..=overlap.lr().y {
            let sx = (overlap.ul().x - src_rect.ul().x) as usize;
            let sy = (y - src_rect.ul().y) as usize;
            let dx = (overlap.ul().x - dst_rect.ul().x) as usize;
            let dy = (y - dst_rect.ul().y) as usize;
            let s0 = band * src_plane + sy * src_rect.width() as usize + sx;
            let d0 = band * dst_plane + dy * dst_rect.width() as usize + dx;
            if let (Some(d), Some(s)) = (dst.get_mut(d0..d0 + row_len), src.get(s0..s0 + row_len)) {
                d.copy_from_slice(s);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_tile_is_blank() {
        let tile = ImageData::new(ScalarType::UInt8, 3, IntRect::new(0, 0, 4, 4));
        assert_eq!(tile.status(), DataObjectStatus::Empty);
        assert_eq!(tile.data_size_in_bytes(), 4 * 4 * 3);
        assert_eq!(tile.value(2, 3, 3), 0.0);
    }

    #[test]
    fn test_unknown_scalar_is_null() {
        let tile = ImageData::new(ScalarType::Unknown, 1, IntRect::new(0, 0, 4, 4));
        assert_eq!(tile.status(), DataObjectStatus::Null);
        assert_eq!(tile.data_size_in_bytes(), 0);
    }

    #[test]
    fn test_validate_status() {
        let mut tile = ImageData::new(ScalarType::UInt16, 1, IntRect::new(10, 10, 2, 2));
        tile.set_value(0, 10, 10, 5.0);
        assert_eq!(tile.validate(), DataObjectStatus::Partial);

        for (x, y) in [(11, 10), (10, 11), (11, 11)] {
            tile.set_value(0, x, y, 7.0);
        }
        assert_eq!(tile.validate(), DataObjectStatus::Full);

        tile.make_blank();
        assert_eq!(tile.validate(), DataObjectStatus::Empty);
    }

    #[test]
    fn test_value_outside_returns_null() {
        let tile = ImageData::new(ScalarType::Float32, 1, IntRect::new(0, 0, 2, 2));
        assert!(tile.value(0, 5, 5).is_nan());
        assert!(tile.value(4, 0, 0).is_nan());
    }

    #[test]
    fn test_typed_band_access() {
        let data: Vec<u8> = (0..8).collect();
        let tile = ImageData::from_samples(IntRect::new(0, 0, 2, 2), 2, data);
        assert_eq!(tile.band::<u8>(0), Some(&[0u8, 1, 2, 3][..]));
        assert_eq!(tile.band::<u8>(1), Some(&[4u8, 5, 6, 7][..]));
        assert!(tile.band::<u16>(0).is_none());
        assert!(tile.band::<u8>(2).is_none());
    }

    #[test]
    fn test_load_tile_copies_overlap() {
        let src = ImageData::from_samples(IntRect::new(2, 2, 2, 2), 1, vec![1u8, 2, 3, 4]);
        let mut dst = ImageData::new(ScalarType::UInt8, 1, IntRect::new(0, 0, 4, 4));
        dst.load_tile(&src);

        assert_eq!(dst.value(0, 2, 2), 1.0);
        assert_eq!(dst.value(0, 3, 3), 4.0);
        assert_eq!(dst.value(0, 0, 0), 0.0);
        assert_eq!(dst.status(), DataObjectStatus::Partial);
    }

    #[test]
    fn test_load_tile_converts_scalar() {
        let src = ImageData::from_samples(IntRect::new(0, 0, 1, 1), 1, vec![300.4f32]);
        let mut dst = ImageData::new(ScalarType::UInt8, 1, IntRect::new(0, 0, 1, 1));
        dst.load_tile(&src);
        assert_eq!(dst.value(0, 0, 0), 255.0);
    }

    #[test]
    fn test_load_tile_skips_unknown_scalar() {
        let rect = IntRect::new(0, 0, 4, 4);
        let unknown = ImageData::new(ScalarType::Unknown, 1, rect);
        let mut dst = ImageData::from_samples(rect, 1, vec![7u8; 16]);
        dst.load_tile(&unknown);
        assert_eq!(dst.value(0, 3, 3), 7.0);
        assert_eq!(dst.status(), DataObjectStatus::Full);

        let mut unknown_dst = ImageData::new(ScalarType::Unknown, 1, rect);
        unknown_dst.load_tile(&dst);
        assert_eq!(unknown_dst.status(), DataObjectStatus::Null);
        assert!(unknown_dst.buffer().is_empty());
    }

    #[test]
    fn test_scan_status_sees_unvalidated_writes() {
        let mut tile = ImageData::new(ScalarType::UInt8, 1, IntRect::new(0, 0, 2, 2));
        if let Some(band) = tile.band_mut::<u8>(0) {
            band.fill(9);
        }
        assert_eq!(tile.status(), DataObjectStatus::Empty);
        assert_eq!(tile.scan_status(), DataObjectStatus::Full);
        assert_eq!(tile.validate(), DataObjectStatus::Full);
    }

    #[test]
    fn test_swap_bytes_roundtrip() {
        let mut tile = ImageData::from_samples(IntRect::new(0, 0, 2, 1), 1, vec![0x0102u16, 0x0304]);
        tile.swap_bytes();
        assert_eq!(tile.band::<u16>(0), Some(&[0x0201u16, 0x0403][..]));
        tile.swap_bytes();
        assert_eq!(tile.band::<u16>(0), Some(&[0x0102u16, 0x0304][..]));
    }

    #[test]
    fn test_swap_bytes_matches_scalar_swap() {
        use crate::endian::EndianSwap;

        let values = [1.5f64, -273.15];
        let mut tile = ImageData::from_samples(IntRect::new(0, 0, 2, 1), 1, values.to_vec());
        tile.swap_bytes();

        let mut expected = values;
        f64::swap_slice(&mut expected);
        let bits = |v: &[f64]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(tile.band::<f64>(0).map(bits), Some(bits(&expected)));
    }
}
