//! Test data generators for synthetic raster tiles.
//!
//! These generators create predictable, verifiable test data patterns
//! that can be used across the test suite.

use raster_common::{ImageData, IntRect, ScalarType};

/// Value of the reference pattern at absolute pixel `(x, y)` in `band`.
///
/// Calculated as: `x * 1000 + y + band * 100_000`
///
/// This makes it easy to verify that pixels land where they should: a
/// wrong value immediately tells which column, row and band it came from.
/// Exact in f32 for coordinates below 100.
///
/// # Example
///
/// ```
/// use test_utils::pattern_value;
///
/// assert_eq!(pattern_value(0, 0, 0), 0.0);
/// assert_eq!(pattern_value(3, 2, 0), 3002.0);
/// assert_eq!(pattern_value(0, 0, 1), 100_000.0);
/// ```
pub fn pattern_value(x: i32, y: i32, band: usize) -> f64 {
    (x as f64) * 1000.0 + y as f64 + band as f64 * 100_000.0
}

/// Creates a Float32 tile covering `rect` filled with [`pattern_value`].
pub fn create_test_tile(rect: IntRect, bands: usize) -> ImageData {
    let mut tile = ImageData::new(ScalarType::Float32, bands, rect);
    for band in 0..bands {
        for y in rect.ul().y..=rect.lr().y {
            for x in rect.ul().x..=rect.lr().x {
                tile.set_value(band, x, y, pattern_value(x, y, band));
            }
        }
    }
    tile.validate();
    tile
}

/// Creates a UInt8 tile with a diagonal ramp: `(x + y) % 250 + 1`.
///
/// Values never hit 0, the default UInt8 null, so the tile validates as
/// full.
pub fn create_ramp_tile(rect: IntRect, bands: usize) -> ImageData {
    let mut tile = ImageData::new(ScalarType::UInt8, bands, rect);
    for band in 0..bands {
        for y in rect.ul().y..=rect.lr().y {
            for x in rect.ul().x..=rect.lr().x {
                let v = (x + y).rem_euclid(250) + 1;
                tile.set_value(band, x, y, v as f64);
            }
        }
    }
    tile.validate();
    tile
}

/// Creates a UInt8 checkerboard with square cells of `cell` pixels,
/// alternating between 10 and 200.
pub fn create_checker_tile(rect: IntRect, cell: u32) -> ImageData {
    let cell = cell.max(1) as i32;
    let mut tile = ImageData::new(ScalarType::UInt8, 1, rect);
    for y in rect.ul().y..=rect.lr().y {
        for x in rect.ul().x..=rect.lr().x {
            let dark = (x.div_euclid(cell) + y.div_euclid(cell)) % 2 == 0;
            tile.set_value(0, x, y, if dark { 10.0 } else { 200.0 });
        }
    }
    tile.validate();
    tile
}

/// Creates a Float64 tile of constant `value`.
pub fn create_constant_tile(rect: IntRect, bands: usize, value: f64) -> ImageData {
    let samples = vec![value; rect.area() * bands];
    ImageData::from_samples(rect, bands, samples)
}

/// Node values of the plane `a + b * x + c * y` in row-major order.
///
/// Bilinear interpolation and linear extrapolation reproduce a plane
/// exactly, which makes it the reference surface for grid tests.
pub fn create_plane_values(width: usize, height: usize, a: f64, b: f64, c: f64) -> Vec<f64> {
    let mut data = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            data.push(a + b * x as f64 + c * y as f64);
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_common::DataObjectStatus;

    #[test]
    fn test_create_test_tile() {
        let tile = create_test_tile(IntRect::new(10, 20, 4, 4), 2);
        assert_eq!(tile.value(0, 12, 21), 12021.0);
        assert_eq!(tile.value(1, 10, 20), 110020.0);
        assert_eq!(tile.status(), DataObjectStatus::Full);
    }

    #[test]
    fn test_create_ramp_tile_is_full() {
        let tile = create_ramp_tile(IntRect::new(0, 0, 16, 16), 1);
        assert_eq!(tile.status(), DataObjectStatus::Full);
        assert_eq!(tile.value(0, 3, 4), 8.0);
    }

    #[test]
    fn test_create_checker_tile() {
        let tile = create_checker_tile(IntRect::new(0, 0, 4, 4), 2);
        assert_eq!(tile.value(0, 0, 0), 10.0);
        assert_eq!(tile.value(0, 2, 0), 200.0);
        assert_eq!(tile.value(0, 2, 2), 10.0);
    }

    #[test]
    fn test_create_plane_values() {
        let data = create_plane_values(3, 2, 1.0, 2.0, 10.0);
        assert_eq!(data, vec![1.0, 3.0, 5.0, 11.0, 13.0, 15.0]);
    }
}
