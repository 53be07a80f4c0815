//! Common test fixtures for raster-core tests.
//!
//! This module provides pre-defined rectangles and a mock upstream tile
//! provider for cache and resampler tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use raster_common::{BandSelector, ImageData, IntRect, ScalarType, TileProvider};

use crate::generators::pattern_value;

/// Common rectangles for testing.
pub mod rects {
    use raster_common::IntRect;

    /// A 4x4-tile region at 2x2 tiles.
    pub const SMALL_TILED: IntRect = IntRect::new(0, 0, 8, 8);

    /// A 256x256 image.
    pub const IMAGE_256: IntRect = IntRect::new(0, 0, 256, 256);

    /// An image whose origin is not at zero.
    pub const OFFSET_IMAGE: IntRect = IntRect::new(-64, 32, 192, 128);
}

/// An upstream provider that synthesizes [`pattern_value`] tiles and counts
/// how often it is asked for one.
///
/// Resolution level `n` covers the full-resolution bounds shrunk by `2^n`.
pub struct MockTileProvider {
    bounds: IntRect,
    levels: u32,
    scalar: ScalarType,
    input_bands: usize,
    selected: Vec<usize>,
    fetches: AtomicUsize,
}

impl MockTileProvider {
    /// A Float32 provider with `bands` bands and a single resolution level.
    pub fn new(bounds: IntRect, bands: usize) -> Self {
        Self {
            bounds,
            levels: 1,
            scalar: ScalarType::Float32,
            input_bands: bands,
            selected: (0..bands).collect(),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn with_levels(mut self, levels: u32) -> Self {
        self.levels = levels.max(1);
        self
    }

    pub fn with_scalar(mut self, scalar: ScalarType) -> Self {
        self.scalar = scalar;
        self
    }

    /// Number of `tile` calls served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    pub fn reset_fetch_count(&self) {
        self.fetches.store(0, Ordering::Relaxed);
    }
}

impl TileProvider for MockTileProvider {
    fn tile(&self, rect: &IntRect, resolution_level: u32) -> Option<Arc<ImageData>> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let bounds = self.bounding_rect(resolution_level)?;
        let mut tile = self.blank_tile(rect);
        if let Some(valid) = rect.intersection(&bounds) {
            for (out_band, &in_band) in self.selected.iter().enumerate() {
                for y in valid.ul().y..=valid.lr().y {
                    for x in valid.ul().x..=valid.lr().x {
                        tile.set_value(out_band, x, y, pattern_value(x, y, in_band));
                    }
                }
            }
        }
        tile.validate();
        Some(Arc::new(tile))
    }

    fn bounding_rect(&self, resolution_level: u32) -> Option<IntRect> {
        if resolution_level >= self.levels {
            return None;
        }
        let scale = 1u32 << resolution_level;
        Some(IntRect::new(
            self.bounds.ul().x.div_euclid(scale as i32),
            self.bounds.ul().y.div_euclid(scale as i32),
            (self.bounds.width() / scale).max(1),
            (self.bounds.height() / scale).max(1),
        ))
    }

    fn number_of_output_bands(&self) -> usize {
        self.selected.len()
    }

    fn output_scalar_type(&self) -> ScalarType {
        self.scalar
    }

    fn band_selector(&self) -> Option<&dyn BandSelector> {
        Some(self)
    }

    fn band_selector_mut(&mut self) -> Option<&mut dyn BandSelector> {
        Some(self)
    }
}

impl BandSelector for MockTileProvider {
    fn selected_bands(&self) -> Vec<usize> {
        self.selected.clone()
    }

    fn set_output_bands(&mut self, bands: &[usize]) -> bool {
        if bands.is_empty() || bands.iter().any(|&b| b >= self.input_bands) {
            return false;
        }
        self.selected = bands.to_vec();
        true
    }
}
