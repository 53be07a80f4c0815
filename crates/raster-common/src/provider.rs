//! The tile provider contract consumed by the cache and resampler.

use std::sync::Arc;

use crate::geometry::IntRect;
use crate::scalar::ScalarType;
use crate::tile::ImageData;

/// Anything that can produce tiles: an image handler, an upstream filter,
/// or a cache sitting in front of one.
pub trait TileProvider: Send + Sync {
    /// Produce the tile covering `rect` at `resolution_level`. `None` means
    /// there is no data for that request; it is not an error.
    fn tile(&self, rect: &IntRect, resolution_level: u32) -> Option<Arc<ImageData>>;

    /// Full image extent at a resolution level, if known.
    fn bounding_rect(&self, resolution_level: u32) -> Option<IntRect>;

    fn number_of_output_bands(&self) -> usize;

    fn output_scalar_type(&self) -> ScalarType;

    fn null_pixel_value(&self, band: usize) -> f64 {
        let _ = band;
        self.output_scalar_type().default_null()
    }

    fn min_pixel_value(&self, band: usize) -> f64 {
        let _ = band;
        self.output_scalar_type().default_min()
    }

    fn max_pixel_value(&self, band: usize) -> f64 {
        let _ = band;
        self.output_scalar_type().default_max()
    }

    /// Band selection capability, for providers that support it.
    fn band_selector(&self) -> Option<&dyn BandSelector> {
        None
    }

    fn band_selector_mut(&mut self) -> Option<&mut dyn BandSelector> {
        None
    }

    /// A blank tile shaped like this provider's output.
    fn blank_tile(&self, rect: &IntRect) -> ImageData {
        let mut tile = ImageData::new(
            self.output_scalar_type(),
            self.number_of_output_bands(),
            *rect,
        );
        for band in 0..self.number_of_output_bands() {
            tile.set_null_pix(band, self.null_pixel_value(band));
            tile.set_min_pix(band, self.min_pixel_value(band));
            tile.set_max_pix(band, self.max_pixel_value(band));
        }
        tile.make_blank();
        tile
    }
}

/// Optional capability: choosing which input bands a provider outputs.
pub trait BandSelector {
    /// Input band indices currently routed to the output, in output order.
    fn selected_bands(&self) -> Vec<usize>;

    /// Route the given input bands to the output. Returns false when any
    /// index is out of range; the selection is then left unchanged.
    fn set_output_bands(&mut self, bands: &[usize]) -> bool;
}
