//! A synthetic elevation surface served as Float32 tiles.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use interp_grid::DblGrid;
use raster_common::{DPoint, ImageData, IntRect, ScalarType, TileProvider};
use tracing::info;

/// Smoothing kernel applied after the sparse posts are spread.
#[rustfmt::skip]
const SMOOTHING: [f64; 9] = [
    1.0 / 16.0, 2.0 / 16.0, 1.0 / 16.0,
    2.0 / 16.0, 4.0 / 16.0, 2.0 / 16.0,
    1.0 / 16.0, 2.0 / 16.0, 1.0 / 16.0,
];

/// Tiles sampled from a coarse grid of elevation posts.
///
/// Only some posts are measured; the rest are filled by distance-weighted
/// interpolation and the grid is smoothed once before serving.
pub struct SurfaceProvider {
    grid: DblGrid,
    bounds: IntRect,
    fetches: AtomicUsize,
}

impl SurfaceProvider {
    pub fn new(image_size: u32, posts: usize, decay_rate: f64) -> Self {
        let posts = posts.max(2);
        let spacing = image_size.max(1) as f64 / (posts - 1) as f64;
        let mut grid = DblGrid::new(
            posts,
            posts,
            DPoint::new(0.0, 0.0),
            DPoint::new(spacing, spacing),
            f64::NAN,
        );

        let mut measured = 0;
        for y in 0..posts {
            for x in 0..posts {
                if (x * 7 + y * 3) % 4 != 0 {
                    continue;
                }
                let u = x as f64 * spacing;
                let v = y as f64 * spacing;
                let height = 500.0 + 120.0 * (x as f64 * 0.7).sin() * (y as f64 * 0.4).cos();
                grid.set_nearest_node(DPoint::new(u, v), height);
                measured += 1;
            }
        }
        grid.interpolate_null_valued_nodes(decay_rate);
        grid.filter(3, 3, &SMOOTHING);
        grid.enable_extrapolation(true);

        let stats = grid.statistics();
        info!(
            posts,
            measured,
            mean = stats.mean,
            std_dev = stats.std_dev,
            min = grid.min_value(),
            max = grid.max_value(),
            "Built elevation surface"
        );

        Self {
            grid,
            bounds: IntRect::new(0, 0, image_size, image_size),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Tiles produced so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }
}

impl TileProvider for SurfaceProvider {
    fn tile(&self, rect: &IntRect, resolution_level: u32) -> Option<Arc<ImageData>> {
        if resolution_level != 0 {
            return None;
        }
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let mut tile = self.blank_tile(rect);
        let Some(covered) = rect.intersection(&self.bounds) else {
            return Some(Arc::new(tile));
        };
        for y in covered.ul().y..=covered.lr().y {
            for x in covered.ul().x..=covered.lr().x {
                tile.set_value(0, x, y, self.grid.value(x as f64, y as f64));
            }
        }
        tile.validate();
        Some(Arc::new(tile))
    }

    fn bounding_rect(&self, resolution_level: u32) -> Option<IntRect> {
        (resolution_level == 0).then_some(self.bounds)
    }

    fn number_of_output_bands(&self) -> usize {
        1
    }

    fn output_scalar_type(&self) -> ScalarType {
        ScalarType::Float32
    }
}
