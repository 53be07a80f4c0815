//! A tile provider that serves repeat requests from a shared pool.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use raster_common::{BandSelector, ImageData, IntPoint, IntRect, ScalarType, TileProvider};

use crate::config::CacheConfig;
use crate::pool::TileCachePool;
use crate::types::CacheId;

/// Caches the tiles of an upstream [`TileProvider`] in a [`TileCachePool`].
///
/// One fixed cache is created lazily per resolution level, covering that
/// level's bounding rectangle. Requests that are exactly one cache tile are
/// answered with the shared cached tile; any other rectangle is assembled
/// from the cached tiles it overlaps.
pub struct CachedTileSource<P> {
    source: P,
    pool: Arc<TileCachePool>,
    tile_width: u32,
    tile_height: u32,
    caches: Mutex<HashMap<u32, CacheId>>,
}

impl<P: TileProvider> CachedTileSource<P> {
    pub fn new(source: P, pool: Arc<TileCachePool>, config: &CacheConfig) -> Self {
        let (tile_width, tile_height) = config.tile_size();
        Self {
            source,
            pool,
            tile_width,
            tile_height,
            caches: Mutex::new(HashMap::new()),
        }
    }

    pub fn source(&self) -> &P {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut P {
        &mut self.source
    }

    pub fn pool(&self) -> &Arc<TileCachePool> {
        &self.pool
    }

    pub fn tile_size(&self) -> (u32, u32) {
        (self.tile_width, self.tile_height)
    }

    /// Drop every cached tile of this source, keeping the caches.
    pub fn flush(&self) {
        let caches = self.caches.lock().unwrap_or_else(PoisonError::into_inner);
        for cache_id in caches.values() {
            self.pool.flush_cache(*cache_id);
        }
    }

    fn cache_for_level(&self, resolution_level: u32) -> Option<CacheId> {
        let mut caches = self.caches.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(id) = caches.get(&resolution_level) {
            return Some(*id);
        }
        let bounds = self.source.bounding_rect(resolution_level)?;
        let id = self
            .pool
            .new_cache(bounds, self.tile_width, self.tile_height);
        tracing::debug!(resolution_level, cache_id = id, rect = %bounds, "created level cache");
        caches.insert(resolution_level, id);
        Some(id)
    }

    /// One cache-aligned tile, from the pool or fetched and cached.
    fn cached_tile(
        &self,
        cache_id: CacheId,
        origin: IntPoint,
        resolution_level: u32,
    ) -> Option<Arc<ImageData>> {
        if let Some(tile) = self.pool.get_tile(cache_id, origin) {
            return Some(tile);
        }
        let rect = IntRect::new(origin.x, origin.y, self.tile_width, self.tile_height);
        let tile = self.source.tile(&rect, resolution_level)?;
        if tile.image_rect() != rect {
            return Some(tile);
        }
        Some(
            self.pool
                .add_tile(cache_id, Arc::clone(&tile), false)
                .unwrap_or(tile),
        )
    }
}

impl<P: TileProvider> TileProvider for CachedTileSource<P> {
    fn tile(&self, rect: &IntRect, resolution_level: u32) -> Option<Arc<ImageData>> {
        let Some(cache_id) = self.cache_for_level(resolution_level) else {
            return self.source.tile(rect, resolution_level);
        };
        let bounds = self.pool.cache_rect(cache_id)?;
        let Some(covered) = rect.intersection(&bounds) else {
            return Some(Arc::new(self.blank_tile(rect)));
        };

        let aligned = covered.stretch_to_tile_boundary(self.tile_width, self.tile_height);
        let is_single_tile = *rect == aligned
            && aligned.width() == self.tile_width
            && aligned.height() == self.tile_height;
        if is_single_tile {
            return self.cached_tile(cache_id, rect.ul(), resolution_level);
        }

        let mut result = self.blank_tile(rect);
        let tw = self.tile_width as i32;
        let th = self.tile_height as i32;
        let mut y = aligned.ul().y;
        while y <= aligned.lr().y {
            let mut x = aligned.ul().x;
            while x <= aligned.lr().x {
                if let Some(tile) = self.cached_tile(cache_id, IntPoint::new(x, y), resolution_level) {
                    result.load_tile(&tile);
                }
                x += tw;
            }
            y += th;
        }
        result.validate();
        Some(Arc::new(result))
    }

    fn bounding_rect(&self, resolution_level: u32) -> Option<IntRect> {
        self.source.bounding_rect(resolution_level)
    }

    fn number_of_output_bands(&self) -> usize {
        self.source.number_of_output_bands()
    }

    fn output_scalar_type(&self) -> ScalarType {
        self.source.output_scalar_type()
    }

    fn null_pixel_value(&self, band: usize) -> f64 {
        self.source.null_pixel_value(band)
    }

    fn min_pixel_value(&self, band: usize) -> f64 {
        self.source.min_pixel_value(band)
    }

    fn max_pixel_value(&self, band: usize) -> f64 {
        self.source.max_pixel_value(band)
    }

    fn band_selector(&self) -> Option<&dyn BandSelector> {
        self.source.band_selector()
    }

    fn band_selector_mut(&mut self) -> Option<&mut dyn BandSelector> {
        // Cached tiles carry the old band layout.
        self.flush();
        self.source.band_selector_mut()
    }
}

impl<P> Drop for CachedTileSource<P> {
    fn drop(&mut self) {
        let caches = self.caches.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, cache_id) in caches.drain() {
            self.pool.delete_cache(cache_id);
        }
    }
}
