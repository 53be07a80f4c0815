//! Fixed-geometry tile cache with LRU ordering.
//!
//! The cache covers one tile-aligned rectangle. A tile's id is its linear
//! position in that rectangle's tile grid, so lookups never hash geometry
//! and two aligned origins can never collide.
//!
//! The cache has no byte budget of its own; [`TileCachePool`] decides when
//! to evict. Used on its own, the cache grows without bound and the caller
//! is responsible for calling [`FixedTileCache::delete_lru_tile`].
//!
//! [`TileCachePool`]: crate::TileCachePool

use std::sync::Arc;

use lru::LruCache;
use raster_common::{ImageData, IntPoint, IntRect, KeywordList, StatePersistence};

use crate::config::DEFAULT_TILE_SIZE;
use crate::types::TileId;

/// Origin-addressed tile storage for one rectangle and one tile size.
///
/// Tiles and their recency order live in a single [`LruCache`], so the id
/// set and the LRU sequence are always the same set and every mutation
/// updates both at once.
pub struct FixedTileCache {
    rect: IntRect,
    tile_width: u32,
    tile_height: u32,
    tiles_horizontal: u32,
    tiles_vertical: u32,
    tiles: LruCache<TileId, Arc<ImageData>>,
    use_lru: bool,
    current_size: usize,
}

impl FixedTileCache {
    /// Create a cache over `rect` (stretched out to whole tiles).
    pub fn new(rect: IntRect, tile_width: u32, tile_height: u32) -> Self {
        let mut cache = Self {
            rect: IntRect::default(),
            tile_width: DEFAULT_TILE_SIZE,
            tile_height: DEFAULT_TILE_SIZE,
            tiles_horizontal: 0,
            tiles_vertical: 0,
            tiles: LruCache::unbounded(),
            use_lru: true,
            current_size: 0,
        };
        cache.set_rect(rect, tile_width, tile_height);
        cache
    }

    /// Redefine the addressable region and tile size. Always flushes: tiles
    /// cached under the old geometry are never kept.
    pub fn set_rect(&mut self, rect: IntRect, tile_width: u32, tile_height: u32) {
        self.flush();

        self.tile_width = if tile_width == 0 { DEFAULT_TILE_SIZE } else { tile_width };
        self.tile_height = if tile_height == 0 { DEFAULT_TILE_SIZE } else { tile_height };

        if rect.is_empty() {
            self.rect = rect;
            self.tiles_horizontal = 0;
            self.tiles_vertical = 0;
        } else {
            self.rect = rect.stretch_to_tile_boundary(self.tile_width, self.tile_height);
            self.tiles_horizontal = self.rect.width() / self.tile_width;
            self.tiles_vertical = self.rect.height() / self.tile_height;
        }

        tracing::debug!(
            rect = %self.rect,
            tile_width = self.tile_width,
            tile_height = self.tile_height,
            "fixed tile cache geometry set"
        );
    }

    /// The tile-aligned addressable rectangle.
    pub fn tile_boundary_rect(&self) -> IntRect {
        self.rect
    }

    pub fn tile_size(&self) -> (u32, u32) {
        (self.tile_width, self.tile_height)
    }

    pub fn tiles_horizontal(&self) -> u32 {
        self.tiles_horizontal
    }

    pub fn tiles_vertical(&self) -> u32 {
        self.tiles_vertical
    }

    /// Number of addressable tile slots.
    pub fn number_of_tiles(&self) -> usize {
        self.tiles_horizontal as usize * self.tiles_vertical as usize
    }

    /// Id of the tile slot containing `origin`, or `None` when the origin
    /// lies outside the addressable rectangle. Pure integer arithmetic.
    pub fn compute_id(&self, origin: IntPoint) -> Option<TileId> {
        if self.rect.is_empty() {
            return None;
        }
        let dx = origin.x as i64 - self.rect.ul().x as i64;
        let dy = origin.y as i64 - self.rect.ul().y as i64;
        if dx < 0 || dy < 0 || dx >= self.rect.width() as i64 || dy >= self.rect.height() as i64 {
            return None;
        }
        let col = dx / self.tile_width as i64;
        let row = dy / self.tile_height as i64;
        TileId::try_from(row * self.tiles_horizontal as i64 + col).ok()
    }

    /// Upper-left corner of the tile slot `id`.
    pub fn tile_origin(&self, id: TileId) -> Option<IntPoint> {
        if id < 0 || id as usize >= self.number_of_tiles() {
            return None;
        }
        let col = id as u32 % self.tiles_horizontal;
        let row = id as u32 / self.tiles_horizontal;
        Some(IntPoint::new(
            self.rect.ul().x + (col * self.tile_width) as i32,
            self.rect.ul().y + (row * self.tile_height) as i32,
        ))
    }

    /// Insert a tile keyed by its origin.
    ///
    /// Returns `None` without inserting when the origin is outside the
    /// addressable rectangle or the slot is already occupied; callers must
    /// remove an existing tile before replacing it. With `duplicate` the
    /// cache stores a private deep copy, otherwise it shares the caller's
    /// tile.
    pub fn add_tile(&mut self, tile: Arc<ImageData>, duplicate: bool) -> Option<Arc<ImageData>> {
        let id = self.compute_id(tile.origin())?;
        if self.tiles.contains(&id) {
            return None;
        }
        let stored = if duplicate {
            Arc::new(tile.as_ref().clone())
        } else {
            tile
        };
        self.current_size += stored.data_size_in_bytes();
        self.tiles.put(id, Arc::clone(&stored));
        Some(stored)
    }

    /// Look up a tile by id. A hit becomes the most-recently-used entry
    /// unless LRU tracking is disabled.
    pub fn get_tile(&mut self, id: TileId) -> Option<Arc<ImageData>> {
        if self.use_lru {
            self.tiles.get(&id).cloned()
        } else {
            self.tiles.peek(&id).cloned()
        }
    }

    /// Look up the tile whose slot contains `origin`.
    pub fn tile_at(&mut self, origin: IntPoint) -> Option<Arc<ImageData>> {
        let id = self.compute_id(origin)?;
        self.get_tile(id)
    }

    /// Look up without touching recency.
    pub fn peek_tile(&self, id: TileId) -> Option<&Arc<ImageData>> {
        self.tiles.peek(&id)
    }

    pub fn contains(&self, id: TileId) -> bool {
        self.tiles.contains(&id)
    }

    /// Take a tile out of the cache and hand it back.
    pub fn remove_tile(&mut self, id: TileId) -> Option<Arc<ImageData>> {
        let tile = self.tiles.pop(&id)?;
        self.current_size = self.current_size.saturating_sub(tile.data_size_in_bytes());
        Some(tile)
    }

    /// Take the least-recently-used tile out of the cache.
    pub fn remove_lru_tile(&mut self) -> Option<(TileId, Arc<ImageData>)> {
        let (id, tile) = self.tiles.pop_lru()?;
        self.current_size = self.current_size.saturating_sub(tile.data_size_in_bytes());
        Some((id, tile))
    }

    /// Drop a tile. Returns whether it was present.
    pub fn delete_tile(&mut self, id: TileId) -> bool {
        self.remove_tile(id).is_some()
    }

    /// Drop the least-recently-used tile, returning its id.
    pub fn delete_lru_tile(&mut self) -> Option<TileId> {
        self.remove_lru_tile().map(|(id, _)| id)
    }

    /// Evict every tile whose image rectangle does not intersect `rect`.
    /// Returns the evicted ids.
    pub fn keep_tiles_within_rect(&mut self, rect: &IntRect) -> Vec<TileId> {
        let outside: Vec<TileId> = self
            .tiles
            .iter()
            .filter(|(_, tile)| !tile.image_rect().intersects(rect))
            .map(|(id, _)| *id)
            .collect();
        for id in &outside {
            self.remove_tile(*id);
        }
        outside
    }

    /// Remove everything and zero the byte counter.
    pub fn flush(&mut self) {
        if !self.tiles.is_empty() {
            tracing::debug!(entries = self.tiles.len(), bytes = self.current_size, "flushing fixed tile cache");
        }
        self.tiles.clear();
        self.current_size = 0;
    }

    /// Sum of `data_size_in_bytes` over cached tiles.
    pub fn current_size(&self) -> usize {
        self.current_size
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn set_use_lru(&mut self, use_lru: bool) {
        self.use_lru = use_lru;
    }

    pub fn use_lru(&self) -> bool {
        self.use_lru
    }

    /// Cached ids from least- to most-recently-used. With LRU tracking
    /// disabled this is insertion order.
    pub fn lru_order(&self) -> Vec<TileId> {
        self.tiles.iter().rev().map(|(id, _)| *id).collect()
    }

    /// Cached ids in ascending order.
    pub fn ids(&self) -> Vec<TileId> {
        let mut ids: Vec<TileId> = self.tiles.iter().map(|(id, _)| *id).collect();
        ids.sort_unstable();
        ids
    }
}

impl StatePersistence for FixedTileCache {
    fn save_state(&self, kwl: &mut KeywordList, prefix: &str) {
        kwl.add_rect(prefix, "rect", self.rect);
        kwl.add_values(prefix, "tile_size", &[self.tile_width, self.tile_height]);
        kwl.add(prefix, "use_lru", self.use_lru);
    }

    fn load_state(&mut self, kwl: &KeywordList, prefix: &str) -> raster_common::Result<()> {
        let rect = kwl.find_rect(prefix, "rect")?.unwrap_or(self.rect);
        let (tw, th) = match kwl.find_values::<u32>(prefix, "tile_size")? {
            Some(v) if v.len() == 2 => (v[0], v[1]),
            Some(_) => {
                return Err(raster_common::RasterError::keyword(
                    format!("{prefix}tile_size"),
                    "expected 'width height'",
                ))
            }
            None => (self.tile_width, self.tile_height),
        };
        if let Some(use_lru) = kwl.find_parsed::<bool>(prefix, "use_lru")? {
            self.use_lru = use_lru;
        }
        self.set_rect(rect, tw, th);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_common::ScalarType;

    fn tile_at(x: i32, y: i32, size: u32) -> Arc<ImageData> {
        Arc::new(ImageData::new(
            ScalarType::UInt8,
            1,
            IntRect::new(x, y, size, size),
        ))
    }

    #[test]
    fn test_rect_is_stretched_to_tiles() {
        let cache = FixedTileCache::new(IntRect::new(1, 1, 10, 6), 4, 4);
        assert_eq!(cache.tile_boundary_rect(), IntRect::new(0, 0, 12, 8));
        assert_eq!(cache.tiles_horizontal(), 3);
        assert_eq!(cache.tiles_vertical(), 2);
        assert_eq!(cache.number_of_tiles(), 6);
    }

    #[test]
    fn test_compute_id() {
        let cache = FixedTileCache::new(IntRect::new(0, 0, 8, 8), 2, 2);
        assert_eq!(cache.compute_id(IntPoint::new(0, 0)), Some(0));
        assert_eq!(cache.compute_id(IntPoint::new(2, 0)), Some(1));
        assert_eq!(cache.compute_id(IntPoint::new(0, 2)), Some(4));
        assert_eq!(cache.compute_id(IntPoint::new(6, 6)), Some(15));
        assert_eq!(cache.compute_id(IntPoint::new(3, 3)), Some(5));
        assert_eq!(cache.compute_id(IntPoint::new(8, 0)), None);
        assert_eq!(cache.compute_id(IntPoint::new(-1, 0)), None);
        assert_eq!(cache.tile_origin(5), Some(IntPoint::new(2, 2)));
        assert_eq!(cache.tile_origin(16), None);
    }

    #[test]
    fn test_compute_id_with_offset_rect() {
        let cache = FixedTileCache::new(IntRect::new(-64, 128, 128, 64), 32, 32);
        assert_eq!(cache.compute_id(IntPoint::new(-64, 128)), Some(0));
        assert_eq!(cache.compute_id(IntPoint::new(32, 160)), Some(7));
        assert_eq!(cache.compute_id(IntPoint::new(-65, 128)), None);
    }

    #[test]
    fn test_add_rejects_outside_and_duplicates() {
        let mut cache = FixedTileCache::new(IntRect::new(0, 0, 8, 8), 2, 2);
        assert!(cache.add_tile(tile_at(0, 0, 2), false).is_some());
        assert!(cache.add_tile(tile_at(0, 0, 2), false).is_none());
        assert!(cache.add_tile(tile_at(20, 20, 2), false).is_none());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.current_size(), 4);
    }

    #[test]
    fn test_duplicate_stores_private_copy() {
        let mut cache = FixedTileCache::new(IntRect::new(0, 0, 8, 8), 2, 2);
        let tile = tile_at(2, 2, 2);

        let shared = cache.add_tile(Arc::clone(&tile), false).unwrap();
        assert!(Arc::ptr_eq(&shared, &tile));

        let mut other = FixedTileCache::new(IntRect::new(0, 0, 8, 8), 2, 2);
        let copy = other.add_tile(Arc::clone(&tile), true).unwrap();
        assert!(!Arc::ptr_eq(&copy, &tile));
        assert_eq!(*copy, *tile);
    }

    #[test]
    fn test_get_promotes_to_mru() {
        let mut cache = FixedTileCache::new(IntRect::new(0, 0, 8, 8), 2, 2);
        for x in [0, 2, 4] {
            cache.add_tile(tile_at(x, 0, 2), false);
        }
        assert_eq!(cache.lru_order(), vec![0, 1, 2]);

        cache.get_tile(0);
        assert_eq!(cache.lru_order(), vec![1, 2, 0]);
        assert_eq!(cache.delete_lru_tile(), Some(1));
    }

    #[test]
    fn test_get_without_lru_keeps_order() {
        let mut cache = FixedTileCache::new(IntRect::new(0, 0, 8, 8), 2, 2);
        cache.set_use_lru(false);
        for x in [0, 2, 4] {
            cache.add_tile(tile_at(x, 0, 2), false);
        }
        assert!(cache.get_tile(0).is_some());
        assert_eq!(cache.lru_order(), vec![0, 1, 2]);
    }

    #[test]
    fn test_remove_and_delete() {
        let mut cache = FixedTileCache::new(IntRect::new(0, 0, 8, 8), 2, 2);
        cache.add_tile(tile_at(0, 0, 2), false);
        cache.add_tile(tile_at(2, 0, 2), false);

        let removed = cache.remove_tile(0).unwrap();
        assert_eq!(removed.origin(), IntPoint::new(0, 0));
        assert!(cache.remove_tile(0).is_none());
        assert!(cache.delete_tile(1));
        assert!(!cache.delete_tile(1));
        assert_eq!(cache.current_size(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_keep_tiles_within_rect() {
        let mut cache = FixedTileCache::new(IntRect::new(0, 0, 8, 8), 2, 2);
        for y in [0, 2, 4, 6] {
            for x in [0, 2, 4, 6] {
                cache.add_tile(tile_at(x, y, 2), false);
            }
        }
        let evicted = cache.keep_tiles_within_rect(&IntRect::new(0, 0, 3, 3));
        assert_eq!(evicted.len(), 12);
        assert_eq!(cache.ids(), vec![0, 1, 4, 5]);
        assert_eq!(cache.current_size(), 16);
    }

    #[test]
    fn test_set_rect_flushes() {
        let mut cache = FixedTileCache::new(IntRect::new(0, 0, 8, 8), 2, 2);
        cache.add_tile(tile_at(0, 0, 2), false);
        cache.set_rect(IntRect::new(0, 0, 8, 8), 4, 4);
        assert!(cache.is_empty());
        assert_eq!(cache.current_size(), 0);
        assert_eq!(cache.tile_size(), (4, 4));
    }

    #[test]
    fn test_zero_tile_size_defaults() {
        let cache = FixedTileCache::new(IntRect::new(0, 0, 100, 100), 0, 0);
        assert_eq!(cache.tile_size(), (DEFAULT_TILE_SIZE, DEFAULT_TILE_SIZE));
        assert_eq!(cache.number_of_tiles(), 4);
    }

    #[test]
    fn test_state_roundtrip() {
        let mut cache = FixedTileCache::new(IntRect::new(0, 0, 64, 32), 16, 8);
        cache.set_use_lru(false);
        let mut kwl = KeywordList::new();
        cache.save_state(&mut kwl, "cache.");

        let mut restored = FixedTileCache::new(IntRect::new(0, 0, 1, 1), 1, 1);
        restored.load_state(&kwl, "cache.").unwrap();
        assert_eq!(restored.tile_boundary_rect(), IntRect::new(0, 0, 64, 32));
        assert_eq!(restored.tile_size(), (16, 8));
        assert!(!restored.use_lru());
    }
}
