//! Byte-budgeted pool of fixed tile caches.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lru::LruCache;
use raster_common::{ImageData, IntPoint, IntRect};

use crate::config::CacheConfig;
use crate::fixed::FixedTileCache;
use crate::types::{CacheId, CacheStats, TileId};

/// Owns any number of [`FixedTileCache`]s and keeps their combined size
/// under one byte budget.
///
/// Every operation takes the single pool lock, so the per-cache tile maps,
/// the global recency order and the byte counters always change together
/// and concurrent inserts cannot race past the budget.
pub struct TileCachePool {
    state: Mutex<PoolState>,
}

struct PoolState {
    caches: HashMap<CacheId, FixedTileCache>,
    /// Recency across every cache, least-recently-used first out.
    order: LruCache<(CacheId, TileId), ()>,
    next_id: CacheId,
    max_size: usize,
    current_size: usize,
    use_lru: bool,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl TileCachePool {
    /// Create a pool from configuration.
    pub fn new(config: &CacheConfig) -> Self {
        let pool = Self::with_max_size(config.max_cache_size_bytes());
        pool.lock().use_lru = config.use_lru;
        pool
    }

    /// Create a pool with a budget in bytes.
    pub fn with_max_size(max_size: usize) -> Self {
        tracing::debug!(max_size, "creating tile cache pool");
        Self {
            state: Mutex::new(PoolState {
                caches: HashMap::new(),
                order: LruCache::unbounded(),
                next_id: 0,
                max_size,
                current_size: 0,
                use_lru: true,
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new fixed cache covering `rect`.
    pub fn new_cache(&self, rect: IntRect, tile_width: u32, tile_height: u32) -> CacheId {
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id = state.next_id.wrapping_add(1);
        let mut cache = FixedTileCache::new(rect, tile_width, tile_height);
        cache.set_use_lru(state.use_lru);
        state.caches.insert(id, cache);
        id
    }

    /// Drop a cache and every tile it holds. Returns whether it existed.
    pub fn delete_cache(&self, cache_id: CacheId) -> bool {
        let mut state = self.lock();
        state.drop_cache_tiles(cache_id);
        state.caches.remove(&cache_id).is_some()
    }

    pub fn number_of_caches(&self) -> usize {
        self.lock().caches.len()
    }

    /// The tile-aligned rectangle of a cache.
    pub fn cache_rect(&self, cache_id: CacheId) -> Option<IntRect> {
        self.lock()
            .caches
            .get(&cache_id)
            .map(FixedTileCache::tile_boundary_rect)
    }

    pub fn cache_tile_size(&self, cache_id: CacheId) -> Option<(u32, u32)> {
        self.lock().caches.get(&cache_id).map(FixedTileCache::tile_size)
    }

    /// Id of the slot containing `origin` in one cache.
    pub fn compute_id(&self, cache_id: CacheId, origin: IntPoint) -> Option<TileId> {
        self.lock().caches.get(&cache_id)?.compute_id(origin)
    }

    /// Run `f` against a cache while holding the pool lock.
    pub fn with_cache<R>(&self, cache_id: CacheId, f: impl FnOnce(&FixedTileCache) -> R) -> Option<R> {
        self.lock().caches.get(&cache_id).map(f)
    }

    /// Insert a tile, first evicting globally least-recently-used tiles
    /// until it fits.
    ///
    /// Returns `None` without evicting anything when the cache does not
    /// exist, the origin is outside the cache, or the slot is occupied.
    /// A tile larger than the whole budget is not cached.
    pub fn add_tile(
        &self,
        cache_id: CacheId,
        tile: Arc<ImageData>,
        duplicate: bool,
    ) -> Option<Arc<ImageData>> {
        let mut state = self.lock();
        let tile_id = {
            let cache = state.caches.get(&cache_id)?;
            let id = cache.compute_id(tile.origin())?;
            if cache.contains(id) {
                return None;
            }
            id
        };

        let incoming = tile.data_size_in_bytes();
        if incoming > state.max_size {
            tracing::debug!(
                bytes = incoming,
                max_size = state.max_size,
                "tile larger than cache budget, not cached"
            );
            return None;
        }
        while state.current_size + incoming > state.max_size {
            if !state.evict_lru() {
                break;
            }
        }

        let stored = state.caches.get_mut(&cache_id)?.add_tile(tile, duplicate)?;
        state.current_size += stored.data_size_in_bytes();
        state.order.put((cache_id, tile_id), ());
        Some(stored)
    }

    /// Look up the tile whose slot contains `origin`, counting hits and
    /// misses. A hit becomes the most-recently-used tile in the pool.
    pub fn get_tile(&self, cache_id: CacheId, origin: IntPoint) -> Option<Arc<ImageData>> {
        let mut state = self.lock();
        let found = state.caches.get_mut(&cache_id).and_then(|cache| {
            let id = cache.compute_id(origin)?;
            let tile = cache.get_tile(id)?;
            Some((id, tile, cache.use_lru()))
        });
        match found {
            Some((id, tile, promote)) => {
                state.hits += 1;
                if promote {
                    state.order.promote(&(cache_id, id));
                }
                Some(tile)
            }
            None => {
                state.misses += 1;
                None
            }
        }
    }

    /// Take a tile out of a cache and hand it back.
    pub fn remove_tile(&self, cache_id: CacheId, origin: IntPoint) -> Option<Arc<ImageData>> {
        let mut state = self.lock();
        let cache = state.caches.get_mut(&cache_id)?;
        let id = cache.compute_id(origin)?;
        let tile = cache.remove_tile(id)?;
        state.current_size = state.current_size.saturating_sub(tile.data_size_in_bytes());
        state.order.pop(&(cache_id, id));
        Some(tile)
    }

    /// Drop a tile. Returns whether it was present.
    pub fn delete_tile(&self, cache_id: CacheId, origin: IntPoint) -> bool {
        self.remove_tile(cache_id, origin).is_some()
    }

    /// Evict every tile of one cache that does not intersect `rect`.
    pub fn keep_tiles_within_rect(&self, cache_id: CacheId, rect: &IntRect) -> usize {
        let mut state = self.lock();
        let Some(cache) = state.caches.get_mut(&cache_id) else {
            return 0;
        };
        let before = cache.current_size();
        let removed = cache.keep_tiles_within_rect(rect);
        let freed = before - cache.current_size();
        state.current_size = state.current_size.saturating_sub(freed);
        for id in &removed {
            state.order.pop(&(cache_id, *id));
        }
        removed.len()
    }

    /// Change a cache's geometry. The cache's tiles are flushed.
    pub fn set_cache_rect(&self, cache_id: CacheId, rect: IntRect, tile_width: u32, tile_height: u32) {
        let mut state = self.lock();
        state.drop_cache_tiles(cache_id);
        if let Some(cache) = state.caches.get_mut(&cache_id) {
            cache.set_rect(rect, tile_width, tile_height);
        }
    }

    /// Remove the tiles of one cache, keeping the cache itself.
    pub fn flush_cache(&self, cache_id: CacheId) {
        self.lock().drop_cache_tiles(cache_id);
    }

    /// Remove every tile from every cache.
    pub fn flush(&self) {
        let mut state = self.lock();
        tracing::debug!(
            entries = state.order.len(),
            bytes = state.current_size,
            "flushing tile cache pool"
        );
        for cache in state.caches.values_mut() {
            cache.flush();
        }
        state.order.clear();
        state.current_size = 0;
    }

    /// Change the budget, evicting down to it immediately.
    pub fn set_max_cache_size(&self, max_size: usize) {
        let mut state = self.lock();
        state.max_size = max_size;
        let mut evicted = 0;
        while state.current_size > max_size && state.evict_lru() {
            evicted += 1;
        }
        if evicted > 0 {
            tracing::debug!(evicted, max_size, "shrunk tile cache pool");
        }
    }

    /// Evict least-recently-used tiles until at most `target_bytes` are
    /// cached. Returns the number evicted.
    pub fn evict_to_target(&self, target_bytes: usize) -> usize {
        let mut state = self.lock();
        let mut evicted = 0;
        while state.current_size > target_bytes && state.evict_lru() {
            evicted += 1;
        }
        evicted
    }

    pub fn max_cache_size(&self) -> usize {
        self.lock().max_size
    }

    /// Bytes held across every cache.
    pub fn current_cache_size(&self) -> usize {
        self.lock().current_size
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            entries: state.order.len(),
            memory_bytes: state.current_size as u64,
            evictions: state.evictions,
        }
    }

    /// Every cached tile, least-recently-used first.
    pub fn lru_order(&self) -> Vec<(CacheId, TileId)> {
        self.lock().order.iter().rev().map(|(key, _)| *key).collect()
    }
}

impl Default for TileCachePool {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

impl PoolState {
    /// Evict the globally least-recently-used tile. False when empty.
    fn evict_lru(&mut self) -> bool {
        let Some(((cache_id, tile_id), ())) = self.order.pop_lru() else {
            return false;
        };
        if let Some(tile) = self
            .caches
            .get_mut(&cache_id)
            .and_then(|cache| cache.remove_tile(tile_id))
        {
            self.current_size = self.current_size.saturating_sub(tile.data_size_in_bytes());
            tracing::debug!(cache_id, tile_id, bytes = tile.data_size_in_bytes(), "evicted tile");
        }
        self.evictions += 1;
        true
    }

    fn drop_cache_tiles(&mut self, cache_id: CacheId) {
        let Some(cache) = self.caches.get_mut(&cache_id) else {
            return;
        };
        self.current_size = self.current_size.saturating_sub(cache.current_size());
        for id in cache.ids() {
            self.order.pop(&(cache_id, id));
        }
        cache.flush();
    }
}
