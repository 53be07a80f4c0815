//! Core types for tile caching.

use serde::{Deserialize, Serialize};

/// Linear index of a tile inside a fixed cache's addressable rectangle:
/// `tile_row * tiles_horizontal + tile_col`.
pub type TileId = i32;

/// Identifier of one fixed cache inside a pool.
pub type CacheId = u32;

/// Statistics about a tile cache pool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub memory_bytes: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the cache hit rate (0.0 - 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
