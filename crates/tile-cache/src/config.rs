//! Configuration for the tile cache pool.

use serde::{Deserialize, Serialize};

/// Tile dimension used when none (or zero) is configured.
pub const DEFAULT_TILE_SIZE: u32 = 64;

/// Configuration for the tile cache pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Memory budget shared by every cache in the pool, in megabytes.
    pub max_cache_size_mb: usize,

    /// Tile width in pixels for caches created by a cached tile source.
    pub tile_width: u32,

    /// Tile height in pixels for caches created by a cached tile source.
    pub tile_height: u32,

    /// Promote tiles to most-recently-used on every hit.
    pub use_lru: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_cache_size_mb: 256,
            tile_width: DEFAULT_TILE_SIZE,
            tile_height: DEFAULT_TILE_SIZE,
            use_lru: true,
        }
    }
}

impl CacheConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("TILE_CACHE_SIZE_MB") {
            if let Ok(size) = val.parse() {
                config.max_cache_size_mb = size;
            }
        }

        if let Ok(val) = std::env::var("TILE_CACHE_TILE_WIDTH") {
            if let Ok(size) = val.parse() {
                config.tile_width = size;
            }
        }

        if let Ok(val) = std::env::var("TILE_CACHE_TILE_HEIGHT") {
            if let Ok(size) = val.parse() {
                config.tile_height = size;
            }
        }

        if let Ok(val) = std::env::var("TILE_CACHE_USE_LRU") {
            config.use_lru = val.to_lowercase() == "true" || val == "1";
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_cache_size_mb == 0 {
            return Err("max_cache_size_mb must be > 0".to_string());
        }

        if self.tile_width == 0 || self.tile_height == 0 {
            return Err("tile dimensions must be > 0".to_string());
        }

        Ok(())
    }

    /// Get the cache budget in bytes.
    pub fn max_cache_size_bytes(&self) -> usize {
        self.max_cache_size_mb * 1024 * 1024
    }

    /// Tile size with zero dimensions replaced by the default.
    pub fn tile_size(&self) -> (u32, u32) {
        (
            if self.tile_width == 0 { DEFAULT_TILE_SIZE } else { self.tile_width },
            if self.tile_height == 0 { DEFAULT_TILE_SIZE } else { self.tile_height },
        )
    }
}
