//! Tiled image-data caching.
//!
//! Decoded tiles are expensive to produce and large, so every tile a
//! pipeline requests is kept in a bounded, shared pool:
//!
//! - [`FixedTileCache`] maps a tile's origin inside a fixed, tile-aligned
//!   rectangle to a dense integer id and keeps the tiles in LRU order.
//! - [`TileCachePool`] owns any number of fixed caches and enforces one
//!   global byte budget across all of them, evicting the globally
//!   least-recently-used tile before every insertion that would overflow.
//! - [`CachedTileSource`] puts a pool in front of any [`TileProvider`],
//!   with one fixed cache per resolution level.
//!
//! # Architecture
//!
//! ```text
//! consumer.tile(rect, level)
//!      │
//!      ▼
//! CachedTileSource
//!      │
//!      ├─► compute tile origins covering rect
//!      │
//!      ├─► TileCachePool::get_tile(cache_id, origin)
//!      │         │
//!      │         ├─► hit: promote to MRU, return shared tile
//!      │         │
//!      │         └─► miss: upstream.tile(..), evict LRU until it fits,
//!      │                   FixedTileCache::add_tile
//!      │
//!      └─► assemble tiles into the requested rect
//! ```
//!
//! The pool is an ordinary value: construct one per pipeline or session
//! and hand out `Arc<TileCachePool>` clones to the components that need it.
//!
//! [`TileProvider`]: raster_common::TileProvider

pub mod config;
pub mod fixed;
pub mod pool;
pub mod source;
pub mod types;

pub use config::CacheConfig;
pub use fixed::FixedTileCache;
pub use pool::TileCachePool;
pub use source::CachedTileSource;
pub use types::{CacheId, CacheStats, TileId};
