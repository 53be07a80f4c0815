//! Tests for the cached tile source in front of a mock provider.

use std::sync::Arc;

use raster_common::{DataObjectStatus, IntRect, TileProvider};
use test_utils::{pattern_value, rects, MockTileProvider};
use tile_cache::{CacheConfig, CachedTileSource, TileCachePool};

fn config(tile: u32) -> CacheConfig {
    CacheConfig {
        tile_width: tile,
        tile_height: tile,
        ..CacheConfig::default()
    }
}

#[test]
fn test_aligned_tile_is_fetched_once() {
    let pool = Arc::new(TileCachePool::default());
    let source = CachedTileSource::new(MockTileProvider::new(rects::IMAGE_256, 1), pool.clone(), &config(64));
    let rect = IntRect::new(64, 64, 64, 64);

    let a = source.tile(&rect, 0).unwrap();
    let b = source.tile(&rect, 0).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(source.source().fetch_count(), 1);

    let stats = pool.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.entries, 1);
}

#[test]
fn test_unaligned_request_is_assembled_from_tiles() {
    let pool = Arc::new(TileCachePool::default());
    let source = CachedTileSource::new(MockTileProvider::new(rects::IMAGE_256, 1), pool.clone(), &config(32));
    let rect = IntRect::new(20, 10, 40, 30);

    let tile = source.tile(&rect, 0).unwrap();
    assert_eq!(tile.image_rect(), rect);
    assert_eq!(tile.status(), DataObjectStatus::Full);
    for (x, y) in [(20, 10), (59, 39), (31, 31), (32, 32)] {
        assert_eq!(tile.value(0, x, y), pattern_value(x, y, 0));
    }
    // 40x30 at (20, 10) touches columns 0..=1 and rows 0..=1 of 32px tiles.
    assert_eq!(source.source().fetch_count(), 4);

    source.tile(&IntRect::new(0, 0, 64, 64), 0).unwrap();
    assert_eq!(source.source().fetch_count(), 4);
}

#[test]
fn test_request_outside_image_is_blank() {
    let pool = Arc::new(TileCachePool::default());
    let source = CachedTileSource::new(MockTileProvider::new(rects::IMAGE_256, 1), pool, &config(64));
    let tile = source.tile(&IntRect::new(1000, 1000, 16, 16), 0).unwrap();
    assert_eq!(tile.status(), DataObjectStatus::Empty);
    assert_eq!(source.source().fetch_count(), 0);
}

#[test]
fn test_each_resolution_level_has_its_own_cache() {
    let pool = Arc::new(TileCachePool::default());
    let provider = MockTileProvider::new(rects::IMAGE_256, 1).with_levels(3);
    let source = CachedTileSource::new(provider, pool.clone(), &config(32));
    let rect = IntRect::new(0, 0, 32, 32);

    source.tile(&rect, 0).unwrap();
    source.tile(&rect, 1).unwrap();
    source.tile(&rect, 2).unwrap();
    source.tile(&rect, 1).unwrap();

    assert_eq!(pool.number_of_caches(), 3);
    assert_eq!(source.source().fetch_count(), 3);
    assert!(source.tile(&rect, 3).is_none());
}

#[test]
fn test_dropping_source_releases_its_caches() {
    let pool = Arc::new(TileCachePool::default());
    {
        let source = CachedTileSource::new(MockTileProvider::new(rects::IMAGE_256, 1), pool.clone(), &config(64));
        source.tile(&IntRect::new(0, 0, 64, 64), 0).unwrap();
        assert_eq!(pool.current_cache_size(), 64 * 64 * 4);
    }
    assert_eq!(pool.number_of_caches(), 0);
    assert_eq!(pool.current_cache_size(), 0);
}

#[test]
fn test_band_selection_flushes_cached_tiles() {
    let pool = Arc::new(TileCachePool::default());
    let mut source = CachedTileSource::new(MockTileProvider::new(rects::IMAGE_256, 3), pool.clone(), &config(64));
    let rect = IntRect::new(0, 0, 64, 64);
    source.tile(&rect, 0).unwrap();

    assert!(source.band_selector_mut().unwrap().set_output_bands(&[1]));
    assert_eq!(source.number_of_output_bands(), 1);
    assert_eq!(source.band_selector().unwrap().selected_bands(), vec![1]);

    let tile = source.tile(&rect, 0).unwrap();
    assert_eq!(tile.number_of_bands(), 1);
    assert_eq!(tile.value(0, 5, 6), pattern_value(5, 6, 1));
    assert_eq!(source.source().fetch_count(), 2);
}
