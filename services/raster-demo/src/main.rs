//! Raster pipeline demo.
//!
//! Runs the full tile path over a synthetic elevation surface:
//! - Surface built from sparse posts on an interpolation grid
//! - Tiles served through a shared, byte-bounded cache pool
//! - Downsampled view rendered with the configured resampler
//! - Rotated view rendered along quadrilateral scans from an affine view transform
//!
//! Repeated passes show the cache absorbing upstream work.

mod surface;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use point_transform::{AffineTransform, Transform2d};
use raster_common::{
    DPoint, DataObjectStatus, IntPoint, IntRect, KeywordList, StatePersistence, TileProvider,
};
use resampler::{QuadScan, Resampler, ResamplerType};
use tile_cache::{CacheConfig, CachedTileSource, TileCachePool};
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use surface::SurfaceProvider;

/// Input pixels read beyond a scan's footprint, enough for the bicubic kernel.
const KERNEL_MARGIN: i32 = 2;

#[derive(Parser, Debug)]
#[command(name = "raster-demo")]
#[command(about = "Cached, resampled rendering of a synthetic raster surface")]
struct Args {
    /// Width and height of the synthetic image in pixels
    #[arg(long, env = "RASTER_IMAGE_SIZE", default_value = "1024")]
    image_size: u32,

    /// Elevation posts per side of the surface grid
    #[arg(long, default_value = "17")]
    posts: usize,

    /// Decay rate used when filling unmeasured posts
    #[arg(long, default_value = "4.0")]
    decay_rate: f64,

    /// Cache tile size in pixels (overrides TILE_CACHE_TILE_WIDTH/HEIGHT)
    #[arg(long)]
    tile_size: Option<u32>,

    /// Cache pool budget in megabytes (overrides TILE_CACHE_SIZE_MB)
    #[arg(long)]
    cache_mb: Option<usize>,

    /// Resampling kernel: none, nearest, bilinear, bicubic
    #[arg(long, env = "RESAMPLER_TYPE", default_value = "bilinear")]
    resampler: String,

    /// Bicubic shape parameter, clamped to [-1, 0]
    #[arg(long, default_value = "-0.5")]
    cubic_parameter: f64,

    /// Output-to-input ratio of the rendered views
    #[arg(long, default_value = "0.5")]
    ratio: f64,

    /// Rotation of the second view in degrees
    #[arg(long, default_value = "30")]
    rotation: f64,

    /// Number of times each view is rendered
    #[arg(long, default_value = "2")]
    passes: u32,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = CacheConfig::from_env();
    if let Some(size) = args.tile_size {
        config.tile_width = size;
        config.tile_height = size;
    }
    if let Some(mb) = args.cache_mb {
        config.max_cache_size_mb = mb;
    }
    config.validate().map_err(anyhow::Error::msg)?;
    if !(args.ratio.is_finite() && args.ratio > 0.0) {
        anyhow::bail!("ratio must be a positive number, got {}", args.ratio);
    }

    info!(
        image_size = args.image_size,
        tile_width = config.tile_width,
        tile_height = config.tile_height,
        cache_mb = config.max_cache_size_mb,
        resampler = %args.resampler,
        "Starting raster demo"
    );

    let pool = Arc::new(TileCachePool::new(&config));
    let provider = SurfaceProvider::new(args.image_size, args.posts, args.decay_rate);
    let source = CachedTileSource::new(provider, Arc::clone(&pool), &config);

    let mut resampler = Resampler::new(ResamplerType::from_str(&args.resampler));
    resampler.set_uniform_ratio(args.ratio);
    resampler.set_cubic_parameter(args.cubic_parameter);

    let mut state = KeywordList::new();
    resampler.save_state(&mut state, "resampler.");
    debug!(state = %state, "Resampler configured");

    let out_size = (args.image_size as f64 * args.ratio).ceil().max(1.0) as u32;
    let out_rect = IntRect::new(0, 0, out_size, out_size);
    let (tile_width, tile_height) = config.tile_size();

    for pass in 1..=args.passes {
        let full = render_scaled(&source, &mut resampler, &out_rect, tile_width, tile_height);
        report("scaled", pass, full, &source, &pool);
    }

    let view = view_transform(args.image_size, out_size, args.ratio, args.rotation.to_radians());
    for pass in 1..=args.passes {
        let full = render_rotated(&source, &mut resampler, &view, &out_rect, tile_width, tile_height);
        report("rotated", pass, full, &source, &pool);
    }

    drop(source);
    info!(
        caches = pool.number_of_caches(),
        bytes = pool.current_cache_size(),
        "Demo finished"
    );

    Ok(())
}

fn report(
    view: &str,
    pass: u32,
    full_tiles: usize,
    source: &CachedTileSource<SurfaceProvider>,
    pool: &TileCachePool,
) {
    let stats = pool.stats();
    info!(
        view,
        pass,
        full_tiles,
        upstream_fetches = source.source().fetch_count(),
        hits = stats.hits,
        misses = stats.misses,
        entries = stats.entries,
        memory_bytes = stats.memory_bytes,
        evictions = stats.evictions,
        hit_rate = %format!("{:.1}%", stats.hit_rate() * 100.0),
        "Render pass complete"
    );
}

/// Output tiles covering `rect`, clipped at its right and bottom edges.
fn output_tiles(rect: &IntRect, tile_width: u32, tile_height: u32) -> Vec<IntRect> {
    let mut tiles = Vec::new();
    let mut y = rect.ul().y;
    while y <= rect.lr().y {
        let mut x = rect.ul().x;
        while x <= rect.lr().x {
            if let Some(tile) = IntRect::new(x, y, tile_width, tile_height).intersection(rect) {
                tiles.push(tile);
            }
            x += tile_width as i32;
        }
        y += tile_height as i32;
    }
    tiles
}

/// Input rectangle holding every pixel a kernel can touch around `points`.
fn input_window(points: &[DPoint], bounds: &IntRect) -> Option<IntRect> {
    if points.is_empty() || points.iter().any(DPoint::has_nan) {
        return None;
    }
    let min_x = points.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
    let max_x = points.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
    let min_y = points.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
    let max_y = points.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);

    let clamp = |v: f64| v.clamp(i32::MIN as f64 / 2.0, i32::MAX as f64 / 2.0) as i32;
    let window = IntRect::from_corners(
        IntPoint::new(clamp(min_x.floor()) - KERNEL_MARGIN, clamp(min_y.floor()) - KERNEL_MARGIN),
        IntPoint::new(clamp(max_x.ceil()) + KERNEL_MARGIN, clamp(max_y.ceil()) + KERNEL_MARGIN),
    );
    window.intersection(bounds)
}

/// Render the axis-aligned view at the resampler's ratio. Returns the
/// number of fully valid output tiles.
fn render_scaled<P: TileProvider>(
    source: &P,
    resampler: &mut Resampler,
    out_rect: &IntRect,
    tile_width: u32,
    tile_height: u32,
) -> usize {
    let Some(bounds) = source.bounding_rect(0) else {
        return 0;
    };
    let ratio = resampler.ratio();
    let to_input = |x: i32, y: i32| {
        DPoint::new(
            (x as f64 + 0.5) / ratio.x - 0.5,
            (y as f64 + 0.5) / ratio.y - 0.5,
        )
    };

    let mut full = 0;
    for tile_rect in output_tiles(out_rect, tile_width, tile_height) {
        let corners = [
            to_input(tile_rect.ul().x, tile_rect.ul().y),
            to_input(tile_rect.lr().x, tile_rect.lr().y),
        ];
        let mut output = source.blank_tile(&tile_rect);
        if let Some(input) = input_window(&corners, &bounds).and_then(|w| source.tile(&w, 0)) {
            resampler.resample(&input, &mut output);
        }
        if output.status() == DataObjectStatus::Full {
            full += 1;
        }
    }
    full
}

/// Affine view mapping input pixels onto the output: scale by `ratio` and
/// rotate by `angle` about the image center, which lands on the output
/// center.
fn view_transform(image_size: u32, out_size: u32, ratio: f64, angle: f64) -> AffineTransform {
    let scale = DPoint::new(ratio, ratio);
    let image_center = DPoint::new(image_size as f64 / 2.0, image_size as f64 / 2.0);
    let out_center = DPoint::new(out_size as f64 / 2.0, out_size as f64 / 2.0);
    let unshifted = AffineTransform::from_parts(scale, angle, DPoint::new(0.0, 0.0));
    let translation = out_center - unshifted.forward(image_center);
    AffineTransform::from_parts(scale, angle, translation)
}

/// Render the rotated view, one quadrilateral scan per output tile.
fn render_rotated<P: TileProvider>(
    source: &P,
    resampler: &mut Resampler,
    view: &AffineTransform,
    out_rect: &IntRect,
    tile_width: u32,
    tile_height: u32,
) -> usize {
    let Some(bounds) = source.bounding_rect(0) else {
        return 0;
    };

    let mut full = 0;
    for tile_rect in output_tiles(out_rect, tile_width, tile_height) {
        let ul = DPoint::from(tile_rect.ul());
        let width = tile_rect.width() as f64;
        let height = tile_rect.height() as f64;

        let ul_in = view.inverse(ul);
        let ur_in = view.inverse(ul + DPoint::new(width, 0.0));
        let delta = view.inverse(ul + DPoint::new(0.0, 1.0)) - ul_in;
        let scan = QuadScan::new(ul_in, ur_in, delta, delta, width);

        let footprint = [
            ul_in,
            ur_in,
            view.inverse(ul + DPoint::new(0.0, height)),
            view.inverse(ul + DPoint::new(width, height)),
        ];
        let mut output = source.blank_tile(&tile_rect);
        if let Some(input) = input_window(&footprint, &bounds).and_then(|w| source.tile(&w, 0)) {
            resampler.resample_quad(&input, &mut output, &scan);
        }
        if output.status() == DataObjectStatus::Full {
            full += 1;
        }
    }
    full
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_tiles_clip_edges() {
        let tiles = output_tiles(&IntRect::new(0, 0, 100, 70), 64, 64);
        assert_eq!(tiles.len(), 4);
        assert_eq!(tiles[1], IntRect::new(64, 0, 36, 64));
        assert_eq!(tiles[3], IntRect::new(64, 64, 36, 6));
    }

    #[test]
    fn test_input_window_adds_margin_and_clips() {
        let bounds = IntRect::new(0, 0, 100, 100);
        let window = input_window(&[DPoint::new(10.2, 20.7), DPoint::new(30.5, 40.0)], &bounds);
        assert_eq!(window, Some(IntRect::new(8, 18, 26, 25)));

        let edge = input_window(&[DPoint::new(-5.0, -5.0), DPoint::new(1.0, 1.0)], &bounds);
        assert_eq!(edge, Some(IntRect::new(0, 0, 4, 4)));

        assert_eq!(input_window(&[DPoint::new(500.0, 500.0)], &bounds), None);
    }

    #[test]
    fn test_view_transform_keeps_center() {
        let view = view_transform(1000, 500, 0.5, 0.7);
        let center = view.forward(DPoint::new(500.0, 500.0));
        assert!((center.x - 250.0).abs() < 1e-9);
        assert!((center.y - 250.0).abs() < 1e-9);
    }
}
