//! The resampler and its two entry points.

use std::mem::discriminant;

use raster_common::{
    with_sample_pair, DPoint, DataObjectStatus, ImageData, IntRect, KeywordList, StatePersistence,
};

use crate::kernel::{scan_band, BandContext, Kernel, Planes, Scan};
use crate::types::ResamplerType;
use crate::weights::{rows_for_ratio, WeightTable, DEFAULT_CUBIC_PARAMETER, TABLE_RESOLUTION};

/// A quadrilateral scan of the input.
///
/// Output row `r` runs from `ul + r * delta_ul` to `ur + r * delta_ur` in
/// input pixel coordinates, advancing `(right - left) / length` per output
/// pixel. A zero `length` keeps every pixel of a row at its left edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadScan {
    pub ul: DPoint,
    pub ur: DPoint,
    pub delta_ul: DPoint,
    pub delta_ur: DPoint,
    pub length: f64,
}

impl QuadScan {
    pub fn new(ul: DPoint, ur: DPoint, delta_ul: DPoint, delta_ur: DPoint, length: f64) -> Self {
        Self {
            ul,
            ur,
            delta_ul,
            delta_ur,
            length,
        }
    }

    /// An axis-aligned scan equivalent to a uniform `ratio`, for an output
    /// rectangle `output`.
    pub fn from_ratio(output: &IntRect, ratio: DPoint) -> Self {
        let to_input = |x: f64, y: f64| DPoint::new((x + 0.5) / ratio.x - 0.5, (y + 0.5) / ratio.y - 0.5);
        let ul = output.ul();
        let width = output.width() as f64;
        Self {
            ul: to_input(ul.x as f64, ul.y as f64),
            ur: to_input(ul.x as f64 + width, ul.y as f64),
            delta_ul: DPoint::new(0.0, 1.0 / ratio.y),
            delta_ur: DPoint::new(0.0, 1.0 / ratio.y),
            length: width,
        }
    }

    fn as_scan(&self) -> Scan {
        Scan::Quad {
            ul: self.ul,
            ur: self.ur,
            delta_ul: self.delta_ul,
            delta_ur: self.delta_ur,
            length: self.length,
        }
    }
}

/// Symmetric-kernel resampler.
///
/// Weight tables are regenerated lazily on the next resample after the
/// kernel, the cubic parameter or the required table size changes.
#[derive(Debug, Clone)]
pub struct Resampler {
    resampler_type: ResamplerType,
    cubic_parameter: f64,
    ratio: DPoint,
    table_rows: usize,
    table: Option<WeightTable>,
    dirty: bool,
    table_generation: u64,
}

impl Default for Resampler {
    fn default() -> Self {
        Self::new(ResamplerType::default())
    }
}

impl Resampler {
    pub fn new(resampler_type: ResamplerType) -> Self {
        Self {
            resampler_type,
            cubic_parameter: DEFAULT_CUBIC_PARAMETER,
            ratio: DPoint::new(1.0, 1.0),
            table_rows: TABLE_RESOLUTION,
            table: None,
            dirty: true,
            table_generation: 0,
        }
    }

    pub fn resampler_type(&self) -> ResamplerType {
        self.resampler_type
    }

    /// Switch kernels. The weight table is rebuilt on next use.
    pub fn set_resampler_type(&mut self, resampler_type: ResamplerType) {
        if resampler_type != self.resampler_type {
            self.resampler_type = resampler_type;
            self.dirty = true;
        }
    }

    pub fn ratio(&self) -> DPoint {
        self.ratio
    }

    /// Set the output-to-input ratio per axis. Non-positive or non-finite
    /// components are treated as 1. The table is rebuilt only when the
    /// resolution it needs changes.
    pub fn set_ratio(&mut self, ratio: DPoint) {
        let sanitize = |v: f64| if v.is_finite() && v > 0.0 { v } else { 1.0 };
        self.ratio = DPoint::new(sanitize(ratio.x), sanitize(ratio.y));
        let rows = rows_for_ratio(self.ratio.x.max(self.ratio.y));
        if rows != self.table_rows {
            self.table_rows = rows;
            self.dirty = true;
        }
    }

    /// Same ratio on both axes.
    pub fn set_uniform_ratio(&mut self, ratio: f64) {
        self.set_ratio(DPoint::new(ratio, ratio));
    }

    pub fn cubic_parameter(&self) -> f64 {
        self.cubic_parameter
    }

    /// Set the cubic shape parameter, clamped to `[-1, 0]`.
    pub fn set_cubic_parameter(&mut self, parameter: f64) {
        let clamped = if parameter.is_nan() {
            DEFAULT_CUBIC_PARAMETER
        } else {
            parameter.clamp(-1.0, 0.0)
        };
        if clamped != self.cubic_parameter {
            self.cubic_parameter = clamped;
            if self.resampler_type == ResamplerType::Bicubic {
                self.dirty = true;
            }
        }
    }

    /// Rows in the current weight table.
    pub fn table_rows(&self) -> usize {
        self.table_rows
    }

    /// Incremented every time the weight table is rebuilt.
    pub fn table_generation(&self) -> u64 {
        self.table_generation
    }

    /// The current weight table, rebuilding it if stale. `None` for kernels
    /// that do not convolve.
    pub fn weight_table(&mut self) -> Option<&WeightTable> {
        self.ensure_table();
        self.table.as_ref()
    }

    fn ensure_table(&mut self) {
        if !self.dirty {
            return;
        }
        self.table = WeightTable::for_kernel(self.resampler_type, self.table_rows, self.cubic_parameter);
        self.dirty = false;
        if self.table.is_some() {
            self.table_generation += 1;
            tracing::trace!(
                kernel = %self.resampler_type,
                rows = self.table_rows,
                cubic_parameter = self.cubic_parameter,
                "regenerated weight table"
            );
        }
    }

    /// Resample `input` into `output` at the configured ratio.
    ///
    /// Output pixel `(x, y)` samples input position
    /// `((x + 0.5) / ratio.x - 0.5, (y + 0.5) / ratio.y - 0.5)`; both
    /// rectangles are in their own image's absolute coordinates.
    pub fn resample(&mut self, input: &ImageData, output: &mut ImageData) {
        let sub = output.image_rect();
        self.run(input, output, &sub, Scan::Ratio(self.ratio));
    }

    /// Resample along a quadrilateral scan covering the whole output tile.
    pub fn resample_quad(&mut self, input: &ImageData, output: &mut ImageData, scan: &QuadScan) {
        let sub = output.image_rect();
        self.run(input, output, &sub, scan.as_scan());
    }

    /// Resample along a quadrilateral scan into `sub_rect` of the output
    /// only. Row and column zero of the scan are the upper-left pixel of
    /// `sub_rect`; output pixels outside it are left untouched.
    pub fn resample_quad_clipped(
        &mut self,
        input: &ImageData,
        output: &mut ImageData,
        sub_rect: &IntRect,
        scan: &QuadScan,
    ) {
        self.run(input, output, sub_rect, scan.as_scan());
    }

    fn run(&mut self, input: &ImageData, output: &mut ImageData, sub_rect: &IntRect, scan: Scan) {
        let Some(sub) = sub_rect.intersection(&output.image_rect()) else {
            return;
        };
        let clipped = sub != *sub_rect;
        // A clipped sub-rect keeps the scan anchored at the requested corner.
        let scan = if clipped { reanchor(scan, sub_rect, &sub) } else { scan };

        // The cached status can lag writes made through band_mut/set_value.
        if matches!(input.scan_status(), DataObjectStatus::Null | DataObjectStatus::Empty) {
            fill_null(output, &sub);
            output.validate();
            return;
        }

        if self.resampler_type == ResamplerType::None {
            output.load_tile(input);
            return;
        }

        self.ensure_table();
        let kernel = match (&self.table, self.resampler_type) {
            (Some(table), ResamplerType::Bilinear | ResamplerType::Bicubic) => Kernel::Convolve(table),
            _ => Kernel::Nearest,
        };
        let src_rect = input.image_rect();
        let dst_rect = output.image_rect();
        let full = scan.covers(&sub, &src_rect, &kernel);
        let bands = input.number_of_bands().min(output.number_of_bands());
        let same_storage = discriminant(input.buffer()) == discriminant(output.buffer());

        for band in 0..bands {
            let ctx = BandContext {
                in_null: input.null_pix(band),
                out_null: output.null_pix(band),
                out_min: output.min_pix(band),
                out_max: output.max_pix(band),
            };
            if same_storage {
                let in_plane = band * input.plane_len()..(band + 1) * input.plane_len();
                let out_plane = band * output.plane_len()..(band + 1) * output.plane_len();
                with_sample_pair!(
                    input.buffer(),
                    output.buffer_mut(),
                    (s, d) => {
                        if let (Some(src), Some(dst)) = (s.get(in_plane), d.get_mut(out_plane)) {
                            let planes = Planes { src, src_rect, dst, dst_rect };
                            scan_band(planes, &sub, &scan, &kernel, &ctx, full);
                        }
                    },
                    _ => {}
                );
            } else {
                let src = input.band_values(band);
                let mut dst = output.band_values(band);
                let planes = Planes {
                    src: &src,
                    src_rect,
                    dst: &mut dst,
                    dst_rect,
                };
                scan_band(planes, &sub, &scan, &kernel, &ctx, full);
                output.set_band_values(band, &dst);
            }
        }
        output.validate();
    }
}

/// Shift a quad scan so that it starts at `clipped.ul()` instead of
/// `requested.ul()`. Ratio scans are absolute and need no shift.
fn reanchor(scan: Scan, requested: &IntRect, clipped: &IntRect) -> Scan {
    match scan {
        Scan::Ratio(_) => scan,
        Scan::Quad {
            ul,
            ur,
            delta_ul,
            delta_ur,
            length,
        } => {
            let rows = (clipped.ul().y - requested.ul().y) as f64;
            let cols = (clipped.ul().x - requested.ul().x) as f64;
            let left = ul + delta_ul * rows;
            let right = ur + delta_ur * rows;
            let step = if length == 0.0 || !length.is_finite() {
                DPoint::new(0.0, 0.0)
            } else {
                (right - left) / length
            };
            let shift = step * cols;
            Scan::Quad {
                ul: left + shift,
                ur: right + shift,
                delta_ul,
                delta_ur,
                length,
            }
        }
    }
}

fn fill_null(output: &mut ImageData, sub: &IntRect) {
    for band in 0..output.number_of_bands() {
        let null = output.null_pix(band);
        for y in sub.ul().y..=sub.lr().y {
            for x in sub.ul().x..=sub.lr().x {
                output.set_value(band, x, y, null);
            }
        }
    }
}

impl StatePersistence for Resampler {
    fn save_state(&self, kwl: &mut KeywordList, prefix: &str) {
        kwl.add(prefix, "type", self.resampler_type);
        kwl.add(prefix, "cubic_parameter", self.cubic_parameter);
        kwl.add_point(prefix, "ratio", self.ratio);
    }

    fn load_state(&mut self, kwl: &KeywordList, prefix: &str) -> raster_common::Result<()> {
        if let Some(name) = kwl.find(prefix, "type") {
            self.set_resampler_type(ResamplerType::from_str(name));
        }
        if let Some(p) = kwl.find_parsed::<f64>(prefix, "cubic_parameter")? {
            self.set_cubic_parameter(p);
        }
        if let Some(ratio) = kwl.find_point(prefix, "ratio")? {
            self.set_ratio(ratio);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_common::ScalarType;

    #[test]
    fn test_cubic_parameter_is_clamped() {
        let mut r = Resampler::new(ResamplerType::Bicubic);
        r.set_cubic_parameter(-3.0);
        assert_eq!(r.cubic_parameter(), -1.0);
        r.set_cubic_parameter(0.5);
        assert_eq!(r.cubic_parameter(), 0.0);
        r.set_cubic_parameter(f64::NAN);
        assert_eq!(r.cubic_parameter(), DEFAULT_CUBIC_PARAMETER);
    }

    #[test]
    fn test_table_regenerates_lazily() {
        let mut r = Resampler::new(ResamplerType::Bilinear);
        assert_eq!(r.table_generation(), 0);
        r.weight_table();
        assert_eq!(r.table_generation(), 1);

        // Same table resolution: no rebuild.
        r.set_uniform_ratio(0.5);
        r.set_uniform_ratio(1.0);
        r.weight_table();
        assert_eq!(r.table_generation(), 1);

        r.set_uniform_ratio(3.0);
        assert_eq!(r.weight_table().map(WeightTable::rows), Some(3 * TABLE_RESOLUTION));
        assert_eq!(r.table_generation(), 2);

        // The cubic parameter only matters for bicubic.
        r.set_cubic_parameter(-0.75);
        r.weight_table();
        assert_eq!(r.table_generation(), 2);

        r.set_resampler_type(ResamplerType::Bicubic);
        assert_eq!(r.weight_table().map(WeightTable::width), Some(4));
        assert_eq!(r.table_generation(), 3);
        r.set_cubic_parameter(-0.25);
        r.weight_table();
        assert_eq!(r.table_generation(), 4);
    }

    #[test]
    fn test_nearest_has_no_table() {
        let mut r = Resampler::new(ResamplerType::NearestNeighbor);
        assert!(r.weight_table().is_none());
        assert_eq!(r.table_generation(), 0);
    }

    #[test]
    fn test_invalid_ratio_defaults_to_one() {
        let mut r = Resampler::default();
        r.set_ratio(DPoint::new(0.0, f64::NAN));
        assert_eq!(r.ratio(), DPoint::new(1.0, 1.0));
    }

    #[test]
    fn test_none_copies_through() {
        let input = ImageData::from_samples(IntRect::new(0, 0, 2, 2), 1, vec![1u8, 2, 3, 4]);
        let mut output = ImageData::new(ScalarType::UInt8, 1, IntRect::new(1, 1, 2, 2));
        Resampler::new(ResamplerType::None).resample(&input, &mut output);
        assert_eq!(output.value(0, 1, 1), 4.0);
        assert_eq!(output.value(0, 2, 2), 0.0);
    }

    #[test]
    fn test_empty_input_gives_null_output() {
        let input = ImageData::new(ScalarType::Float32, 1, IntRect::new(0, 0, 4, 4));
        let mut output = ImageData::from_samples(IntRect::new(0, 0, 4, 4), 1, vec![1.0f32; 16]);
        Resampler::new(ResamplerType::Bicubic).resample(&input, &mut output);
        assert_eq!(output.status(), DataObjectStatus::Empty);
    }

    #[test]
    fn test_state_roundtrip() {
        let mut r = Resampler::new(ResamplerType::Bicubic);
        r.set_cubic_parameter(-0.75);
        r.set_ratio(DPoint::new(2.0, 0.5));
        let mut kwl = KeywordList::new();
        r.save_state(&mut kwl, "resampler.");

        let mut restored = Resampler::default();
        restored.load_state(&kwl, "resampler.").unwrap();
        assert_eq!(restored.resampler_type(), ResamplerType::Bicubic);
        assert_eq!(restored.cubic_parameter(), -0.75);
        assert_eq!(restored.ratio(), DPoint::new(2.0, 0.5));
    }
}
