//! Per-band scan loops, monomorphized per sample type.

use raster_common::{DPoint, IntPoint, IntRect, Sample};

use crate::weights::WeightTable;

/// How output pixels map to continuous input positions. A position of
/// `(x, y)` with integer coordinates is the center of input pixel `(x, y)`.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Scan {
    /// Uniform output-to-input ratio in absolute image coordinates.
    Ratio(DPoint),
    /// Scanlines interpolated between two moving edges.
    Quad {
        ul: DPoint,
        ur: DPoint,
        delta_ul: DPoint,
        delta_ur: DPoint,
        length: f64,
    },
}

impl Scan {
    /// Input position of the first pixel of output row `y` and the
    /// per-pixel step along that row.
    #[inline]
    pub(crate) fn row(&self, sub: &IntRect, y: i32) -> (DPoint, DPoint) {
        match *self {
            Scan::Ratio(ratio) => {
                let start = DPoint::new(
                    (sub.ul().x as f64 + 0.5) / ratio.x - 0.5,
                    (y as f64 + 0.5) / ratio.y - 0.5,
                );
                (start, DPoint::new(1.0 / ratio.x, 0.0))
            }
            Scan::Quad {
                ul,
                ur,
                delta_ul,
                delta_ur,
                length,
            } => {
                let r = (y - sub.ul().y) as f64;
                let left = ul + delta_ul * r;
                let right = ur + delta_ur * r;
                let step = if length == 0.0 || !length.is_finite() {
                    DPoint::new(0.0, 0.0)
                } else {
                    (right - left) / length
                };
                (left, step)
            }
        }
    }

    #[inline]
    pub(crate) fn position(&self, sub: &IntRect, x: i32, y: i32) -> DPoint {
        let (start, step) = self.row(sub, y);
        start + step * (x - sub.ul().x) as f64
    }

    /// True when every input pixel the kernel touches for any output pixel
    /// in `sub` lies inside `input`. Positions are bilinear in the output
    /// coordinates, so the four corners bound the whole scan.
    pub(crate) fn covers(&self, sub: &IntRect, input: &IntRect, kernel: &Kernel<'_>) -> bool {
        let ul = sub.ul();
        let lr = sub.lr();
        let corners = [
            self.position(sub, ul.x, ul.y),
            self.position(sub, lr.x, ul.y),
            self.position(sub, ul.x, lr.y),
            self.position(sub, lr.x, lr.y),
        ];
        if corners.iter().any(DPoint::has_nan) {
            return false;
        }
        let min_x = corners.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
        let max_x = corners.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
        let min_y = corners.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
        let max_y = corners.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);

        let (lo_x, hi_x, lo_y, hi_y) = match kernel {
            Kernel::Nearest => (min_x.round(), max_x.round(), min_y.round(), max_y.round()),
            Kernel::Convolve(table) => {
                let before = ((table.width() - 1) / 2) as f64;
                let after = (table.width() - 1) as f64 - before;
                (
                    min_x.floor() - before,
                    max_x.floor() + after,
                    min_y.floor() - before,
                    max_y.floor() + after,
                )
            }
        };
        let in_ul = input.ul();
        let in_lr = input.lr();
        lo_x >= in_ul.x as f64
            && hi_x <= in_lr.x as f64
            && lo_y >= in_ul.y as f64
            && hi_y <= in_lr.y as f64
    }
}

pub(crate) enum Kernel<'a> {
    Nearest,
    Convolve(&'a WeightTable),
}

/// Per-band values the scan needs.
pub(crate) struct BandContext {
    pub(crate) in_null: f64,
    pub(crate) out_null: f64,
    pub(crate) out_min: f64,
    pub(crate) out_max: f64,
}

impl BandContext {
    fn input_is_null(&self, v: f64) -> bool {
        if self.in_null.is_nan() {
            v.is_nan()
        } else {
            v == self.in_null
        }
    }

    fn nulls_differ(&self) -> bool {
        self.in_null.to_bits() != self.out_null.to_bits()
            && !(self.in_null.is_nan() && self.out_null.is_nan())
    }
}

/// Geometry of one band scan.
pub(crate) struct Planes<'a, T> {
    pub(crate) src: &'a [T],
    pub(crate) src_rect: IntRect,
    pub(crate) dst: &'a mut [T],
    pub(crate) dst_rect: IntRect,
}

pub(crate) fn scan_band<T: Sample>(
    planes: Planes<'_, T>,
    sub: &IntRect,
    scan: &Scan,
    kernel: &Kernel<'_>,
    ctx: &BandContext,
    full: bool,
) {
    if full {
        scan_band_impl::<T, true>(planes, sub, scan, kernel, ctx);
    } else {
        scan_band_impl::<T, false>(planes, sub, scan, kernel, ctx);
    }
}

/// With `FULL` every kernel tap is known to be inside the input, so taps
/// are neither validated nor clamped.
fn scan_band_impl<T: Sample, const FULL: bool>(
    planes: Planes<'_, T>,
    sub: &IntRect,
    scan: &Scan,
    kernel: &Kernel<'_>,
    ctx: &BandContext,
) {
    let Planes {
        src,
        src_rect,
        dst,
        dst_rect,
    } = planes;
    let src_ul = src_rect.ul();
    let src_w = src_rect.width() as i64;
    let src_h = src_rect.height() as i64;
    let dst_w = dst_rect.width() as usize;
    let null_out = T::from_f64(ctx.out_null);
    let remap_null = ctx.nulls_differ();

    let inside = |p: IntPoint| -> bool {
        let lx = p.x as i64 - src_ul.x as i64;
        let ly = p.y as i64 - src_ul.y as i64;
        lx >= 0 && ly >= 0 && lx < src_w && ly < src_h
    };

    for y in sub.ul().y..=sub.lr().y {
        let (start, step) = scan.row(sub, y);
        let row_base = (y - dst_rect.ul().y) as usize * dst_w;
        for x in sub.ul().x..=sub.lr().x {
            let p = start + step * (x - sub.ul().x) as f64;
            let out_index = row_base + (x - dst_rect.ul().x) as usize;

            let value = if !FULL && (p.has_nan() || !inside(p.round())) {
                None
            } else {
                match kernel {
                    Kernel::Nearest => {
                        let n = p.round();
                        let idx = (n.y as i64 - src_ul.y as i64) * src_w + (n.x as i64 - src_ul.x as i64);
                        usize::try_from(idx)
                            .ok()
                            .and_then(|i| src.get(i).copied())
                            .map(|v| {
                                if remap_null && ctx.input_is_null(Sample::to_f64(v)) {
                                    null_out
                                } else {
                                    v
                                }
                            })
                    }
                    Kernel::Convolve(table) => {
                        Some(convolve::<T, FULL>(src, src_ul, src_w, src_h, table, p, ctx))
                    }
                }
            };

            if let Some(slot) = dst.get_mut(out_index) {
                *slot = value.unwrap_or(null_out);
            }
        }
    }
}

#[inline]
fn convolve<T: Sample, const FULL: bool>(
    src: &[T],
    src_ul: IntPoint,
    src_w: i64,
    src_h: i64,
    table: &WeightTable,
    p: DPoint,
    ctx: &BandContext,
) -> T {
    let fx = p.x.floor();
    let fy = p.y.floor();
    let wx = table.lookup(p.x - fx);
    let wy = table.lookup(p.y - fy);
    let before = ((table.width() - 1) / 2) as i64;
    let bx = fx as i64 - before - src_ul.x as i64;
    let by = fy as i64 - before - src_ul.y as i64;

    let mut acc = 0.0;
    for (j, w_row) in wy.iter().enumerate() {
        let mut row = by + j as i64;
        if !FULL {
            row = row.clamp(0, src_h - 1);
        }
        let base = row * src_w;
        let mut row_acc = 0.0;
        for (i, w_col) in wx.iter().enumerate() {
            let mut col = bx + i as i64;
            if !FULL {
                col = col.clamp(0, src_w - 1);
            }
            if let Some(v) = usize::try_from(base + col).ok().and_then(|k| src.get(k)) {
                row_acc += w_col * Sample::to_f64(*v);
            }
        }
        acc += w_row * row_acc;
    }

    let clamped = if acc < ctx.out_min {
        ctx.out_min
    } else if acc > ctx.out_max {
        ctx.out_max
    } else {
        acc
    };
    T::from_f64(clamped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_positions() {
        let sub = IntRect::new(0, 0, 4, 4);
        let scan = Scan::Ratio(DPoint::new(1.0, 1.0));
        assert_eq!(scan.position(&sub, 3, 2), DPoint::new(3.0, 2.0));

        let half = Scan::Ratio(DPoint::new(0.5, 0.5));
        assert_eq!(half.position(&sub, 0, 0), DPoint::new(0.5, 0.5));
        assert_eq!(half.position(&sub, 1, 0), DPoint::new(2.5, 0.5));
    }

    #[test]
    fn test_quad_positions() {
        let sub = IntRect::new(10, 10, 4, 4);
        let scan = Scan::Quad {
            ul: DPoint::new(0.0, 0.0),
            ur: DPoint::new(0.0, 4.0),
            delta_ul: DPoint::new(-1.0, 0.0),
            delta_ur: DPoint::new(-1.0, 0.0),
            length: 4.0,
        };
        assert_eq!(scan.position(&sub, 10, 10), DPoint::new(0.0, 0.0));
        assert_eq!(scan.position(&sub, 12, 10), DPoint::new(0.0, 2.0));
        assert_eq!(scan.position(&sub, 12, 11), DPoint::new(-1.0, 2.0));
    }

    #[test]
    fn test_zero_length_scan_does_not_move() {
        let sub = IntRect::new(0, 0, 8, 1);
        let scan = Scan::Quad {
            ul: DPoint::new(2.0, 3.0),
            ur: DPoint::new(9.0, 3.0),
            delta_ul: DPoint::new(0.0, 1.0),
            delta_ur: DPoint::new(0.0, 1.0),
            length: 0.0,
        };
        assert_eq!(scan.position(&sub, 7, 0), DPoint::new(2.0, 3.0));
    }

    #[test]
    fn test_covers() {
        let input = IntRect::new(0, 0, 10, 10);
        let sub = IntRect::new(0, 0, 10, 10);
        let identity = Scan::Ratio(DPoint::new(1.0, 1.0));
        assert!(identity.covers(&sub, &input, &Kernel::Nearest));

        let table = WeightTable::bilinear(16);
        assert!(!identity.covers(&sub, &input, &Kernel::Convolve(&table)));
        let inner = IntRect::new(0, 0, 9, 9);
        assert!(identity.covers(&inner, &input, &Kernel::Convolve(&table)));
    }
}
