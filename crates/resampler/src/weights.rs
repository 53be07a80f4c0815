//! Precomputed 1-D kernel weights.

use crate::types::ResamplerType;

/// Table rows per unit of output-to-input ratio.
pub const TABLE_RESOLUTION: usize = 16;

/// Upper bound on table rows, reached at ratios of 64 and above.
pub const MAX_TABLE_ROWS: usize = TABLE_RESOLUTION * 64;

/// Shape parameter of the cubic kernel when none is configured.
pub const DEFAULT_CUBIC_PARAMETER: f64 = -0.5;

/// Parametric cubic convolution weight.
///
/// ```text
/// W(t) = (a+2)|t|³ - (a+3)|t|² + 1       for 0 ≤ |t| < 1
/// W(t) = a|t|³ - 5a|t|² + 8a|t| - 4a     for 1 ≤ |t| < 2
/// W(t) = 0                                 otherwise
/// ```
pub fn cubic_weight(t: f64, a: f64) -> f64 {
    let t = t.abs();
    if t < 1.0 {
        (a + 2.0) * t * t * t - (a + 3.0) * t * t + 1.0
    } else if t < 2.0 {
        a * t * t * t - 5.0 * a * t * t + 8.0 * a * t - 4.0 * a
    } else {
        0.0
    }
}

/// Kernel weights for `rows` evenly spaced fractional offsets.
///
/// Row `r` holds the weights for a sample whose fractional offset from its
/// anchor pixel is `r / rows`. Every row sums to one.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightTable {
    rows: usize,
    width: usize,
    weights: Vec<f64>,
}

impl WeightTable {
    /// Build the table for a kernel. Kernels without weights yield `None`.
    pub fn for_kernel(kernel: ResamplerType, rows: usize, cubic_parameter: f64) -> Option<Self> {
        match kernel {
            ResamplerType::Bilinear => Some(Self::bilinear(rows)),
            ResamplerType::Bicubic => Some(Self::bicubic(rows, cubic_parameter)),
            ResamplerType::None | ResamplerType::NearestNeighbor => None,
        }
    }

    /// Two taps: `[1 - f, f]`.
    pub fn bilinear(rows: usize) -> Self {
        let rows = rows.max(1);
        let mut weights = Vec::with_capacity(rows * 2);
        for r in 0..rows {
            let f = r as f64 / rows as f64;
            weights.push(1.0 - f);
            weights.push(f);
        }
        Self {
            rows,
            width: 2,
            weights,
        }
    }

    /// Four taps at distances `1 + f`, `f`, `1 - f` and `2 - f` from the
    /// sample point.
    pub fn bicubic(rows: usize, a: f64) -> Self {
        let rows = rows.max(1);
        let mut weights = Vec::with_capacity(rows * 4);
        for r in 0..rows {
            let f = r as f64 / rows as f64;
            weights.push(cubic_weight(1.0 + f, a));
            weights.push(cubic_weight(f, a));
            weights.push(cubic_weight(1.0 - f, a));
            weights.push(cubic_weight(2.0 - f, a));
        }
        Self {
            rows,
            width: 4,
            weights,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Taps per row.
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn row(&self, r: usize) -> &[f64] {
        let r = r.min(self.rows - 1);
        &self.weights[r * self.width..(r + 1) * self.width]
    }

    /// Weights for a fractional offset in `[0, 1)`.
    #[inline]
    pub fn lookup(&self, frac: f64) -> &[f64] {
        let r = (frac * self.rows as f64) as usize;
        self.row(r)
    }
}

/// Rows needed for an output-to-input ratio.
pub(crate) fn rows_for_ratio(max_ratio: f64) -> usize {
    if !max_ratio.is_finite() || max_ratio <= 1.0 {
        return TABLE_RESOLUTION;
    }
    let rows = (max_ratio.ceil() as usize).saturating_mul(TABLE_RESOLUTION);
    rows.min(MAX_TABLE_ROWS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cubic_weight_knots() {
        for a in [-1.0, -0.75, -0.5, 0.0] {
            assert_relative_eq!(cubic_weight(0.0, a), 1.0, epsilon = 1e-12);
            assert_relative_eq!(cubic_weight(1.0, a), 0.0, epsilon = 1e-12);
            assert_relative_eq!(cubic_weight(2.0, a), 0.0, epsilon = 1e-12);
            assert_relative_eq!(cubic_weight(-0.3, a), cubic_weight(0.3, a), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_rows_sum_to_one() {
        for table in [
            WeightTable::bilinear(32),
            WeightTable::bicubic(32, -0.5),
            WeightTable::bicubic(48, -1.0),
            WeightTable::bicubic(16, 0.0),
        ] {
            for r in 0..table.rows() {
                let sum: f64 = table.row(r).iter().sum();
                assert_relative_eq!(sum, 1.0, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_zero_offset_row_is_identity() {
        assert_eq!(WeightTable::bilinear(16).lookup(0.0), &[1.0, 0.0]);
        assert_eq!(WeightTable::bicubic(16, -0.5).lookup(0.0), &[0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_lookup_quantizes_and_clamps() {
        let table = WeightTable::bilinear(4);
        assert_eq!(table.lookup(0.3), &[0.75, 0.25]);
        assert_eq!(table.lookup(0.999), &[0.25, 0.75]);
        assert_eq!(table.lookup(1.0), &[0.25, 0.75]);
    }

    #[test]
    fn test_rows_for_ratio() {
        assert_eq!(rows_for_ratio(0.25), TABLE_RESOLUTION);
        assert_eq!(rows_for_ratio(1.0), TABLE_RESOLUTION);
        assert_eq!(rows_for_ratio(2.5), 3 * TABLE_RESOLUTION);
        assert_eq!(rows_for_ratio(1e9), MAX_TABLE_ROWS);
        assert_eq!(rows_for_ratio(f64::NAN), TABLE_RESOLUTION);
    }
}
