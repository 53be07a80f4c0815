//! The interpolation grid.

use std::sync::OnceLock;

use raster_common::{DPoint, IntPoint, KeywordList, RasterError, StatePersistence};
use serde::{Deserialize, Serialize};

use crate::domain::DomainType;

/// Mean and population standard deviation over the non-null nodes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridStats {
    pub mean: f64,
    pub std_dev: f64,
}

/// Dense grid of `f64` nodes in a U/V frame.
///
/// Node `(x, y)` sits at `origin + (x * spacing.x, y * spacing.y)` and is
/// stored at `y * width + x`.
///
/// Statistics are computed on first request and cached for the life of the
/// grid: later `set_node`, `fill`, `filter` or null interpolation do not
/// refresh them. Only [`DblGrid::initialize`] starts over.
#[derive(Debug, Clone)]
pub struct DblGrid {
    data: Vec<f64>,
    width: usize,
    height: usize,
    origin: DPoint,
    spacing: DPoint,
    null_value: f64,
    min_value: f64,
    max_value: f64,
    domain: DomainType,
    extrapolation: bool,
    stats: OnceLock<GridStats>,
}

impl Default for DblGrid {
    fn default() -> Self {
        Self::new(0, 0, DPoint::new(0.0, 0.0), DPoint::new(1.0, 1.0), f64::NAN)
    }
}

impl DblGrid {
    pub fn new(width: usize, height: usize, origin: DPoint, spacing: DPoint, null_value: f64) -> Self {
        let mut grid = Self {
            data: Vec::new(),
            width: 0,
            height: 0,
            origin,
            spacing,
            null_value,
            min_value: f64::INFINITY,
            max_value: f64::NEG_INFINITY,
            domain: DomainType::Continuous,
            extrapolation: false,
            stats: OnceLock::new(),
        };
        grid.initialize(width, height, origin, spacing, null_value);
        grid
    }

    /// Reallocate the grid with every node set to `null_value`. Zero or
    /// non-finite spacing components are replaced by 1.
    pub fn initialize(
        &mut self,
        width: usize,
        height: usize,
        origin: DPoint,
        spacing: DPoint,
        null_value: f64,
    ) {
        let sanitize = |v: f64| if v.is_finite() && v != 0.0 { v } else { 1.0 };
        self.width = width;
        self.height = height;
        self.origin = origin;
        self.spacing = DPoint::new(sanitize(spacing.x), sanitize(spacing.y));
        self.null_value = null_value;
        self.data = vec![null_value; width * height];
        self.min_value = f64::INFINITY;
        self.max_value = f64::NEG_INFINITY;
        self.stats = OnceLock::new();
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// `(width, height)` in nodes.
    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn origin(&self) -> DPoint {
        self.origin
    }

    pub fn spacing(&self) -> DPoint {
        self.spacing
    }

    pub fn null_value(&self) -> f64 {
        self.null_value
    }

    /// Change the null marker. Nodes are not rewritten.
    pub fn set_null_value(&mut self, null_value: f64) {
        self.null_value = null_value;
    }

    /// True when `value` is the null marker. A NaN null matches NaN.
    pub fn is_null(&self, value: f64) -> bool {
        if self.null_value.is_nan() {
            value.is_nan()
        } else {
            value == self.null_value
        }
    }

    /// Smallest non-null value written through `set_node`/`fill`.
    pub fn min_value(&self) -> f64 {
        self.min_value
    }

    /// Largest non-null value written through `set_node`/`fill`.
    pub fn max_value(&self) -> f64 {
        self.max_value
    }

    pub fn domain_type(&self) -> DomainType {
        self.domain
    }

    pub fn set_domain_type(&mut self, domain: DomainType) {
        self.domain = domain;
    }

    pub fn enable_extrapolation(&mut self, enabled: bool) {
        self.extrapolation = enabled;
    }

    pub fn extrapolation_enabled(&self) -> bool {
        self.extrapolation
    }

    /// Fold a value into the grid's domain.
    pub fn constrain(&self, value: f64) -> f64 {
        self.domain.constrain(value)
    }

    #[inline]
    fn offset(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    fn track(&mut self, value: f64) {
        if !self.is_null(value) {
            self.min_value = self.min_value.min(value);
            self.max_value = self.max_value.max(value);
        }
    }

    fn recompute_range(&mut self) {
        self.min_value = f64::INFINITY;
        self.max_value = f64::NEG_INFINITY;
        for i in 0..self.data.len() {
            self.track(self.data[i]);
        }
    }

    /// Write one node. Indices outside the grid are ignored.
    pub fn set_node(&mut self, x: usize, y: usize, value: f64) {
        if x < self.width && y < self.height {
            let i = self.offset(x, y);
            self.data[i] = value;
            self.track(value);
        }
    }

    /// Read one node. Indices outside the grid read as the null value.
    pub fn get_node(&self, x: usize, y: usize) -> f64 {
        if x < self.width && y < self.height {
            self.data[self.offset(x, y)]
        } else {
            self.null_value
        }
    }

    /// Fractional node coordinates of a U/V point. Coordinates within
    /// rounding noise of a node index land exactly on it.
    pub fn grid_coords(&self, uv: DPoint) -> DPoint {
        DPoint::new(
            snap_to_node((uv.x - self.origin.x) / self.spacing.x),
            snap_to_node((uv.y - self.origin.y) / self.spacing.y),
        )
    }

    /// Write to the node nearest `uv`. Points that round outside the grid
    /// are ignored.
    pub fn set_nearest_node(&mut self, uv: DPoint, value: f64) {
        let g = self.grid_coords(uv);
        if g.has_nan() {
            return;
        }
        let IntPoint { x, y } = g.round();
        if x >= 0 && y >= 0 {
            self.set_node(x as usize, y as usize, value);
        }
    }

    /// Set every node to `value`.
    pub fn fill(&mut self, value: f64) {
        self.data.fill(value);
        self.min_value = f64::INFINITY;
        self.max_value = f64::NEG_INFINITY;
        self.track(value);
    }

    /// True when `uv` falls within the node extent (edges included).
    pub fn is_inside(&self, uv: DPoint) -> bool {
        let g = self.grid_coords(uv);
        self.width > 0
            && self.height > 0
            && g.x >= 0.0
            && g.y >= 0.0
            && g.x <= (self.width - 1) as f64
            && g.y <= (self.height - 1) as f64
    }

    /// Interpolated value at `(u, v)`.
    ///
    /// Inside the node extent this is bilinear between the four surrounding
    /// nodes. Outside it is the null value, or with extrapolation enabled a
    /// linear continuation of the edge gradient. A null contributing node
    /// makes the result null. Non-null results are folded into the domain.
    pub fn value(&self, u: f64, v: f64) -> f64 {
        self.value_at(DPoint::new(u, v))
    }

    pub fn value_at(&self, uv: DPoint) -> f64 {
        let g = self.grid_coords(uv);
        let raw = if self.is_inside(uv) {
            self.interpolate(g.x, g.y)
        } else if self.extrapolation {
            self.extrapolate(g.x, g.y)
        } else {
            None
        };
        match raw {
            Some(value) => self.constrain(value),
            None => self.null_value,
        }
    }

    /// Bilinear interpolation at grid coordinates inside the extent.
    /// Zero-weight nodes are not read, so node positions return the node
    /// value exactly.
    fn interpolate(&self, gx: f64, gy: f64) -> Option<f64> {
        if self.width == 0 || self.height == 0 || gx.is_nan() || gy.is_nan() {
            return None;
        }
        let x0 = (gx.floor().max(0.0) as usize).min(self.width - 1);
        let y0 = (gy.floor().max(0.0) as usize).min(self.height - 1);
        let fx = if x0 + 1 < self.width { gx - x0 as f64 } else { 0.0 };
        let fy = if y0 + 1 < self.height { gy - y0 as f64 } else { 0.0 };

        let taps = [
            (x0, y0, (1.0 - fx) * (1.0 - fy)),
            (x0 + 1, y0, fx * (1.0 - fy)),
            (x0, y0 + 1, (1.0 - fx) * fy),
            (x0 + 1, y0 + 1, fx * fy),
        ];
        let mut sum = 0.0;
        for (x, y, w) in taps {
            if w == 0.0 {
                continue;
            }
            let node = self.data[self.offset(x, y)];
            if self.is_null(node) {
                return None;
            }
            sum += w * node;
        }
        Some(sum)
    }

    /// Edge value plus the one-node-inward gradient times the distance
    /// outside, per axis. Exact for planar data.
    fn extrapolate(&self, gx: f64, gy: f64) -> Option<f64> {
        if self.width == 0 || self.height == 0 || gx.is_nan() || gy.is_nan() {
            return None;
        }
        let max_x = (self.width - 1) as f64;
        let max_y = (self.height - 1) as f64;
        let cx = gx.clamp(0.0, max_x);
        let cy = gy.clamp(0.0, max_y);
        let base = self.interpolate(cx, cy)?;

        let mut result = base;
        let dx = gx - cx;
        if dx != 0.0 && self.width > 1 {
            let inward = if dx < 0.0 { cx + 1.0 } else { cx - 1.0 };
            let inner = self.interpolate(inward, cy)?;
            let slope = if dx < 0.0 { inner - base } else { base - inner };
            result += slope * dx;
        }
        let dy = gy - cy;
        if dy != 0.0 && self.height > 1 {
            let inward = if dy < 0.0 { cy + 1.0 } else { cy - 1.0 };
            let inner = self.interpolate(cx, inward)?;
            let slope = if dy < 0.0 { inner - base } else { base - inner };
            result += slope * dy;
        }
        Some(result)
    }

    /// Fill null nodes with a distance-weighted blend of the valid nodes,
    /// each weighted by `exp(-d² / decay_rate)` with `d` in node units.
    ///
    /// Weights are taken from the grid as it was before the pass, so
    /// filled nodes do not feed each other. A non-positive decay rate is
    /// treated as 1. Nodes too far from every valid node for the weights
    /// to register take the nearest valid node's value.
    pub fn interpolate_null_valued_nodes(&mut self, decay_rate: f64) {
        let decay = if decay_rate.is_finite() && decay_rate > 0.0 {
            decay_rate
        } else {
            1.0
        };
        let valid: Vec<(f64, f64, f64)> = (0..self.height)
            .flat_map(|y| (0..self.width).map(move |x| (x, y)))
            .filter_map(|(x, y)| {
                let v = self.data[self.offset(x, y)];
                (!self.is_null(v)).then_some((x as f64, y as f64, v))
            })
            .collect();
        if valid.is_empty() || valid.len() == self.data.len() {
            return;
        }

        let mut filled = 0usize;
        for y in 0..self.height {
            for x in 0..self.width {
                let i = self.offset(x, y);
                if !self.is_null(self.data[i]) {
                    continue;
                }
                let (px, py) = (x as f64, y as f64);
                let mut weight_sum = 0.0;
                let mut value_sum = 0.0;
                let mut nearest = (f64::INFINITY, self.null_value);
                for &(vx, vy, v) in &valid {
                    let d2 = (vx - px).powi(2) + (vy - py).powi(2);
                    let w = (-d2 / decay).exp();
                    weight_sum += w;
                    value_sum += w * v;
                    if d2 < nearest.0 {
                        nearest = (d2, v);
                    }
                }
                self.data[i] = if weight_sum > f64::MIN_POSITIVE {
                    value_sum / weight_sum
                } else {
                    nearest.1
                };
                filled += 1;
            }
        }
        self.recompute_range();
        tracing::debug!(filled, valid = valid.len(), decay, "interpolated null grid nodes");
    }

    /// Convolve the grid with a `kernel_width x kernel_height` kernel given
    /// row-major, centered on each node. Taps past the edge are
    /// extrapolated, so the grid keeps its size. A node whose neighborhood
    /// contains a null keeps its value. A kernel with fewer than
    /// `kernel_width * kernel_height` values is ignored.
    pub fn filter(&mut self, kernel_width: usize, kernel_height: usize, kernel: &[f64]) {
        if kernel_width == 0 || kernel_height == 0 || kernel.len() < kernel_width * kernel_height {
            tracing::warn!(
                kernel_width,
                kernel_height,
                len = kernel.len(),
                "filter kernel does not match its dimensions, grid left unchanged"
            );
            return;
        }
        let half_x = (kernel_width / 2) as f64;
        let half_y = (kernel_height / 2) as f64;
        let mut out = self.data.clone();

        for y in 0..self.height {
            for x in 0..self.width {
                let mut sum = 0.0;
                let mut complete = true;
                'taps: for ky in 0..kernel_height {
                    for kx in 0..kernel_width {
                        let gx = x as f64 + kx as f64 - half_x;
                        let gy = y as f64 + ky as f64 - half_y;
                        let inside = gx >= 0.0
                            && gy >= 0.0
                            && gx <= (self.width - 1) as f64
                            && gy <= (self.height - 1) as f64;
                        let sample = if inside {
                            self.interpolate(gx, gy)
                        } else {
                            self.extrapolate(gx, gy)
                        };
                        match sample {
                            Some(v) => sum += kernel[ky * kernel_width + kx] * v,
                            None => {
                                complete = false;
                                break 'taps;
                            }
                        }
                    }
                }
                if complete {
                    out[self.offset(x, y)] = sum;
                }
            }
        }
        self.data = out;
        self.recompute_range();
    }

    /// Mean and standard deviation of the non-null nodes, computed once.
    /// Both are NaN when no node is populated.
    pub fn statistics(&self) -> GridStats {
        *self.stats.get_or_init(|| {
            let values: Vec<f64> = self.data.iter().copied().filter(|v| !self.is_null(*v)).collect();
            if values.is_empty() {
                return GridStats {
                    mean: f64::NAN,
                    std_dev: f64::NAN,
                };
            }
            let n = values.len() as f64;
            let mean = values.iter().sum::<f64>() / n;
            let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            GridStats {
                mean,
                std_dev: variance.sqrt(),
            }
        })
    }

    pub fn mean_value(&self) -> f64 {
        self.statistics().mean
    }

    pub fn mean_std_dev(&self) -> f64 {
        self.statistics().std_dev
    }
}

/// Relative tolerance below which a grid coordinate counts as a node index.
const NODE_SNAP_EPSILON: f64 = 1e-9;

fn snap_to_node(g: f64) -> f64 {
    let nearest = g.round();
    if (g - nearest).abs() <= NODE_SNAP_EPSILON * nearest.abs().max(1.0) {
        nearest
    } else {
        g
    }
}

/// Index operator over `(x, y)` nodes. Panics outside the grid.
impl std::ops::Index<(usize, usize)> for DblGrid {
    type Output = f64;

    fn index(&self, (x, y): (usize, usize)) -> &f64 {
        &self.data[y * self.width + x]
    }
}

impl StatePersistence for DblGrid {
    fn save_state(&self, kwl: &mut KeywordList, prefix: &str) {
        kwl.add_values(prefix, "size", &[self.width, self.height]);
        kwl.add_point(prefix, "origin", self.origin);
        kwl.add_point(prefix, "spacing", self.spacing);
        kwl.add(prefix, "null_value", self.null_value);
        kwl.add(prefix, "domain", self.domain);
        kwl.add(prefix, "extrapolation", self.extrapolation);
    }

    /// Restores geometry and flags. A changed size or geometry reallocates
    /// the grid with null nodes.
    fn load_state(&mut self, kwl: &KeywordList, prefix: &str) -> raster_common::Result<()> {
        let (width, height) = match kwl.find_values::<usize>(prefix, "size")? {
            Some(v) if v.len() == 2 => (v[0], v[1]),
            Some(_) => {
                return Err(RasterError::keyword(
                    format!("{prefix}size"),
                    "expected 'width height'",
                ))
            }
            None => self.size(),
        };
        let origin = kwl.find_point(prefix, "origin")?.unwrap_or(self.origin);
        let spacing = kwl.find_point(prefix, "spacing")?.unwrap_or(self.spacing);
        let null_value = kwl
            .find_parsed::<f64>(prefix, "null_value")?
            .unwrap_or(self.null_value);

        let same_null = null_value.to_bits() == self.null_value.to_bits();
        if (width, height) != self.size() || origin != self.origin || spacing != self.spacing || !same_null
        {
            self.initialize(width, height, origin, spacing, null_value);
        }
        if let Some(domain) = kwl.find(prefix, "domain") {
            self.domain = DomainType::from_str(domain);
        }
        if let Some(extrapolation) = kwl.find_parsed::<bool>(prefix, "extrapolation")? {
            self.extrapolation = extrapolation;
        }
        Ok(())
    }
}
