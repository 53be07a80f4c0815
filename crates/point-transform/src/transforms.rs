//! Concrete transforms.

use nalgebra::{Matrix4, Vector4};
use raster_common::{DPoint, KeywordList, RasterError, Result, StatePersistence};
use serde::{Deserialize, Serialize};

use crate::solver::NewtonSolver;
use crate::Transform2d;

const TYPE_KEY: &str = "type";

fn solver_prefix(prefix: &str) -> String {
    format!("{prefix}newton.")
}

fn check_type(kwl: &KeywordList, prefix: &str, expected: &str) -> Result<()> {
    match kwl.find(prefix, TYPE_KEY) {
        Some(found) if !found.eq_ignore_ascii_case(expected) => Err(RasterError::keyword(
            format!("{prefix}{TYPE_KEY}"),
            format!("expected '{expected}', found '{found}'"),
        )),
        _ => Ok(()),
    }
}

fn find_coefficients<const N: usize>(
    kwl: &KeywordList,
    prefix: &str,
    key: &str,
) -> Result<Option<[f64; N]>> {
    match kwl.find_values::<f64>(prefix, key)? {
        None => Ok(None),
        Some(values) => <[f64; N]>::try_from(values).map(Some).map_err(|v| {
            RasterError::keyword(
                format!("{prefix}{key}"),
                format!("expected {N} values, found {}", v.len()),
            )
        }),
    }
}

// ============================================================================
// Identity
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityTransform {
    solver: NewtonSolver,
}

impl IdentityTransform {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transform2d for IdentityTransform {
    fn forward(&self, p: DPoint) -> DPoint {
        p
    }

    fn solver(&self) -> &NewtonSolver {
        &self.solver
    }

    fn inverse(&self, p: DPoint) -> DPoint {
        p
    }
}

impl StatePersistence for IdentityTransform {
    fn save_state(&self, kwl: &mut KeywordList, prefix: &str) {
        kwl.add(prefix, TYPE_KEY, "identity");
        self.solver.save_state(kwl, &solver_prefix(prefix));
    }

    fn load_state(&mut self, kwl: &KeywordList, prefix: &str) -> Result<()> {
        check_type(kwl, prefix, "identity")?;
        self.solver.load_state(kwl, &solver_prefix(prefix))
    }
}

// ============================================================================
// Shift
// ============================================================================

/// Translation by a fixed offset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShiftTransform {
    offset: DPoint,
    solver: NewtonSolver,
}

impl ShiftTransform {
    pub fn new(offset: DPoint) -> Self {
        Self {
            offset,
            solver: NewtonSolver::default(),
        }
    }

    pub fn offset(&self) -> DPoint {
        self.offset
    }
}

impl Transform2d for ShiftTransform {
    fn forward(&self, p: DPoint) -> DPoint {
        p + self.offset
    }

    fn solver(&self) -> &NewtonSolver {
        &self.solver
    }

    fn inverse(&self, p: DPoint) -> DPoint {
        p - self.offset
    }
}

impl StatePersistence for ShiftTransform {
    fn save_state(&self, kwl: &mut KeywordList, prefix: &str) {
        kwl.add(prefix, TYPE_KEY, "shift");
        kwl.add_point(prefix, "offset", self.offset);
        self.solver.save_state(kwl, &solver_prefix(prefix));
    }

    fn load_state(&mut self, kwl: &KeywordList, prefix: &str) -> Result<()> {
        check_type(kwl, prefix, "shift")?;
        if let Some(offset) = kwl.find_point(prefix, "offset")? {
            self.offset = offset;
        }
        self.solver.load_state(kwl, &solver_prefix(prefix))
    }
}

// ============================================================================
// Affine
// ============================================================================

/// `x' = a*x + b*y + c`, `y' = d*x + e*y + f`.
///
/// The inverse is closed-form. A singular matrix falls back to the Newton
/// solver, which cannot make progress and returns its starting guess.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform {
    coefficients: [f64; 6],
    solver: NewtonSolver,
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::new([1.0, 0.0, 0.0, 0.0, 1.0, 0.0])
    }
}

impl AffineTransform {
    /// Coefficients in the order `a b c d e f`.
    pub fn new(coefficients: [f64; 6]) -> Self {
        Self {
            coefficients,
            solver: NewtonSolver::default(),
        }
    }

    /// Scale about the origin, then rotate counter-clockwise by `angle`
    /// radians, then translate.
    pub fn from_parts(scale: DPoint, angle: f64, translation: DPoint) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self::new([
            cos * scale.x,
            -sin * scale.y,
            translation.x,
            sin * scale.x,
            cos * scale.y,
            translation.y,
        ])
    }

    pub fn with_solver(mut self, solver: NewtonSolver) -> Self {
        self.solver = solver;
        self
    }

    pub fn coefficients(&self) -> [f64; 6] {
        self.coefficients
    }

    pub fn determinant(&self) -> f64 {
        let [a, b, _, d, e, _] = self.coefficients;
        a * e - b * d
    }
}

impl Transform2d for AffineTransform {
    fn forward(&self, p: DPoint) -> DPoint {
        let [a, b, c, d, e, f] = self.coefficients;
        DPoint::new(a * p.x + b * p.y + c, d * p.x + e * p.y + f)
    }

    fn solver(&self) -> &NewtonSolver {
        &self.solver
    }

    fn inverse(&self, p: DPoint) -> DPoint {
        let det = self.determinant();
        if det == 0.0 || !det.is_finite() {
            return self.solver.solve(|q| self.forward(q), p).point;
        }
        let [a, b, c, d, e, f] = self.coefficients;
        let x = p.x - c;
        let y = p.y - f;
        DPoint::new((e * x - b * y) / det, (a * y - d * x) / det)
    }
}

impl StatePersistence for AffineTransform {
    fn save_state(&self, kwl: &mut KeywordList, prefix: &str) {
        kwl.add(prefix, TYPE_KEY, "affine");
        kwl.add_values(prefix, "coefficients", &self.coefficients);
        self.solver.save_state(kwl, &solver_prefix(prefix));
    }

    fn load_state(&mut self, kwl: &KeywordList, prefix: &str) -> Result<()> {
        check_type(kwl, prefix, "affine")?;
        if let Some(coefficients) = find_coefficients::<6>(kwl, prefix, "coefficients")? {
            self.coefficients = coefficients;
        }
        self.solver.load_state(kwl, &solver_prefix(prefix))
    }
}

// ============================================================================
// Bilinear
// ============================================================================

/// `x' = a0 + a1*x + a2*y + a3*x*y`, and likewise for `y'` with `b0..b3`.
///
/// Usually fit from four tie points, such as the corners of an image and
/// their positions on the ground. There is no closed-form inverse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BilinearTransform {
    x_coefficients: [f64; 4],
    y_coefficients: [f64; 4],
    solver: NewtonSolver,
}

impl Default for BilinearTransform {
    fn default() -> Self {
        Self::new([0.0, 1.0, 0.0, 0.0], [0.0, 0.0, 1.0, 0.0])
    }
}

impl BilinearTransform {
    pub fn new(x_coefficients: [f64; 4], y_coefficients: [f64; 4]) -> Self {
        Self {
            x_coefficients,
            y_coefficients,
            solver: NewtonSolver::default(),
        }
    }

    /// Fit the transform mapping each `source[i]` onto `destination[i]`.
    /// The Newton search starts from the centroid of the source points.
    pub fn from_tie_points(source: &[DPoint; 4], destination: &[DPoint; 4]) -> Result<Self> {
        let rows: Vec<f64> = source
            .iter()
            .flat_map(|p| [1.0, p.x, p.y, p.x * p.y])
            .collect();
        let system = Matrix4::from_row_slice(&rows);
        let scale = system.amax();
        let singular = || RasterError::invalid_state("tie points do not determine a bilinear transform");
        // Near-degenerate layouts (collinear points) may not give an exact zero pivot.
        let det = system.determinant();
        if det.is_nan() || det.abs() <= 1e-12 * scale.powi(4) {
            return Err(singular());
        }
        let lu = system.lu();

        let solve = |values: Vector4<f64>| -> Result<[f64; 4]> {
            let c = lu.solve(&values).ok_or_else(singular)?;
            Ok([c[0], c[1], c[2], c[3]])
        };
        let x_coefficients = solve(Vector4::from_iterator(destination.iter().map(|p| p.x)))?;
        let y_coefficients = solve(Vector4::from_iterator(destination.iter().map(|p| p.y)))?;

        let centroid = source.iter().fold(DPoint::new(0.0, 0.0), |acc, p| acc + *p) / 4.0;
        tracing::debug!(?x_coefficients, ?y_coefficients, "fit bilinear transform");
        Ok(Self {
            x_coefficients,
            y_coefficients,
            solver: NewtonSolver::default().with_origin(centroid),
        })
    }

    pub fn with_solver(mut self, solver: NewtonSolver) -> Self {
        self.solver = solver;
        self
    }

    pub fn x_coefficients(&self) -> [f64; 4] {
        self.x_coefficients
    }

    pub fn y_coefficients(&self) -> [f64; 4] {
        self.y_coefficients
    }
}

impl Transform2d for BilinearTransform {
    fn forward(&self, p: DPoint) -> DPoint {
        let eval = |c: &[f64; 4]| c[0] + c[1] * p.x + c[2] * p.y + c[3] * p.x * p.y;
        DPoint::new(eval(&self.x_coefficients), eval(&self.y_coefficients))
    }

    fn solver(&self) -> &NewtonSolver {
        &self.solver
    }
}

impl StatePersistence for BilinearTransform {
    fn save_state(&self, kwl: &mut KeywordList, prefix: &str) {
        kwl.add(prefix, TYPE_KEY, "bilinear");
        kwl.add_values(prefix, "x_coefficients", &self.x_coefficients);
        kwl.add_values(prefix, "y_coefficients", &self.y_coefficients);
        self.solver.save_state(kwl, &solver_prefix(prefix));
    }

    fn load_state(&mut self, kwl: &KeywordList, prefix: &str) -> Result<()> {
        check_type(kwl, prefix, "bilinear")?;
        if let Some(c) = find_coefficients::<4>(kwl, prefix, "x_coefficients")? {
            self.x_coefficients = c;
        }
        if let Some(c) = find_coefficients::<4>(kwl, prefix, "y_coefficients")? {
            self.y_coefficients = c;
        }
        self.solver.load_state(kwl, &solver_prefix(prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_shift_inverse() {
        let t = ShiftTransform::new(DPoint::new(3.0, -1.0));
        assert_eq!(t.forward(DPoint::new(1.0, 1.0)), DPoint::new(4.0, 0.0));
        assert_eq!(t.inverse(DPoint::new(4.0, 0.0)), DPoint::new(1.0, 1.0));
    }

    #[test]
    fn test_affine_inverse() {
        let t = AffineTransform::from_parts(DPoint::new(2.0, 0.5), 0.3, DPoint::new(100.0, -50.0));
        let p = DPoint::new(7.0, -4.0);
        let back = t.inverse(t.forward(p));
        assert_relative_eq!(back.x, p.x, epsilon = 1e-9);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-9);
    }

    #[test]
    fn test_singular_affine_returns_solver_guess() {
        let t = AffineTransform::new([1.0, 1.0, 0.0, 2.0, 2.0, 0.0]);
        assert_eq!(t.determinant(), 0.0);
        assert_eq!(t.inverse(DPoint::new(3.0, 6.0)), DPoint::new(0.0, 0.0));
    }

    #[test]
    fn test_tie_point_fit() {
        let source = [
            DPoint::new(0.0, 0.0),
            DPoint::new(10.0, 0.0),
            DPoint::new(10.0, 10.0),
            DPoint::new(0.0, 10.0),
        ];
        let destination = [
            DPoint::new(100.0, 200.0),
            DPoint::new(120.0, 205.0),
            DPoint::new(125.0, 230.0),
            DPoint::new(98.0, 221.0),
        ];
        let t = BilinearTransform::from_tie_points(&source, &destination).unwrap();
        for (s, d) in source.iter().zip(&destination) {
            let mapped = t.forward(*s);
            assert_relative_eq!(mapped.x, d.x, epsilon = 1e-9);
            assert_relative_eq!(mapped.y, d.y, epsilon = 1e-9);
        }
        assert_eq!(t.solver().origin, DPoint::new(5.0, 5.0));
    }

    #[test]
    fn test_collinear_tie_points_are_rejected() {
        let source = [
            DPoint::new(0.0, 0.0),
            DPoint::new(1.0, 1.0),
            DPoint::new(2.0, 2.0),
            DPoint::new(3.0, 3.0),
        ];
        assert!(BilinearTransform::from_tie_points(&source, &source).is_err());
    }

    #[test]
    fn test_type_mismatch_is_an_error() {
        let mut kwl = KeywordList::new();
        ShiftTransform::new(DPoint::new(1.0, 2.0)).save_state(&mut kwl, "");
        assert!(AffineTransform::default().load_state(&kwl, "").is_err());
    }
}
