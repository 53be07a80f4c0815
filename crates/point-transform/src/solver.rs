//! Newton-Raphson inversion of a forward mapping.

use raster_common::{DPoint, KeywordList, RasterError, StatePersistence};
use serde::{Deserialize, Serialize};

/// Residual and step size below which the search stops.
pub const DEFAULT_CONVERGENCE_THRESHOLD: f64 = 1000.0 * f64::EPSILON;

pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// Result of one inversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Inversion {
    /// Best estimate of the source point. When the search did not converge
    /// this is the last guess.
    pub point: DPoint,
    /// Newton steps taken.
    pub iterations: u32,
    pub converged: bool,
}

/// Two-dimensional Newton-Raphson search with a finite-difference Jacobian.
///
/// Each step evaluates the forward mapping at the guess and at the guess
/// shifted by `dx_dy.x` along x and `dx_dy.y` along y, then solves the 2x2
/// system for the step that zeroes the residual. A singular Jacobian gives
/// a zero step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NewtonSolver {
    pub convergence_threshold: f64,
    pub max_iterations: u32,
    /// Finite-difference offsets. Pick them on the scale of the source frame.
    pub dx_dy: DPoint,
    /// Starting guess.
    pub origin: DPoint,
}

impl Default for NewtonSolver {
    fn default() -> Self {
        Self {
            convergence_threshold: DEFAULT_CONVERGENCE_THRESHOLD,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            dx_dy: DPoint::new(1.0, 1.0),
            origin: DPoint::new(0.0, 0.0),
        }
    }
}

impl NewtonSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_origin(mut self, origin: DPoint) -> Self {
        self.origin = origin;
        self
    }

    /// Zero offsets are replaced by 1.
    pub fn with_dx_dy(mut self, dx_dy: DPoint) -> Self {
        let sanitize = |v: f64| if v.is_finite() && v != 0.0 { v } else { 1.0 };
        self.dx_dy = DPoint::new(sanitize(dx_dy.x), sanitize(dx_dy.y));
        self
    }

    pub fn with_convergence_threshold(mut self, threshold: f64) -> Self {
        self.convergence_threshold = threshold.abs();
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    fn below_threshold(&self, p: DPoint) -> bool {
        p.x.abs() < self.convergence_threshold && p.y.abs() < self.convergence_threshold
    }

    /// Find the point that `forward` maps onto `target`.
    pub fn solve<F>(&self, forward: F, target: DPoint) -> Inversion
    where
        F: Fn(DPoint) -> DPoint,
    {
        let mut guess = self.origin;
        let mut iterations = 0;

        loop {
            let at_guess = forward(guess);
            let residual = target - at_guess;
            if self.below_threshold(residual) {
                return Inversion {
                    point: guess,
                    iterations,
                    converged: true,
                };
            }
            if iterations >= self.max_iterations {
                break;
            }

            let step_x = forward(guess + DPoint::new(self.dx_dy.x, 0.0));
            let step_y = forward(guess + DPoint::new(0.0, self.dx_dy.y));
            let e = (step_x.x - at_guess.x) / self.dx_dy.x;
            let f = (step_y.x - at_guess.x) / self.dx_dy.y;
            let g = (step_x.y - at_guess.y) / self.dx_dy.x;
            let h = (step_y.y - at_guess.y) / self.dx_dy.y;

            let det = e * h - f * g;
            let delta = if det == 0.0 {
                DPoint::new(0.0, 0.0)
            } else {
                DPoint::new(
                    (h * residual.x - f * residual.y) / det,
                    (e * residual.y - g * residual.x) / det,
                )
            };
            guess = guess + delta;
            iterations += 1;

            if det != 0.0 && self.below_threshold(delta) {
                return Inversion {
                    point: guess,
                    iterations,
                    converged: true,
                };
            }
        }

        tracing::warn!(
            target_x = target.x,
            target_y = target.y,
            guess = %guess,
            iterations,
            "newton inverse did not converge"
        );
        Inversion {
            point: guess,
            iterations,
            converged: false,
        }
    }
}

impl StatePersistence for NewtonSolver {
    fn save_state(&self, kwl: &mut KeywordList, prefix: &str) {
        kwl.add(prefix, "convergence_threshold", self.convergence_threshold);
        kwl.add(prefix, "max_iterations", self.max_iterations);
        kwl.add_point(prefix, "dx_dy", self.dx_dy);
        kwl.add_point(prefix, "origin", self.origin);
    }

    fn load_state(&mut self, kwl: &KeywordList, prefix: &str) -> raster_common::Result<()> {
        if let Some(threshold) = kwl.find_parsed::<f64>(prefix, "convergence_threshold")? {
            if !threshold.is_finite() {
                return Err(RasterError::keyword(
                    format!("{prefix}convergence_threshold"),
                    "must be finite",
                ));
            }
            *self = self.with_convergence_threshold(threshold);
        }
        if let Some(max_iterations) = kwl.find_parsed::<u32>(prefix, "max_iterations")? {
            self.max_iterations = max_iterations;
        }
        if let Some(dx_dy) = kwl.find_point(prefix, "dx_dy")? {
            *self = self.with_dx_dy(dx_dy);
        }
        if let Some(origin) = kwl.find_point(prefix, "origin")? {
            self.origin = origin;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_identity_converges_in_one_step() {
        let result = NewtonSolver::default().solve(|p| p, DPoint::new(12.5, -3.0));
        assert!(result.converged);
        assert_eq!(result.iterations, 1);
        assert_eq!(result.point, DPoint::new(12.5, -3.0));
    }

    #[test]
    fn test_target_at_origin_needs_no_step() {
        let result = NewtonSolver::default().solve(|p| p, DPoint::new(0.0, 0.0));
        assert!(result.converged);
        assert_eq!(result.iterations, 0);
    }

    #[test]
    fn test_translation() {
        let shift = DPoint::new(4.0, -2.5);
        let target = DPoint::new(1.5, 7.25);
        let result = NewtonSolver::default().solve(|p| p + shift, target);
        assert!(result.converged);
        assert_relative_eq!(result.point.x, target.x - shift.x, epsilon = DEFAULT_CONVERGENCE_THRESHOLD);
        assert_relative_eq!(result.point.y, target.y - shift.y, epsilon = DEFAULT_CONVERGENCE_THRESHOLD);
    }

    #[test]
    fn test_nonlinear_mapping() {
        let forward = |p: DPoint| DPoint::new(p.x + 0.1 * p.x * p.x, p.y + 0.05 * p.x * p.y);
        let source = DPoint::new(2.0, 3.0);
        let solver = NewtonSolver::default()
            .with_dx_dy(DPoint::new(1e-6, 1e-6))
            .with_convergence_threshold(1e-9)
            .with_max_iterations(20);
        let result = solver.solve(forward, forward(source));
        assert!(result.converged);
        assert_relative_eq!(result.point.x, source.x, epsilon = 1e-6);
        assert_relative_eq!(result.point.y, source.y, epsilon = 1e-6);
    }

    #[test]
    fn test_singular_jacobian_does_not_move() {
        let collapse = |p: DPoint| DPoint::new(p.x + p.y, p.x + p.y);
        let solver = NewtonSolver::default().with_origin(DPoint::new(1.0, 1.0));
        let result = solver.solve(collapse, DPoint::new(5.0, 7.0));
        assert!(!result.converged);
        assert_eq!(result.point, DPoint::new(1.0, 1.0));
        assert_eq!(result.iterations, DEFAULT_MAX_ITERATIONS);
    }

    #[test]
    fn test_zero_offsets_are_replaced() {
        let solver = NewtonSolver::default().with_dx_dy(DPoint::new(0.0, f64::NAN));
        assert_eq!(solver.dx_dy, DPoint::new(1.0, 1.0));
    }

    #[test]
    fn test_state_round_trip() {
        let solver = NewtonSolver::default()
            .with_origin(DPoint::new(10.0, 20.0))
            .with_dx_dy(DPoint::new(0.5, 0.25))
            .with_max_iterations(30);
        let mut kwl = KeywordList::new();
        solver.save_state(&mut kwl, "newton.");

        let mut restored = NewtonSolver::default();
        restored.load_state(&kwl, "newton.").unwrap();
        assert_eq!(restored, solver);
    }
}
