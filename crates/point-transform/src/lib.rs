//! Two-dimensional point transforms.
//!
//! [`Transform2d`] only requires a forward mapping. The inverse defaults to
//! a Newton-Raphson search driven by [`NewtonSolver`], using finite
//! differences for the Jacobian; transforms with a closed-form inverse
//! override it.

pub mod solver;
pub mod transforms;

pub use solver::{Inversion, NewtonSolver, DEFAULT_CONVERGENCE_THRESHOLD, DEFAULT_MAX_ITERATIONS};
pub use transforms::{AffineTransform, BilinearTransform, IdentityTransform, ShiftTransform};

use raster_common::DPoint;

/// A mapping between two planar coordinate frames.
pub trait Transform2d: Send + Sync {
    /// Map a point from the source frame to the destination frame.
    fn forward(&self, p: DPoint) -> DPoint;

    /// Solver used by the default [`Transform2d::inverse`].
    fn solver(&self) -> &NewtonSolver;

    /// Map a point from the destination frame back to the source frame.
    fn inverse(&self, p: DPoint) -> DPoint {
        self.solver().solve(|q| self.forward(q), p).point
    }

    fn forward_batch(&self, points: &mut [DPoint]) {
        for p in points.iter_mut() {
            *p = self.forward(*p);
        }
    }

    fn inverse_batch(&self, points: &mut [DPoint]) {
        for p in points.iter_mut() {
            *p = self.inverse(*p);
        }
    }
}
