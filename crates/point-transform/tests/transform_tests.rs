//! Forward/inverse consistency across transform kinds.

use approx::assert_relative_eq;
use point_transform::{
    AffineTransform, BilinearTransform, IdentityTransform, NewtonSolver, ShiftTransform, Transform2d,
    DEFAULT_CONVERGENCE_THRESHOLD,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use raster_common::{DPoint, KeywordList, StatePersistence};

/// Image corners mapped onto a skewed ground quadrilateral.
fn ground_quad() -> BilinearTransform {
    let image = [
        DPoint::new(0.0, 0.0),
        DPoint::new(1024.0, 0.0),
        DPoint::new(1024.0, 768.0),
        DPoint::new(0.0, 768.0),
    ];
    let ground = [
        DPoint::new(5000.0, 9000.0),
        DPoint::new(6100.0, 9150.0),
        DPoint::new(6300.0, 8200.0),
        DPoint::new(4900.0, 8050.0),
    ];
    BilinearTransform::from_tie_points(&image, &ground).unwrap()
}

// ============================================================================
// Newton fixed points
// ============================================================================

#[test]
fn test_identity_inverse_through_solver() {
    let solver = NewtonSolver::default();
    let target = DPoint::new(-812.25, 77.5);
    let result = solver.solve(|p| IdentityTransform::new().forward(p), target);
    assert!(result.converged);
    assert_eq!(result.iterations, 1);
    assert_eq!(result.point, target);
}

#[test]
fn test_translation_inverse_through_solver() {
    let shift = ShiftTransform::new(DPoint::new(12.0, -7.5));
    let target = DPoint::new(3.25, 4.0);
    let result = shift.solver().solve(|p| shift.forward(p), target);
    assert!(result.converged);
    let expected = shift.inverse(target);
    assert_relative_eq!(result.point.x, expected.x, epsilon = DEFAULT_CONVERGENCE_THRESHOLD);
    assert_relative_eq!(result.point.y, expected.y, epsilon = DEFAULT_CONVERGENCE_THRESHOLD);
}

#[test]
fn test_affine_solver_matches_closed_form() {
    let t = AffineTransform::from_parts(DPoint::new(1.5, 0.75), -0.4, DPoint::new(20.0, 30.0));
    let target = DPoint::new(40.0, 12.0);
    let numeric = t.solver().solve(|p| t.forward(p), target);
    let exact = t.inverse(target);
    assert!(numeric.converged);
    assert_relative_eq!(numeric.point.x, exact.x, epsilon = 1e-9);
    assert_relative_eq!(numeric.point.y, exact.y, epsilon = 1e-9);
}

// ============================================================================
// Bilinear
// ============================================================================

#[test]
fn test_bilinear_round_trip_inside_quad() {
    let t = ground_quad().with_solver(
        NewtonSolver::default()
            .with_origin(DPoint::new(512.0, 384.0))
            .with_convergence_threshold(1e-9),
    );
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..200 {
        let p = DPoint::new(rng.gen_range(0.0..1024.0), rng.gen_range(0.0..768.0));
        let back = t.inverse(t.forward(p));
        assert_relative_eq!(back.x, p.x, epsilon = 1e-6);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-6);
    }
}

#[test]
fn test_too_few_iterations_returns_last_guess() {
    let t = ground_quad().with_solver(NewtonSolver::default().with_max_iterations(0));
    let p = t.inverse(DPoint::new(6000.0, 8500.0));
    assert_eq!(p, t.solver().origin);
}

#[test]
fn test_batch_inverse() {
    let t = ground_quad().with_solver(NewtonSolver::default().with_convergence_threshold(1e-9));
    let source = [DPoint::new(10.0, 20.0), DPoint::new(900.0, 700.0)];
    let mut points = source;
    t.forward_batch(&mut points);
    t.inverse_batch(&mut points);
    for (p, s) in points.iter().zip(&source) {
        assert_relative_eq!(p.x, s.x, epsilon = 1e-6);
        assert_relative_eq!(p.y, s.y, epsilon = 1e-6);
    }
}

#[test]
fn test_trait_objects() {
    let transforms: Vec<Box<dyn Transform2d>> = vec![
        Box::new(IdentityTransform::new()),
        Box::new(ShiftTransform::new(DPoint::new(1.0, 1.0))),
        Box::new(AffineTransform::from_parts(DPoint::new(2.0, 2.0), 0.0, DPoint::new(0.0, 0.0))),
    ];
    let p = DPoint::new(3.0, 4.0);
    for t in &transforms {
        let back = t.inverse(t.forward(p));
        assert_relative_eq!(back.x, p.x, epsilon = 1e-12);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-12);
    }
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn test_bilinear_state_round_trip() {
    let t = ground_quad();
    let mut kwl = KeywordList::new();
    t.save_state(&mut kwl, "transform.");
    assert_eq!(kwl.find("transform.", "type"), Some("bilinear"));

    let mut restored = BilinearTransform::default();
    restored.load_state(&kwl, "transform.").unwrap();
    assert_eq!(restored, t);
}

#[test]
fn test_wrong_coefficient_count_is_an_error() {
    let mut kwl = KeywordList::new();
    kwl.add("", "coefficients", "1 0 0 1");
    assert!(AffineTransform::default().load_state(&kwl, "").is_err());
}
