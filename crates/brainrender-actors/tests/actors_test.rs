//! Property tests for actor factories and in-place actor edits.

use brainrender_actors::*;
use brainrender_core::{shapes, AxisCorrection, Plane, Vec3};
use proptest::prelude::*;

fn finite_point() -> impl Strategy<Value = Vec3> {
    (-5_000.0f32..5_000.0, -5_000.0f32..5_000.0, -5_000.0f32..5_000.0).prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

fn unit_normal() -> impl Strategy<Value = Vec3> {
    (-1.0f32..1.0, -1.0f32..1.0, -1.0f32..1.0)
        .prop_filter("non-degenerate normal", |(x, y, z)| x * x + y * y + z * z > 0.01)
        .prop_map(|(x, y, z)| Vec3::new(x, y, z).normalize())
}

#[test]
fn test_points_keep_their_coordinates() {
    let coords = vec![Vec3::new(1.0, 2.0, 3.0), Vec3::new(400.0, 500.0, 600.0)];
    let actor = points(coords, &PointsOptions::default()).expect("points");
    assert_eq!(actor.br_class(), BrClass::Points);
    let (lo, hi) = actor.bounds().expect("bounds");
    let radius = PointsOptions::default().radius;
    assert!(lo.cmple(Vec3::new(1.0, 2.0, 3.0)).all());
    assert!(hi.cmpge(Vec3::new(400.0, 500.0, 600.0)).all());
    assert!((hi - lo).max_element() <= 599.0 + 2.0 * radius + 1e-3);
}

#[test]
fn test_non_finite_points_are_rejected() {
    let coords = vec![Vec3::ZERO, Vec3::new(f32::NAN, 0.0, 0.0)];
    assert!(points(coords, &PointsOptions::default()).is_err());
}

#[test]
fn test_correction_is_applied_once() {
    let mut actor = Actor::new(shapes::sphere(Vec3::new(100.0, 200.0, 300.0), 10.0, 8), "ball", BrClass::FromFile);
    let correction = AxisCorrection::canonical();
    assert!(actor.apply_axis_correction(&correction));
    let moved = actor.points().to_vec();
    assert!(!actor.apply_axis_correction(&correction));
    assert_eq!(actor.points(), moved.as_slice());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn ruler_reports_scaled_distance(a in finite_point(), b in finite_point()) {
        let options = RulerOptions { unit_scale: 0.001, ..RulerOptions::default() };
        let actor = ruler(a, b, &options).expect("ruler");
        let expected = format_significant(f64::from(a.distance(b)) * f64::from(0.001_f32), 3);
        prop_assert_eq!(actor.text(), Some(expected.as_str()));
    }

    #[test]
    fn cut_keeps_the_positive_side(offset in -8.0f32..8.0, normal in unit_normal()) {
        let mut actor = Actor::new(shapes::sphere(Vec3::ZERO, 10.0, 16), "ball", BrClass::FromFile);
        let plane = Plane::new(normal * offset, normal);
        actor.cut_with_plane(&plane);
        prop_assert!(actor.points().iter().all(|&p| plane.signed_distance(p) >= -1e-3));
    }
}
