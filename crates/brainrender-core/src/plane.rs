//! Oriented planes used for slicing and projection.
//!
//! A plane is defined by a point (origin) and a unit normal. The normal points
//! toward the half-space that survives a cut.

use glam::{Mat4, Vec2, Vec3};

/// An oriented plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    origin: Vec3,
    normal: Vec3,
}

impl Plane {
    /// Creates a plane through `origin`. A zero normal falls back to `+Y`.
    pub fn new(origin: Vec3, normal: Vec3) -> Self {
        let normal = normal.normalize_or_zero();
        Self {
            origin,
            normal: if normal == Vec3::ZERO { Vec3::Y } else { normal },
        }
    }

    /// Returns the origin point of the plane.
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    /// Returns the unit normal.
    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    /// Same plane with the opposite orientation.
    #[must_use]
    pub fn flipped(&self) -> Self {
        Self {
            origin: self.origin,
            normal: -self.normal,
        }
    }

    /// Same normal, origin moved by `offset` along the normal.
    #[must_use]
    pub fn offset(&self, offset: f32) -> Self {
        Self {
            origin: self.origin + self.normal * offset,
            normal: self.normal,
        }
    }

    /// Returns the signed distance from a point to the plane.
    ///
    /// Positive values are on the normal side (kept), negative on the opposite (discarded).
    pub fn signed_distance(&self, point: Vec3) -> f32 {
        (point - self.origin).dot(self.normal)
    }

    /// Returns whether a point is on the kept side of the plane.
    pub fn is_kept(&self, point: Vec3) -> bool {
        self.signed_distance(point) >= 0.0
    }

    /// Projects a point onto the plane.
    pub fn project(&self, point: Vec3) -> Vec3 {
        point - self.signed_distance(point) * self.normal
    }

    /// In-plane orthonormal axes `(u, v)` with `u x v == normal`.
    ///
    /// `u` is the coordinate axis following the dominant normal component,
    /// made orthogonal to the normal, so the basis is stable for axis-aligned planes.
    pub fn basis(&self) -> (Vec3, Vec3) {
        let n = self.normal;
        let abs = n.abs();
        let k = if abs.x >= abs.y && abs.x >= abs.z {
            0
        } else if abs.y >= abs.z {
            1
        } else {
            2
        };
        let mut axis = Vec3::ZERO;
        axis[(k + 1) % 3] = 1.0;
        let u = (axis - n * n.dot(axis)).normalize();
        let v = n.cross(u);
        (u, v)
    }

    /// Coordinates of `point` in the plane's `(u, v)` basis, relative to the origin.
    pub fn to_local_2d(&self, point: Vec3) -> Vec2 {
        let (u, v) = self.basis();
        let d = point - self.origin;
        Vec2::new(d.dot(u), d.dot(v))
    }

    /// The plane expressed in the space reached by `matrix`.
    #[must_use]
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        let origin = matrix.transform_point3(self.origin);
        // normals transform with the inverse transpose
        let normal = matrix.inverse().transpose().transform_vector3(self.normal);
        Self::new(origin, normal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_distance() {
        let plane = Plane::new(Vec3::new(0.0, 2.0, 0.0), Vec3::new(0.0, 5.0, 0.0));
        assert_eq!(plane.normal(), Vec3::Y);
        assert!((plane.signed_distance(Vec3::new(1.0, 5.0, 3.0)) - 3.0).abs() < 1e-6);
        assert!(plane.is_kept(Vec3::new(0.0, 2.0, 0.0)));
        assert!(!plane.is_kept(Vec3::ZERO));
        assert!(!plane.flipped().is_kept(Vec3::new(0.0, 3.0, 0.0)));
    }

    #[test]
    fn test_zero_normal_fallback() {
        let plane = Plane::new(Vec3::ZERO, Vec3::ZERO);
        assert_eq!(plane.normal(), Vec3::Y);
    }

    #[test]
    fn test_basis_is_right_handed() {
        for n in [Vec3::X, Vec3::Y, Vec3::Z, Vec3::new(0.3, -0.4, 0.8)] {
            let plane = Plane::new(Vec3::ONE, n);
            let (u, v) = plane.basis();
            assert!(u.dot(plane.normal()).abs() < 1e-6);
            assert!(v.dot(plane.normal()).abs() < 1e-6);
            assert!((u.cross(v) - plane.normal()).length() < 1e-5);
        }
    }

    #[test]
    fn test_local_2d() {
        let plane = Plane::new(Vec3::new(1.0, 1.0, 1.0), Vec3::X);
        let (u, v) = plane.basis();
        let p = Vec3::new(1.0, 1.0, 1.0) + 2.0 * u - 3.0 * v + 7.0 * Vec3::X;
        let local = plane.to_local_2d(p);
        assert!((local - Vec2::new(2.0, -3.0)).length() < 1e-5);
    }

    #[test]
    fn test_transformed_by_reflection() {
        let plane = Plane::new(Vec3::new(0.0, 0.0, 5.0), Vec3::Z);
        let flip = Mat4::from_scale(Vec3::new(1.0, 1.0, -1.0));
        let moved = plane.transformed(&flip);
        assert_eq!(moved.origin(), Vec3::new(0.0, 0.0, -5.0));
        assert!((moved.normal() + Vec3::Z).length() < 1e-6);
        // a kept point stays kept on the other side of the transform
        let p = Vec3::new(1.0, 2.0, 8.0);
        assert!(plane.is_kept(p));
        assert!(moved.is_kept(flip.transform_point3(p)));
    }
}
