//! Canonical anatomical axes and the axis correction applied to atlas geometry.
//!
//! Atlas data arrive in the atlas' native voxel axes, described by a
//! three-letter orientation code such as `"asr"` (one letter per axis, naming
//! the anatomical direction of that axis' origin: anterior/posterior,
//! superior/inferior, right/left). Geometry is first brought into the
//! canonical `"asr"` order, then the left-right axis is reflected so that the
//! rendered brain is right-handed.

use glam::{Mat4, Vec3};

use crate::error::{BrainrenderError, Result};
use crate::mesh::Mesh;
use crate::plane::Plane;

/// Orientation code of the canonical engine axes.
pub const CANONICAL_ORIENTATION: &str = "asr";

/// The 4x4 matrix applied once to every actor before display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisCorrection {
    matrix: Mat4,
}

impl Default for AxisCorrection {
    fn default() -> Self {
        Self::canonical()
    }
}

impl AxisCorrection {
    /// Correction for atlases already in canonical `"asr"` order: a reflection
    /// of the left-right axis.
    pub fn canonical() -> Self {
        Self {
            matrix: Mat4::from_scale(Vec3::new(1.0, 1.0, -1.0)),
        }
    }

    /// Correction for an atlas with the given orientation code.
    ///
    /// `extent` is the physical size of the atlas volume along each native
    /// axis (shape times resolution); flipped axes are mirrored within it.
    pub fn from_orientation(orientation: &str, extent: Vec3) -> Result<Self> {
        let letters: Vec<char> = orientation.to_ascii_lowercase().chars().collect();
        if letters.len() != 3 {
            return Err(BrainrenderError::invalid(format!(
                "orientation code '{orientation}' must have three letters"
            )));
        }
        let families = [['a', 'p'], ['s', 'i'], ['r', 'l']];
        let mut cols = [[0.0_f32; 4]; 4];
        cols[3][3] = 1.0;
        for (target, family) in families.iter().enumerate() {
            let matches: Vec<usize> = letters
                .iter()
                .enumerate()
                .filter(|(_, l)| family.contains(l))
                .map(|(i, _)| i)
                .collect();
            let [source] = matches.as_slice() else {
                return Err(BrainrenderError::invalid(format!(
                    "orientation code '{orientation}' must name each anatomical axis once"
                )));
            };
            if letters[*source] == family[0] {
                cols[*source][target] = 1.0;
            } else {
                cols[*source][target] = -1.0;
                cols[3][target] = extent[*source];
            }
        }
        let to_canonical = Mat4::from_cols_array_2d(&cols);
        Ok(Self {
            matrix: Self::canonical().matrix * to_canonical,
        })
    }

    /// Returns the matrix.
    pub fn matrix(&self) -> Mat4 {
        self.matrix
    }

    /// Maps an atlas-space point into display space.
    pub fn apply_point(&self, point: Vec3) -> Vec3 {
        self.matrix.transform_point3(point)
    }

    /// Maps a display-space point back into atlas space.
    pub fn invert_point(&self, point: Vec3) -> Vec3 {
        self.matrix.inverse().transform_point3(point)
    }

    /// Transforms a mesh in place. Triangle winding is kept outward.
    pub fn apply_mesh(&self, mesh: &mut Mesh) {
        mesh.apply_transform(&self.matrix);
    }

    /// Maps an atlas-space plane into display space.
    pub fn apply_plane(&self, plane: &Plane) -> Plane {
        plane.transformed(&self.matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_reflects_third_axis() {
        let m = AxisCorrection::canonical();
        assert_eq!(m.apply_point(Vec3::new(1.0, 2.0, 3.0)), Vec3::new(1.0, 2.0, -3.0));
        assert!(m.matrix().determinant() < 0.0);
    }

    #[test]
    fn test_asr_matches_canonical() {
        let m = AxisCorrection::from_orientation("asr", Vec3::new(100.0, 80.0, 60.0))
            .expect("valid code");
        assert_eq!(m, AxisCorrection::canonical());
    }

    #[test]
    fn test_permuted_orientation() {
        // native axes: left-right first, then superior-inferior, then posterior-anterior
        let extent = Vec3::new(60.0, 80.0, 100.0);
        let m = AxisCorrection::from_orientation("lsp", extent).expect("valid code");
        let native = Vec3::new(10.0, 20.0, 30.0);
        let canonical = AxisCorrection::canonical().invert_point(m.apply_point(native));
        assert!((canonical - Vec3::new(70.0, 20.0, 50.0)).length() < 1e-4);
        assert!((m.invert_point(m.apply_point(native)) - native).length() < 1e-4);
    }

    #[test]
    fn test_invalid_codes() {
        assert!(AxisCorrection::from_orientation("as", Vec3::ONE).is_err());
        assert!(AxisCorrection::from_orientation("aap", Vec3::ONE).is_err());
        assert!(AxisCorrection::from_orientation("xyz", Vec3::ONE).is_err());
    }

    #[test]
    fn test_mesh_stays_outward() {
        let mut sphere = crate::mesh::shapes::sphere(Vec3::splat(5.0), 2.0, 8);
        AxisCorrection::canonical().apply_mesh(&mut sphere);
        assert!(sphere.signed_volume() > 0.0);
    }
}
