//! Atlas metadata, as stored in `metadata.json`.

use brainrender_core::{AxisCorrection, BrainrenderError, Result};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Normals of the three named section planes, in atlas axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaneNormals {
    pub sagittal: [f64; 3],
    pub frontal: [f64; 3],
    pub horizontal: [f64; 3],
}

impl Default for PlaneNormals {
    fn default() -> Self {
        Self {
            sagittal: [0.0, 0.0, 1.0],
            frontal: [1.0, 0.0, 0.0],
            horizontal: [0.0, 1.0, 0.0],
        }
    }
}

impl PlaneNormals {
    /// Normal of a named plane.
    pub fn get(&self, name: &str) -> Option<Vec3> {
        let n = match name.to_ascii_lowercase().as_str() {
            "sagittal" => self.sagittal,
            "frontal" | "coronal" => self.frontal,
            "horizontal" | "axial" => self.horizontal,
            _ => return None,
        };
        Some(Vec3::new(n[0] as f32, n[1] as f32, n[2] as f32))
    }
}

/// Immutable description of an atlas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtlasMetadata {
    pub name: String,
    /// Micrometres per voxel along each axis.
    pub resolution: [f64; 3],
    /// Voxels along each axis.
    pub shape: [usize; 3],
    /// Three-letter orientation code, e.g. `"asr"`.
    #[serde(default = "default_orientation")]
    pub orientation: String,
    #[serde(default)]
    pub axis_order: Vec<String>,
    #[serde(default)]
    pub plane_normals: PlaneNormals,
    pub midline_point: [f64; 3],
    /// A camera name or parameter object.
    #[serde(default)]
    pub default_camera: Option<serde_json::Value>,
    #[serde(default)]
    pub species: Option<String>,
    #[serde(default = "default_symmetric")]
    pub symmetric: bool,
}

fn default_orientation() -> String {
    brainrender_core::CANONICAL_ORIENTATION.to_string()
}

fn default_symmetric() -> bool {
    true
}

impl AtlasMetadata {
    /// Checks sizes and the orientation code.
    pub fn validate(&self) -> Result<()> {
        if self.shape.iter().any(|&n| n == 0) {
            return Err(BrainrenderError::invalid(format!("atlas shape {:?} has an empty axis", self.shape)));
        }
        if self.resolution.iter().any(|&r| !(r.is_finite() && r > 0.0)) {
            return Err(BrainrenderError::invalid(format!(
                "atlas resolution {:?} must be positive",
                self.resolution
            )));
        }
        self.axis_correction()?;
        Ok(())
    }

    pub fn resolution_vec(&self) -> Vec3 {
        Vec3::new(self.resolution[0] as f32, self.resolution[1] as f32, self.resolution[2] as f32)
    }

    /// Physical size of the volume along each axis.
    pub fn extent(&self) -> Vec3 {
        let shape = Vec3::new(self.shape[0] as f32, self.shape[1] as f32, self.shape[2] as f32);
        shape * self.resolution_vec()
    }

    pub fn midline(&self) -> Vec3 {
        Vec3::new(
            self.midline_point[0] as f32,
            self.midline_point[1] as f32,
            self.midline_point[2] as f32,
        )
    }

    /// Index of the left-right axis and whether that axis starts on the
    /// right.
    pub fn lateral_axis(&self) -> Option<(usize, bool)> {
        self.orientation
            .to_ascii_lowercase()
            .chars()
            .enumerate()
            .find_map(|(i, c)| match c {
                'r' => Some((i, true)),
                'l' => Some((i, false)),
                _ => None,
            })
    }

    /// The correction mapping this atlas' axes to display axes.
    pub fn axis_correction(&self) -> Result<AxisCorrection> {
        AxisCorrection::from_orientation(&self.orientation, self.extent())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> AtlasMetadata {
        serde_json::from_value(serde_json::json!({
            "name": "test_atlas",
            "resolution": [100.0, 100.0, 100.0],
            "shape": [10, 8, 6],
            "midline_point": [500.0, 400.0, 300.0]
        }))
        .expect("minimal metadata")
    }

    #[test]
    fn test_defaults() {
        let m = metadata();
        assert_eq!(m.orientation, "asr");
        assert!(m.symmetric);
        assert_eq!(m.plane_normals.get("sagittal"), Some(Vec3::Z));
        assert_eq!(m.plane_normals.get("coronal"), Some(Vec3::X));
        assert_eq!(m.plane_normals.get("oblique"), None);
        assert_eq!(m.lateral_axis(), Some((2, true)));
        assert_eq!(m.extent(), Vec3::new(1000.0, 800.0, 600.0));
        m.validate().expect("valid");
    }

    #[test]
    fn test_invalid() {
        let mut m = metadata();
        m.shape = [0, 1, 1];
        assert!(m.validate().is_err());
        let mut m = metadata();
        m.orientation = "aaa".to_string();
        assert!(m.validate().is_err());
    }
}
