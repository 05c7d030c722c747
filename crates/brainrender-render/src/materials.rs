//! Lighting materials derived from the scene shader style.

use brainrender_core::ShaderStyle;
use glam::Vec3;

/// Phong coefficients used by the software rasteriser.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    /// Ambient light factor (0.0 - 1.0).
    pub ambient: f32,
    /// Diffuse reflection factor (0.0 - 1.0).
    pub diffuse: f32,
    /// Specular reflection intensity (0.0 - 1.0).
    pub specular: f32,
    /// Specular exponent (higher = sharper highlights).
    pub shininess: f32,
}

impl Material {
    /// The material for a shader style.
    pub fn from_style(style: ShaderStyle) -> Self {
        let (ambient, diffuse, specular, shininess) = style.lighting();
        Self {
            ambient,
            diffuse,
            specular,
            shininess,
        }
    }

    /// Unlit material for lines, labels and overlays.
    pub fn flat() -> Self {
        Self {
            ambient: 1.0,
            diffuse: 0.0,
            specular: 0.0,
            shininess: 1.0,
        }
    }

    /// Shades `color` under a headlight looking along `view_dir`.
    ///
    /// Lighting is two-sided: back faces (e.g. inside a cut surface) are lit
    /// as if their normal were flipped.
    pub fn shade(&self, color: Vec3, normal: Vec3, view_dir: Vec3) -> Vec3 {
        let light = -view_dir;
        let n = if normal.dot(light) < 0.0 { -normal } else { normal };
        let lambert = n.dot(light).max(0.0);
        // headlight: the half vector coincides with the light direction
        let spec = if self.specular > 0.0 {
            self.specular * lambert.powf(self.shininess)
        } else {
            0.0
        };
        (color * (self.ambient + self.diffuse * lambert) + Vec3::splat(spec))
            .clamp(Vec3::ZERO, Vec3::ONE)
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::from_style(ShaderStyle::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_ignores_normal() {
        let m = Material::flat();
        let c = Vec3::new(0.2, 0.4, 0.6);
        assert_eq!(m.shade(c, Vec3::X, Vec3::Z), c);
    }

    #[test]
    fn test_facing_surface_is_brighter() {
        let m = Material::from_style(ShaderStyle::Plastic);
        let c = Vec3::splat(0.5);
        let facing = m.shade(c, Vec3::Z, -Vec3::Z);
        let grazing = m.shade(c, Vec3::X, -Vec3::Z);
        assert!(facing.x > grazing.x);
        // two-sided
        assert_eq!(m.shade(c, -Vec3::Z, -Vec3::Z), facing);
    }
}
