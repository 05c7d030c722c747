//! Color maps for scalar-to-colour mapping.

use std::collections::HashMap;
use std::sync::OnceLock;

use brainrender_core::{BrainrenderError, Result};
use glam::Vec3;

/// Color map used when a caller does not name one.
pub const DEFAULT_COLOR_MAP: &str = "coolwarm";

/// A color map for mapping scalar values to colors.
#[derive(Debug, Clone)]
pub struct ColorMap {
    /// Color map name.
    pub name: String,
    /// Color samples (evenly spaced from 0 to 1).
    pub colors: Vec<Vec3>,
}

impl ColorMap {
    /// Creates a new color map.
    pub fn new(name: impl Into<String>, colors: Vec<Vec3>) -> Self {
        Self {
            name: name.into(),
            colors,
        }
    }

    /// Samples the color map at a given value (0 to 1).
    pub fn sample(&self, t: f32) -> Vec3 {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };

        match self.colors.len() {
            0 => Vec3::ZERO,
            1 => self.colors[0],
            len => {
                let n = len - 1;
                let idx = ((t * n as f32).floor() as usize).min(n - 1);
                let frac = t * n as f32 - idx as f32;
                self.colors[idx].lerp(self.colors[idx + 1], frac)
            }
        }
    }

    /// Samples the map at `value` rescaled from `[vmin, vmax]`.
    ///
    /// A degenerate range maps every value to the middle of the map.
    pub fn sample_range(&self, value: f32, vmin: f32, vmax: f32) -> Vec3 {
        let span = vmax - vmin;
        if span.abs() <= f32::EPSILON {
            return self.sample(0.5);
        }
        self.sample((value - vmin) / span)
    }
}

/// Registry for managing color maps.
#[derive(Default)]
pub struct ColorMapRegistry {
    color_maps: HashMap<String, ColorMap>,
}

impl ColorMapRegistry {
    /// Creates a new color map registry with default color maps.
    pub fn new() -> Self {
        let mut registry = Self::default();
        registry.register_defaults();
        registry
    }

    fn register_defaults(&mut self) {
        self.register(ColorMap::new(
            "viridis",
            vec![
                Vec3::new(0.267, 0.004, 0.329),
                Vec3::new(0.253, 0.265, 0.529),
                Vec3::new(0.163, 0.471, 0.558),
                Vec3::new(0.134, 0.658, 0.517),
                Vec3::new(0.477, 0.821, 0.318),
                Vec3::new(0.993, 0.906, 0.144),
            ],
        ));

        self.register(ColorMap::new(
            "blues",
            vec![
                Vec3::new(0.969, 0.984, 1.000),
                Vec3::new(0.776, 0.859, 0.937),
                Vec3::new(0.419, 0.682, 0.839),
                Vec3::new(0.129, 0.443, 0.710),
                Vec3::new(0.031, 0.188, 0.420),
            ],
        ));

        self.register(ColorMap::new(
            "reds",
            vec![
                Vec3::new(1.000, 0.961, 0.941),
                Vec3::new(0.988, 0.733, 0.631),
                Vec3::new(0.984, 0.416, 0.290),
                Vec3::new(0.796, 0.094, 0.114),
                Vec3::new(0.404, 0.000, 0.051),
            ],
        ));

        self.register(ColorMap::new(
            "greys",
            vec![Vec3::splat(1.0), Vec3::splat(0.6), Vec3::splat(0.0)],
        ));

        self.register(ColorMap::new(
            "coolwarm",
            vec![
                Vec3::new(0.230, 0.299, 0.754),
                Vec3::new(0.552, 0.690, 0.996),
                Vec3::new(0.866, 0.866, 0.866),
                Vec3::new(0.956, 0.604, 0.486),
                Vec3::new(0.706, 0.016, 0.150),
            ],
        ));

        // Diverging blue-white-red, used for signed heatmaps
        self.register(ColorMap::new(
            "bwr",
            vec![
                Vec3::new(0.0, 0.0, 1.0),
                Vec3::new(1.0, 1.0, 1.0),
                Vec3::new(1.0, 0.0, 0.0),
            ],
        ));

        self.register(ColorMap::new(
            "rainbow",
            vec![
                Vec3::new(0.5, 0.0, 1.0),
                Vec3::new(0.0, 0.0, 1.0),
                Vec3::new(0.0, 1.0, 1.0),
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
            ],
        ));
    }

    /// Registers a color map.
    pub fn register(&mut self, color_map: ColorMap) {
        self.color_maps.insert(color_map.name.clone(), color_map);
    }

    /// Gets a color map by name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&ColorMap> {
        self.color_maps
            .get(name)
            .or_else(|| self.color_maps.get(&name.to_ascii_lowercase()))
    }

    /// Returns all color map names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.color_maps.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

fn builtin() -> &'static ColorMapRegistry {
    static REGISTRY: OnceLock<ColorMapRegistry> = OnceLock::new();
    REGISTRY.get_or_init(ColorMapRegistry::new)
}

/// Looks up one of the built-in color maps.
pub fn color_map(name: &str) -> Result<&'static ColorMap> {
    builtin()
        .get(name)
        .ok_or_else(|| BrainrenderError::invalid(format!("unknown color map '{name}'")))
}

/// Maps `value` in `[vmin, vmax]` to a colour from the named map.
pub fn map_color(value: f32, cmap: &str, vmin: f32, vmax: f32) -> Result<Vec3> {
    if !value.is_finite() {
        return Err(BrainrenderError::invalid(format!(
            "cannot map non-finite value {value} to a colour"
        )));
    }
    Ok(color_map(cmap)?.sample_range(value, vmin, vmax))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_endpoints() {
        let map = color_map("bwr").expect("bwr");
        assert_eq!(map.sample(0.0), Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(map.sample(1.0), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(map.sample(0.5), Vec3::ONE);
        assert_eq!(map.sample(-3.0), map.sample(0.0));
    }

    #[test]
    fn test_map_color_range() {
        let low = map_color(-1.0, "coolwarm", -1.0, 2.0).expect("low");
        let high = map_color(2.0, "coolwarm", -1.0, 2.0).expect("high");
        assert!(low.z > low.x);
        assert!(high.x > high.z);
        let flat = map_color(3.0, "greys", 3.0, 3.0).expect("degenerate range");
        assert_eq!(flat, Vec3::splat(0.6));
    }

    #[test]
    fn test_unknown_map_and_nan() {
        assert!(map_color(0.0, "nope", 0.0, 1.0).is_err());
        assert!(map_color(f32::NAN, "viridis", 0.0, 1.0).is_err());
        assert!(color_map("Viridis").is_ok());
        assert!(builtin().names().contains(&DEFAULT_COLOR_MAP));
    }
}
