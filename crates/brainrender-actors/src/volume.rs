//! Surfaces extracted from 3-D scalar grids.

use std::path::{Path, PathBuf};

use brainrender_core::io::{data_extension, read_npy};
use brainrender_core::{to_rgb, BrainrenderError, ColorLike, Mesh, Result, ScalarGrid};
use brainrender_render::map_color;
use glam::Vec3;

use crate::actor::{Actor, BrClass};

/// How a grid becomes a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VolumeMode {
    /// Exposed faces of the voxels above the threshold.
    Lego,
    /// Marching-cubes isosurface at the threshold.
    #[default]
    Isosurface,
}

/// A grid given in memory or as a 3-D `.npy` file.
#[derive(Debug, Clone)]
pub enum VolumeInput {
    Grid(ScalarGrid),
    File(PathBuf),
}

impl From<ScalarGrid> for VolumeInput {
    fn from(grid: ScalarGrid) -> Self {
        Self::Grid(grid)
    }
}

impl From<&Path> for VolumeInput {
    fn from(path: &Path) -> Self {
        Self::File(path.to_path_buf())
    }
}

impl From<PathBuf> for VolumeInput {
    fn from(path: PathBuf) -> Self {
        Self::File(path)
    }
}

/// Options for [`volume`].
#[derive(Debug, Clone)]
pub struct VolumeOptions {
    /// Voxel edge in micrometres; overrides the grid spacing when set.
    pub voxel_size: Option<f32>,
    /// World position of the grid corner; overrides the grid origin when set.
    pub origin: Option<Vec3>,
    /// Absolute threshold. Takes precedence over `min_quantile`.
    pub min_value: Option<f32>,
    /// Threshold as a quantile of the voxel values.
    pub min_quantile: Option<f32>,
    pub mode: VolumeMode,
    pub color: ColorLike,
    /// Colours vertices by the nearest voxel value when set.
    pub cmap: Option<String>,
    pub alpha: f32,
    pub name: Option<String>,
}

impl Default for VolumeOptions {
    fn default() -> Self {
        Self {
            voxel_size: None,
            origin: None,
            min_value: None,
            min_quantile: None,
            mode: VolumeMode::Isosurface,
            color: "salmon".into(),
            cmap: None,
            alpha: 1.0,
            name: None,
        }
    }
}

impl VolumeOptions {
    /// `min_value`, else the `min_quantile` of `grid`, else zero.
    pub fn threshold(&self, grid: &ScalarGrid) -> f32 {
        match (self.min_value, self.min_quantile) {
            (Some(value), _) => value,
            (None, Some(q)) => grid.quantile(q),
            (None, None) => 0.0,
        }
    }
}

/// Loads a 3-D `.npy` grid with unit spacing.
pub fn load_grid(path: &Path) -> Result<ScalarGrid> {
    if data_extension(path).as_deref() != Some("npy") {
        return Err(BrainrenderError::UnsupportedFormat(format!(
            "volumes must be .npy files, got {}",
            path.display()
        )));
    }
    let array = read_npy::<f32>(path)?;
    match array.shape.as_slice() {
        &[a, b, c] => ScalarGrid::new([a, b, c], array.data),
        shape => Err(BrainrenderError::invalid(format!("volume must be 3-D, got shape {shape:?}"))),
    }
}

/// Surface of the voxels above `threshold`.
///
/// Fails when no voxel exceeds the threshold.
pub fn extract_surface(grid: &ScalarGrid, threshold: f32, mode: VolumeMode) -> Result<Mesh> {
    if !grid.values().iter().any(|&v| v > threshold) {
        return Err(BrainrenderError::invalid(format!("no voxel is above the threshold {threshold}")));
    }
    match mode {
        VolumeMode::Lego => Ok(grid.lego_surface(threshold)),
        VolumeMode::Isosurface => grid.isosurface(threshold),
    }
}

fn nearest_value(grid: &ScalarGrid, p: Vec3) -> f32 {
    let [nx, ny, nz] = grid.shape();
    let cell = ((p - grid.origin()) / grid.spacing() - Vec3::splat(0.5)).round();
    let clamp = |v: f32, n: usize| (v.max(0.0) as usize).min(n - 1);
    grid.get(clamp(cell.x, nx), clamp(cell.y, ny), clamp(cell.z, nz))
        .unwrap_or(0.0)
}

/// Builds a volume actor. The actor keeps the grid it was built from.
pub fn volume(input: impl Into<VolumeInput>, options: &VolumeOptions) -> Result<Actor> {
    let mut grid = match input.into() {
        VolumeInput::Grid(grid) => grid,
        VolumeInput::File(path) => load_grid(&path)?,
    };
    if let Some(size) = options.voxel_size {
        if !(size > 0.0) {
            return Err(BrainrenderError::invalid(format!("voxel size must be positive, got {size}")));
        }
        grid = grid.with_spacing(Vec3::splat(size));
    }
    if let Some(origin) = options.origin {
        grid = grid.with_origin(origin);
    }

    let threshold = options.threshold(&grid);
    log::debug!("extracting {:?} surface at {threshold}", options.mode);
    let mut mesh = extract_surface(&grid, threshold, options.mode)?
        .with_color(to_rgb(&options.color)?)
        .with_alpha(options.alpha);
    if let Some(cmap) = &options.cmap {
        let hi = grid.max();
        let colors = mesh
            .points()
            .iter()
            .map(|&p| map_color(nearest_value(&grid, p), cmap, threshold, hi))
            .collect::<Result<Vec<_>>>()?;
        mesh.set_vertex_colors(colors)?;
    }
    let name = options.name.clone().unwrap_or_else(|| "Volume".to_string());
    Ok(Actor::new(mesh, name, BrClass::Volume).with_volume(grid))
}
