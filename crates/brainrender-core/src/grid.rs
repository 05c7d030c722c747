//! Dense scalar grids and their surfaces.

use std::collections::HashMap;

use glam::Vec3;

use crate::error::{BrainrenderError, Result};
use crate::marching_cubes::marching_cubes;
use crate::mesh::Mesh;

/// A 3D scalar field sampled on a regular grid, stored in C order.
///
/// Voxel `(i, j, k)` covers the box starting at `origin + spacing * (i, j, k)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarGrid {
    shape: [usize; 3],
    values: Vec<f32>,
    spacing: Vec3,
    origin: Vec3,
}

impl ScalarGrid {
    /// Wraps `values` (length `shape[0] * shape[1] * shape[2]`) with unit spacing.
    pub fn new(shape: [usize; 3], values: Vec<f32>) -> Result<Self> {
        let expected = shape.iter().product::<usize>();
        if values.len() != expected {
            return Err(BrainrenderError::SizeMismatch {
                expected,
                actual: values.len(),
            });
        }
        if expected == 0 {
            return Err(BrainrenderError::invalid("scalar grid has no voxels"));
        }
        Ok(Self {
            shape,
            values,
            spacing: Vec3::ONE,
            origin: Vec3::ZERO,
        })
    }

    /// Fills a grid by evaluating `f` at every voxel index.
    pub fn from_fn(shape: [usize; 3], mut f: impl FnMut(usize, usize, usize) -> f32) -> Result<Self> {
        let mut values = Vec::with_capacity(shape.iter().product());
        for i in 0..shape[0] {
            for j in 0..shape[1] {
                for k in 0..shape[2] {
                    values.push(f(i, j, k));
                }
            }
        }
        Self::new(shape, values)
    }

    /// Builder: voxel size in world units.
    #[must_use]
    pub fn with_spacing(mut self, spacing: Vec3) -> Self {
        self.spacing = spacing;
        self
    }

    /// Builder: world position of the grid corner.
    #[must_use]
    pub fn with_origin(mut self, origin: Vec3) -> Self {
        self.origin = origin;
        self
    }

    /// Returns the grid shape.
    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    /// Returns the raw values.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Returns the voxel size.
    pub fn spacing(&self) -> Vec3 {
        self.spacing
    }

    /// Returns the grid corner.
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    fn index(&self, i: usize, j: usize, k: usize) -> usize {
        (i * self.shape[1] + j) * self.shape[2] + k
    }

    /// Value at a voxel, `None` outside the grid.
    pub fn get(&self, i: usize, j: usize, k: usize) -> Option<f32> {
        (i < self.shape[0] && j < self.shape[1] && k < self.shape[2])
            .then(|| self.values[self.index(i, j, k)])
    }

    /// Largest value.
    pub fn max(&self) -> f32 {
        self.values.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    /// Smallest value.
    pub fn min(&self) -> f32 {
        self.values.iter().copied().fold(f32::INFINITY, f32::min)
    }

    /// Value below which a fraction `q` of the voxels fall (linear interpolation).
    pub fn quantile(&self, q: f32) -> f32 {
        let mut sorted = self.values.clone();
        sorted.sort_by(f32::total_cmp);
        let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f32;
        let lo = pos.floor() as usize;
        let hi = pos.ceil() as usize;
        let t = pos - lo as f32;
        sorted[lo] + (sorted[hi] - sorted[lo]) * t
    }

    /// World-space centre of a voxel.
    pub fn voxel_center(&self, i: usize, j: usize, k: usize) -> Vec3 {
        self.origin + self.spacing * (Vec3::new(i as f32, j as f32, k as f32) + 0.5)
    }

    /// World-space bounds of the whole grid.
    pub fn bounds(&self) -> (Vec3, Vec3) {
        let extent = Vec3::new(
            self.shape[0] as f32,
            self.shape[1] as f32,
            self.shape[2] as f32,
        );
        (self.origin, self.origin + self.spacing * extent)
    }

    fn occupied(&self, i: isize, j: isize, k: isize, threshold: f32) -> bool {
        if i < 0 || j < 0 || k < 0 {
            return false;
        }
        self.get(i as usize, j as usize, k as usize)
            .is_some_and(|v| v > threshold)
    }

    /// Blocky surface made of the exposed faces of every voxel above `threshold`.
    pub fn lego_surface(&self, threshold: f32) -> Mesh {
        let mut vertices: Vec<Vec3> = Vec::new();
        let mut lookup: HashMap<[usize; 3], u32> = HashMap::new();
        let mut corner = |c: [usize; 3], vertices: &mut Vec<Vec3>| -> u32 {
            *lookup.entry(c).or_insert_with(|| {
                let p = Vec3::new(c[0] as f32, c[1] as f32, c[2] as f32);
                vertices.push(self.origin + self.spacing * p);
                (vertices.len() - 1) as u32
            })
        };

        let mut triangles = Vec::new();
        for i in 0..self.shape[0] {
            for j in 0..self.shape[1] {
                for k in 0..self.shape[2] {
                    if self.values[self.index(i, j, k)] <= threshold {
                        continue;
                    }
                    let cell = [i, j, k];
                    for axis in 0..3 {
                        let (u, v) = ((axis + 1) % 3, (axis + 2) % 3);
                        for positive in [false, true] {
                            let mut n = cell.map(|c| c as isize);
                            n[axis] += if positive { 1 } else { -1 };
                            if self.occupied(n[0], n[1], n[2], threshold) {
                                continue;
                            }
                            let mut base = cell;
                            if positive {
                                base[axis] += 1;
                            }
                            let at = |du: usize, dv: usize| {
                                let mut c = base;
                                c[u] += du;
                                c[v] += dv;
                                c
                            };
                            let mut quad = [
                                corner(at(0, 0), &mut vertices),
                                corner(at(1, 0), &mut vertices),
                                corner(at(1, 1), &mut vertices),
                                corner(at(0, 1), &mut vertices),
                            ];
                            if !positive {
                                quad.reverse();
                            }
                            triangles.push([quad[0], quad[1], quad[2]]);
                            triangles.push([quad[0], quad[2], quad[3]]);
                        }
                    }
                }
            }
        }
        Mesh::new(vertices, triangles)
    }

    /// Smooth closed surface enclosing the voxels above `threshold`.
    pub fn isosurface(&self, threshold: f32) -> Result<Mesh> {
        // one voxel of padding keeps the surface closed at the grid border
        let [nx, ny, nz] = self.shape;
        let dims = [nx + 2, ny + 2, nz + 2];
        let mut field = vec![1.0_f32; dims.iter().product()];
        for i in 0..nx {
            for j in 0..ny {
                for k in 0..nz {
                    let at = ((i + 1) * dims[1] + j + 1) * dims[2] + k + 1;
                    field[at] = threshold - self.values[self.index(i, j, k)];
                }
            }
        }
        let surface = marching_cubes(&field, 0.0, dims)?;
        let vertices = surface
            .vertices
            .iter()
            .map(|&v| self.origin + self.spacing * (v - Vec3::splat(0.5)))
            .collect();
        let mut mesh = Mesh::new(vertices, surface.triangles);
        if mesh.signed_volume() < 0.0 {
            mesh.reverse();
        }
        Ok(mesh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ball(n: usize, radius: f32) -> ScalarGrid {
        let c = (n as f32 - 1.0) / 2.0;
        ScalarGrid::from_fn([n, n, n], |i, j, k| {
            let d = Vec3::new(i as f32 - c, j as f32 - c, k as f32 - c).length();
            if d <= radius {
                1.0
            } else {
                0.0
            }
        })
        .expect("valid grid")
    }

    #[test]
    fn test_shape_checked() {
        assert!(ScalarGrid::new([2, 2, 2], vec![0.0; 7]).is_err());
        assert!(ScalarGrid::new([0, 2, 2], Vec::new()).is_err());
    }

    #[test]
    fn test_quantile() {
        let grid = ScalarGrid::new([1, 1, 5], vec![4.0, 0.0, 2.0, 1.0, 3.0]).expect("valid grid");
        assert_eq!(grid.quantile(0.0), 0.0);
        assert_eq!(grid.quantile(0.5), 2.0);
        assert_eq!(grid.quantile(1.0), 4.0);
        assert!((grid.quantile(0.125) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_single_voxel_lego() {
        let mut values = vec![0.0; 27];
        values[13] = 5.0;
        let grid = ScalarGrid::new([3, 3, 3], values)
            .expect("valid grid")
            .with_spacing(Vec3::splat(10.0));
        let cube = grid.lego_surface(0.0);
        assert_eq!(cube.num_triangles(), 12);
        assert_eq!(cube.num_vertices(), 8);
        assert!((cube.signed_volume() - 1000.0).abs() < 1e-2);
        assert_eq!(cube.bounds(), Some((Vec3::splat(10.0), Vec3::splat(20.0))));
    }

    #[test]
    fn test_lego_hides_internal_faces() {
        let grid = ScalarGrid::new([2, 1, 1], vec![1.0, 1.0]).expect("valid grid");
        let block = grid.lego_surface(0.5);
        assert_eq!(block.num_triangles(), 20);
        assert!(block.boundary_edges().is_empty());
        assert!((block.signed_volume() - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_isosurface_is_outward() {
        let grid = ball(12, 4.0).with_origin(Vec3::new(100.0, 0.0, 0.0));
        let surface = grid.isosurface(0.5).expect("surface");
        assert!(!surface.is_empty());
        assert!(surface.signed_volume() > 0.0);
        let com = surface.center_of_mass();
        assert!((com - Vec3::new(106.0, 6.0, 6.0)).length() < 0.5, "com {com:?}");
    }

    #[test]
    fn test_surface_depends_only_on_values() {
        let grid = ball(10, 3.0);
        let a = grid.isosurface(0.5).expect("surface");
        let b = grid.clone().isosurface(0.5).expect("surface");
        assert_eq!(a, b);
    }
}
