//! Polygonal mesh owned by every actor.
//!
//! A [`Mesh`] holds triangle faces, optional line segments (outlines, polylines)
//! and its appearance. All coordinates are in micrometres.

mod cut;
mod query;
pub mod shapes;

pub use cut::chain_segments;

use glam::{Mat4, Vec3};

use crate::error::{BrainrenderError, Result};

/// Triangle and line geometry plus appearance.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    vertices: Vec<Vec3>,
    triangles: Vec<[u32; 3]>,
    lines: Vec<[u32; 2]>,
    vertex_colors: Option<Vec<Vec3>>,
    color: Vec3,
    alpha: f32,
    line_width: f32,
}

impl Default for Mesh {
    fn default() -> Self {
        Self {
            vertices: Vec::new(),
            triangles: Vec::new(),
            lines: Vec::new(),
            vertex_colors: None,
            color: Vec3::splat(0.85),
            alpha: 1.0,
            line_width: 1.0,
        }
    }
}

impl Mesh {
    /// Creates a triangle mesh.
    pub fn new(vertices: Vec<Vec3>, triangles: Vec<[u32; 3]>) -> Self {
        Self {
            vertices,
            triangles,
            ..Self::default()
        }
    }

    /// Creates a mesh made only of line segments.
    pub fn from_lines(vertices: Vec<Vec3>, lines: Vec<[u32; 2]>) -> Self {
        Self {
            vertices,
            lines,
            ..Self::default()
        }
    }

    /// Creates a connected polyline through `points`.
    pub fn polyline(points: Vec<Vec3>) -> Self {
        let n = points.len() as u32;
        let lines = (1..n).map(|i| [i - 1, i]).collect();
        Self::from_lines(points, lines)
    }

    /// Returns the vertex positions.
    pub fn points(&self) -> &[Vec3] {
        &self.vertices
    }

    /// Returns mutable vertex positions.
    pub fn points_mut(&mut self) -> &mut [Vec3] {
        &mut self.vertices
    }

    /// Returns the triangle faces.
    pub fn faces(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    /// Returns the line segments.
    pub fn lines(&self) -> &[[u32; 2]] {
        &self.lines
    }

    /// Returns the number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Returns the number of triangles.
    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    /// Returns true if there is nothing to draw.
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty() && self.lines.is_empty()
    }

    /// Returns the colour (rgb in `[0, 1]`).
    pub fn color(&self) -> Vec3 {
        self.color
    }

    /// Sets a uniform colour, dropping any per-vertex colours.
    pub fn set_color(&mut self, color: Vec3) {
        self.color = color.clamp(Vec3::ZERO, Vec3::ONE);
        self.vertex_colors = None;
    }

    /// Per-vertex colours, if set.
    pub fn vertex_colors(&self) -> Option<&[Vec3]> {
        self.vertex_colors.as_deref()
    }

    /// Sets one colour per vertex.
    pub fn set_vertex_colors(&mut self, colors: Vec<Vec3>) -> Result<()> {
        if colors.len() != self.vertices.len() {
            return Err(BrainrenderError::SizeMismatch {
                expected: self.vertices.len(),
                actual: colors.len(),
            });
        }
        self.vertex_colors = Some(
            colors
                .into_iter()
                .map(|c| c.clamp(Vec3::ZERO, Vec3::ONE))
                .collect(),
        );
        Ok(())
    }

    /// Colour of one triangle: the mean of its vertex colours, or the mesh colour.
    pub fn triangle_color(&self, t: &[u32; 3]) -> Vec3 {
        match &self.vertex_colors {
            Some(colors) => t.iter().map(|&i| colors[i as usize]).sum::<Vec3>() / 3.0,
            None => self.color,
        }
    }

    /// Colour of one vertex.
    pub fn vertex_color(&self, i: u32) -> Vec3 {
        self.vertex_colors
            .as_ref()
            .map_or(self.color, |colors| colors[i as usize])
    }

    fn materialized_colors(&self) -> Vec<Vec3> {
        self.vertex_colors
            .clone()
            .unwrap_or_else(|| vec![self.color; self.vertices.len()])
    }

    /// Builder form of [`Mesh::set_color`].
    #[must_use]
    pub fn with_color(mut self, color: Vec3) -> Self {
        self.set_color(color);
        self
    }

    /// Returns the opacity.
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Sets the opacity, clamped to `[0, 1]`.
    pub fn set_alpha(&mut self, alpha: f32) {
        self.alpha = alpha.clamp(0.0, 1.0);
    }

    /// Builder form of [`Mesh::set_alpha`].
    #[must_use]
    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.set_alpha(alpha);
        self
    }

    /// Returns the line width used for line segments.
    pub fn line_width(&self) -> f32 {
        self.line_width
    }

    /// Sets the line width.
    pub fn set_line_width(&mut self, width: f32) {
        self.line_width = width.max(0.0);
    }

    /// Axis-aligned bounding box, `None` for a mesh without vertices.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = *self.vertices.first()?;
        Some(
            self.vertices
                .iter()
                .fold((first, first), |(lo, hi), &p| (lo.min(p), hi.max(p))),
        )
    }

    /// Mean of the vertex positions.
    pub fn center_of_mass(&self) -> Vec3 {
        if self.vertices.is_empty() {
            return Vec3::ZERO;
        }
        let sum: Vec3 = self.vertices.iter().copied().sum();
        sum / self.vertices.len() as f32
    }

    /// Length of the bounding box diagonal.
    pub fn length_scale(&self) -> f32 {
        self.bounds().map_or(0.0, |(lo, hi)| (hi - lo).length())
    }

    /// Applies an affine transform to every vertex.
    ///
    /// Reflections (negative determinant) also reverse the triangle winding so
    /// that face normals keep pointing outwards.
    pub fn apply_transform(&mut self, matrix: &Mat4) {
        for p in &mut self.vertices {
            *p = matrix.transform_point3(*p);
        }
        if matrix.determinant() < 0.0 {
            self.reverse();
        }
    }

    /// Translates every vertex.
    pub fn translate(&mut self, offset: Vec3) {
        for p in &mut self.vertices {
            *p += offset;
        }
    }

    /// Reverses the winding of every triangle.
    pub fn reverse(&mut self) {
        for tri in &mut self.triangles {
            tri.swap(1, 2);
        }
    }

    /// Reflects the mesh across the plane `coordinate[axis] == origin`.
    pub fn mirror(&mut self, axis: usize, origin: f32) {
        let axis = axis.min(2);
        for p in &mut self.vertices {
            p[axis] = 2.0 * origin - p[axis];
        }
        self.reverse();
    }

    /// Reflects the mesh across an arbitrary plane.
    pub fn mirror_across(&mut self, origin: Vec3, normal: Vec3) {
        let n = normal.normalize_or_zero();
        if n == Vec3::ZERO {
            return;
        }
        for p in &mut self.vertices {
            let d = (*p - origin).dot(n);
            *p -= 2.0 * d * n;
        }
        self.reverse();
    }

    /// Appends another mesh's geometry. Appearance of `self` is kept.
    pub fn append(&mut self, other: &Mesh) {
        if self.vertex_colors.is_some() || other.vertex_colors.is_some() {
            let mut colors = self.materialized_colors();
            colors.extend(other.materialized_colors());
            self.vertex_colors = Some(colors);
        }
        let offset = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.triangles.extend(
            other
                .triangles
                .iter()
                .map(|t| [t[0] + offset, t[1] + offset, t[2] + offset]),
        );
        self.lines
            .extend(other.lines.iter().map(|l| [l[0] + offset, l[1] + offset]));
    }

    /// Merges meshes into one. Appearance comes from the first mesh.
    pub fn merge<'a>(meshes: impl IntoIterator<Item = &'a Mesh>) -> Mesh {
        let mut iter = meshes.into_iter();
        let Some(first) = iter.next() else {
            return Mesh::default();
        };
        let mut merged = first.clone();
        for mesh in iter {
            merged.append(mesh);
        }
        merged
    }

    /// Per-triangle unit normals (zero for degenerate triangles).
    pub fn face_normals(&self) -> Vec<Vec3> {
        self.triangles
            .iter()
            .map(|t| {
                let [a, b, c] = self.triangle(t);
                (b - a).cross(c - a).normalize_or_zero()
            })
            .collect()
    }

    /// Signed enclosed volume; positive for closed meshes with outward normals.
    pub fn signed_volume(&self) -> f32 {
        self.triangles
            .iter()
            .map(|t| {
                let [a, b, c] = self.triangle(t);
                a.dot(b.cross(c)) / 6.0
            })
            .sum()
    }

    /// Drops vertices not referenced by any triangle or line.
    pub fn compact(&mut self) {
        let mut remap = vec![u32::MAX; self.vertices.len()];
        let mut kept = Vec::new();
        let mut visit = |i: u32, kept: &mut Vec<Vec3>| -> u32 {
            let slot = &mut remap[i as usize];
            if *slot == u32::MAX {
                *slot = kept.len() as u32;
                kept.push(self.vertices[i as usize]);
            }
            *slot
        };
        let triangles: Vec<[u32; 3]> = self
            .triangles
            .iter()
            .map(|t| [visit(t[0], &mut kept), visit(t[1], &mut kept), visit(t[2], &mut kept)])
            .collect();
        let lines: Vec<[u32; 2]> = self
            .lines
            .iter()
            .map(|l| [visit(l[0], &mut kept), visit(l[1], &mut kept)])
            .collect();
        if let Some(colors) = self.vertex_colors.take() {
            let mut compacted = vec![Vec3::ZERO; kept.len()];
            for (old, &new) in remap.iter().enumerate() {
                if new != u32::MAX {
                    compacted[new as usize] = colors[old];
                }
            }
            self.vertex_colors = Some(compacted);
        }
        self.vertices = kept;
        self.triangles = triangles;
        self.lines = lines;
    }

    pub(crate) fn triangle(&self, t: &[u32; 3]) -> [Vec3; 3] {
        [
            self.vertices[t[0] as usize],
            self.vertices[t[1] as usize],
            self.vertices[t[2] as usize],
        ]
    }

    pub(crate) fn set_geometry(
        &mut self,
        vertices: Vec<Vec3>,
        triangles: Vec<[u32; 3]>,
        lines: Vec<[u32; 2]>,
    ) {
        self.vertices = vertices;
        self.triangles = triangles;
        self.lines = lines;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_triangle() -> Mesh {
        Mesh::new(
            vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            vec![[0, 1, 2]],
        )
    }

    #[test]
    fn test_bounds_and_center() {
        let mesh = unit_triangle();
        let (lo, hi) = mesh.bounds().expect("non-empty");
        assert_eq!(lo, Vec3::ZERO);
        assert_eq!(hi, Vec3::new(1.0, 1.0, 0.0));
        let com = mesh.center_of_mass();
        assert!((com - Vec3::new(1.0 / 3.0, 1.0 / 3.0, 0.0)).length() < 1e-6);
        assert!(Mesh::default().bounds().is_none());
    }

    #[test]
    fn test_reflection_keeps_normals_outward() {
        let mut sphere = shapes::sphere(Vec3::ZERO, 10.0, 12);
        let before = sphere.signed_volume();
        assert!(before > 0.0);
        sphere.apply_transform(&Mat4::from_scale(Vec3::new(1.0, 1.0, -1.0)));
        assert!(sphere.signed_volume() > 0.0);
    }

    #[test]
    fn test_mirror() {
        let mut mesh = unit_triangle();
        mesh.mirror(0, 5.0);
        assert_eq!(mesh.points()[1], Vec3::new(9.0, 0.0, 0.0));
        assert_eq!(mesh.faces()[0], [0, 2, 1]);
    }

    #[test]
    fn test_merge_offsets_indices() {
        let a = unit_triangle().with_color(Vec3::X);
        let mut b = unit_triangle();
        b.translate(Vec3::Z);
        let merged = Mesh::merge([&a, &b]);
        assert_eq!(merged.num_vertices(), 6);
        assert_eq!(merged.faces()[1], [3, 4, 5]);
        assert_eq!(merged.color(), Vec3::X);
    }

    #[test]
    fn test_compact_drops_unused() {
        let mut mesh = Mesh::new(
            vec![Vec3::ZERO, Vec3::ONE, Vec3::X, Vec3::Y],
            vec![[0, 2, 3]],
        );
        mesh.compact();
        assert_eq!(mesh.num_vertices(), 3);
        assert_eq!(mesh.faces()[0], [0, 1, 2]);
    }

    #[test]
    fn test_alpha_clamped() {
        let mut mesh = Mesh::default();
        mesh.set_alpha(3.0);
        assert_eq!(mesh.alpha(), 1.0);
        mesh.set_alpha(-1.0);
        assert_eq!(mesh.alpha(), 0.0);
    }
}
