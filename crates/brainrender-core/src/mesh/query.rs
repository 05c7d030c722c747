//! Ray queries and outlines.

use std::collections::HashMap;

use glam::Vec3;

use super::Mesh;

impl Mesh {
    /// Points where the segment `p0 -> p1` crosses the surface, ordered from `p0`.
    pub fn intersect_with_line(&self, p0: Vec3, p1: Vec3) -> Vec<Vec3> {
        let dir = p1 - p0;
        let mut hits: Vec<f32> = self
            .faces()
            .iter()
            .filter_map(|t| ray_triangle(p0, dir, self.triangle(t)))
            .filter(|&t| (0.0..=1.0).contains(&t))
            .collect();
        hits.sort_by(f32::total_cmp);
        hits.dedup_by(|a, b| (*a - *b).abs() < 1e-6);
        hits.into_iter().map(|t| p0 + dir * t).collect()
    }

    /// Returns whether `point` lies inside the closed surface.
    pub fn contains_point(&self, point: Vec3) -> bool {
        // Skewed direction avoids grazing axis-aligned edges.
        let dir = Vec3::new(0.573, 0.651, 0.498).normalize();
        let crossings = self
            .faces()
            .iter()
            .filter_map(|t| ray_triangle(point, dir, self.triangle(t)))
            .filter(|&t| t > 0.0)
            .count();
        crossings % 2 == 1
    }

    /// Indices of the points that lie inside the closed surface.
    pub fn inside_points(&self, points: &[Vec3]) -> Vec<usize> {
        let Some((lo, hi)) = self.bounds() else {
            return Vec::new();
        };
        points
            .iter()
            .enumerate()
            .filter(|(_, p)| p.cmpge(lo).all() && p.cmple(hi).all())
            .filter(|(_, p)| self.contains_point(**p))
            .map(|(i, _)| i)
            .collect()
    }

    /// Outline of the surface as seen along `view_dir`: every edge shared by a
    /// front-facing and a back-facing triangle, plus open boundary edges.
    pub fn silhouette(&self, view_dir: Vec3) -> Mesh {
        let normals = self.face_normals();
        let mut edge_faces: HashMap<(u32, u32), Vec<usize>> = HashMap::new();
        for (f, tri) in self.faces().iter().enumerate() {
            for k in 0..3 {
                let (a, b) = (tri[k], tri[(k + 1) % 3]);
                edge_faces.entry((a.min(b), a.max(b))).or_default().push(f);
            }
        }
        let facing = |f: usize| normals[f].dot(view_dir) < 0.0;
        let mut lines: Vec<[u32; 2]> = edge_faces
            .into_iter()
            .filter(|(_, faces)| match faces.as_slice() {
                [_] => true,
                [f0, f1] => facing(*f0) != facing(*f1),
                _ => false,
            })
            .map(|((a, b), _)| [a, b])
            .collect();
        lines.sort_unstable();
        let mut outline = Mesh::from_lines(self.points().to_vec(), lines);
        outline.compact();
        outline
    }
}

/// Möller-Trumbore; returns the ray parameter of the hit.
fn ray_triangle(origin: Vec3, dir: Vec3, [a, b, c]: [Vec3; 3]) -> Option<f32> {
    let e1 = b - a;
    let e2 = c - a;
    let p = dir.cross(e2);
    let det = e1.dot(p);
    if det.abs() < f32::EPSILON * e1.length() * e2.length() {
        return None;
    }
    let inv = 1.0 / det;
    let s = origin - a;
    let u = s.dot(p) * inv;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(e1);
    let v = dir.dot(q) * inv;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    Some(e2.dot(q) * inv)
}
