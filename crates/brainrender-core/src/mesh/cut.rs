//! Plane cuts, capping and plane intersections.

use std::collections::HashMap;

use glam::Vec3;

use super::Mesh;
use crate::plane::Plane;

/// Relative tolerance used to treat vertices as lying on a cutting plane.
const PLANE_EPS: f32 = 1e-5;

impl Mesh {
    fn plane_tolerance(&self) -> f32 {
        PLANE_EPS * (1.0 + self.length_scale())
    }

    /// Cuts the mesh in place, keeping the part on the side the plane normal
    /// points to. Vertices within tolerance of the plane are kept, so cutting
    /// twice with the same plane changes nothing.
    ///
    /// Returns the number of triangles that were removed or clipped.
    pub fn cut_with_plane(&mut self, plane: &Plane) -> usize {
        let eps = self.plane_tolerance();
        let dist: Vec<f32> = self
            .points()
            .iter()
            .map(|&p| plane.signed_distance(p))
            .collect();
        let kept = |i: u32| dist[i as usize] >= -eps;

        let mut vertices: Vec<Vec3> = Vec::with_capacity(self.num_vertices());
        let mut remap = vec![u32::MAX; self.num_vertices()];
        let mut edge_cache: HashMap<(u32, u32), u32> = HashMap::new();
        let source = self.points().to_vec();

        let mut keep_vertex = |i: u32, vertices: &mut Vec<Vec3>| -> u32 {
            let slot = &mut remap[i as usize];
            if *slot == u32::MAX {
                *slot = vertices.len() as u32;
                vertices.push(source[i as usize]);
            }
            *slot
        };
        let mut edge_vertex = |a: u32, b: u32, vertices: &mut Vec<Vec3>| -> u32 {
            let key = (a.min(b), a.max(b));
            *edge_cache.entry(key).or_insert_with(|| {
                let (da, db) = (dist[a as usize], dist[b as usize]);
                let t = (da / (da - db)).clamp(0.0, 1.0);
                let p = source[a as usize].lerp(source[b as usize], t);
                vertices.push(p);
                (vertices.len() - 1) as u32
            })
        };

        let mut changed = 0;
        let mut triangles = Vec::with_capacity(self.num_triangles());
        for &tri in self.faces() {
            let inside = tri.map(|i| kept(i));
            match inside.iter().filter(|&&k| k).count() {
                3 => triangles.push(tri.map(|i| keep_vertex(i, &mut vertices))),
                0 => changed += 1,
                _ => {
                    changed += 1;
                    // Sutherland-Hodgman against a single plane
                    let mut polygon: Vec<u32> = Vec::with_capacity(4);
                    for k in 0..3 {
                        let (a, b) = (tri[k], tri[(k + 1) % 3]);
                        if inside[k] {
                            polygon.push(keep_vertex(a, &mut vertices));
                        }
                        if inside[k] != inside[(k + 1) % 3] {
                            polygon.push(edge_vertex(a, b, &mut vertices));
                        }
                    }
                    for k in 1..polygon.len().saturating_sub(1) {
                        triangles.push([polygon[0], polygon[k], polygon[k + 1]]);
                    }
                }
            }
        }

        let mut lines = Vec::with_capacity(self.lines().len());
        for &seg in self.lines() {
            match (kept(seg[0]), kept(seg[1])) {
                (true, true) => lines.push(seg.map(|i| keep_vertex(i, &mut vertices))),
                (false, false) => changed += 1,
                (true, false) => {
                    changed += 1;
                    let a = keep_vertex(seg[0], &mut vertices);
                    lines.push([a, edge_vertex(seg[0], seg[1], &mut vertices)]);
                }
                (false, true) => {
                    changed += 1;
                    let b = keep_vertex(seg[1], &mut vertices);
                    lines.push([edge_vertex(seg[0], seg[1], &mut vertices), b]);
                }
            }
        }

        if let Some(colors) = self.vertex_colors.take() {
            let mut cut_colors = vec![Vec3::ZERO; vertices.len()];
            for (old, &new) in remap.iter().enumerate() {
                if new != u32::MAX {
                    cut_colors[new as usize] = colors[old];
                }
            }
            for (&(a, b), &new) in &edge_cache {
                let (da, db) = (dist[a as usize], dist[b as usize]);
                let t = (da / (da - db)).clamp(0.0, 1.0);
                cut_colors[new as usize] = colors[a as usize].lerp(colors[b as usize], t);
            }
            self.vertex_colors = Some(cut_colors);
        }
        self.set_geometry(vertices, triangles, lines);
        changed
    }

    /// Returns a cut copy, leaving `self` untouched.
    #[must_use]
    pub fn cut_copy(&self, plane: &Plane) -> Mesh {
        let mut copy = self.clone();
        copy.cut_with_plane(plane);
        copy
    }

    /// Edges used by exactly one triangle, oriented as in that triangle.
    pub fn boundary_edges(&self) -> Vec<[u32; 2]> {
        let mut counts: HashMap<(u32, u32), (usize, [u32; 2])> = HashMap::new();
        for tri in self.faces() {
            for k in 0..3 {
                let (a, b) = (tri[k], tri[(k + 1) % 3]);
                let entry = counts.entry((a.min(b), a.max(b))).or_insert((0, [a, b]));
                entry.0 += 1;
            }
        }
        let mut edges: Vec<[u32; 2]> = counts
            .into_values()
            .filter(|(n, _)| *n == 1)
            .map(|(_, e)| e)
            .collect();
        edges.sort_unstable();
        edges
    }

    /// Closes every open boundary loop with a fan of triangles around the
    /// loop centroid.
    ///
    /// Loops are grouped by vertex position so duplicated seam vertices do not
    /// split a loop. Concave loops may produce overlapping cap triangles.
    pub fn cap(&mut self) {
        let boundary = self.boundary_edges();
        if boundary.is_empty() {
            return;
        }
        let tol = self.plane_tolerance();
        let mut keys: HashMap<[i64; 3], usize> = HashMap::new();
        let mut canonical = HashMap::new();
        for &i in boundary.iter().flatten() {
            let key = quantize(self.points()[i as usize], tol);
            let next = keys.len();
            let id = *keys.entry(key).or_insert(next);
            canonical.insert(i, id);
        }

        let mut parent: Vec<usize> = (0..keys.len()).collect();
        for edge in &boundary {
            let (a, b) = (canonical[&edge[0]], canonical[&edge[1]]);
            let (ra, rb) = (find(&mut parent, a), find(&mut parent, b));
            if ra != rb {
                parent[ra] = rb;
            }
        }

        let mut loops: HashMap<usize, Vec<[u32; 2]>> = HashMap::new();
        for edge in boundary {
            let root = find(&mut parent, canonical[&edge[0]]);
            loops.entry(root).or_default().push(edge);
        }

        let mut vertices = self.points().to_vec();
        let mut colors = self.vertex_colors.take();
        let mut triangles = self.faces().to_vec();
        let mut roots: Vec<usize> = loops.keys().copied().collect();
        roots.sort_unstable();
        for root in roots {
            let edges = &loops[&root];
            if edges.len() < 3 {
                continue;
            }
            let centroid = edges
                .iter()
                .map(|e| vertices[e[0] as usize])
                .sum::<Vec3>()
                / edges.len() as f32;
            let c = vertices.len() as u32;
            vertices.push(centroid);
            if let Some(colors) = colors.as_mut() {
                let mean = edges.iter().map(|e| colors[e[0] as usize]).sum::<Vec3>() / edges.len() as f32;
                colors.push(mean);
            }
            for e in edges {
                triangles.push([e[1], e[0], c]);
            }
        }
        let lines = self.lines().to_vec();
        self.vertex_colors = colors;
        self.set_geometry(vertices, triangles, lines);
    }

    /// Segments where the triangles cross `plane`.
    pub fn intersect_with_plane(&self, plane: &Plane) -> Vec<[Vec3; 2]> {
        let mut segments = Vec::new();
        let points = self.points();
        for tri in self.faces() {
            let mut crossing = Vec::with_capacity(2);
            for k in 0..3 {
                // order by index so neighbouring triangles produce identical points
                let (a, b) = (tri[k].min(tri[(k + 1) % 3]), tri[k].max(tri[(k + 1) % 3]));
                let (pa, pb) = (points[a as usize], points[b as usize]);
                let (da, db) = (plane.signed_distance(pa), plane.signed_distance(pb));
                if (da < 0.0) != (db < 0.0) {
                    crossing.push(pa.lerp(pb, da / (da - db)));
                }
            }
            if crossing.len() == 2 {
                segments.push([crossing[0], crossing[1]]);
            }
        }
        segments
    }
}

/// Joins unordered segments into polylines by matching endpoints within `tol`.
///
/// Closed loops repeat their first point at the end.
pub fn chain_segments(segments: &[[Vec3; 2]], tol: f32) -> Vec<Vec<Vec3>> {
    let mut adjacency: HashMap<[i64; 3], Vec<usize>> = HashMap::new();
    for (i, seg) in segments.iter().enumerate() {
        for p in seg {
            adjacency.entry(quantize(*p, tol)).or_default().push(i);
        }
    }
    let mut used = vec![false; segments.len()];
    let mut chains = Vec::new();
    for start in 0..segments.len() {
        if used[start] {
            continue;
        }
        used[start] = true;
        let mut chain = vec![segments[start][0], segments[start][1]];
        // grow forward, then backward
        for _ in 0..2 {
            loop {
                let tail = quantize(chain[chain.len() - 1], tol);
                let next = adjacency
                    .get(&tail)
                    .and_then(|ids| ids.iter().copied().find(|&j| !used[j]));
                let Some(j) = next else { break };
                used[j] = true;
                let seg = segments[j];
                let far = if quantize(seg[0], tol) == tail { seg[1] } else { seg[0] };
                chain.push(far);
            }
            chain.reverse();
        }
        chains.push(chain);
    }
    chains
}

fn quantize(p: Vec3, tol: f32) -> [i64; 3] {
    let q = tol.max(f32::EPSILON) * 4.0;
    [
        (p.x / q).round() as i64,
        (p.y / q).round() as i64,
        (p.z / q).round() as i64,
    ]
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}
