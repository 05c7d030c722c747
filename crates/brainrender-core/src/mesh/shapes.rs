//! Primitive surfaces: spheres, tubes, cylinders, rectangles and boxes.
//!
//! Every closed shape is wound so that face normals point outwards.

use std::f32::consts::{PI, TAU};

use glam::Vec3;

use super::Mesh;
use crate::plane::Plane;

/// UV sphere. `resolution` is the number of latitude bands (at least 4);
/// longitude uses twice as many segments.
pub fn sphere(center: Vec3, radius: f32, resolution: u32) -> Mesh {
    let bands = resolution.max(4);
    let segments = bands * 2;
    let mut vertices = Vec::with_capacity((segments * (bands - 1) + 2) as usize);
    vertices.push(center + Vec3::Z * radius);
    for i in 1..bands {
        let theta = PI * i as f32 / bands as f32;
        for j in 0..segments {
            let phi = TAU * j as f32 / segments as f32;
            let dir = Vec3::new(theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos());
            vertices.push(center + dir * radius);
        }
    }
    vertices.push(center - Vec3::Z * radius);

    let south = (vertices.len() - 1) as u32;
    let ring = |i: u32, j: u32| 1 + (i - 1) * segments + j % segments;
    let mut triangles = Vec::with_capacity((segments * 2 * (bands - 1)) as usize);
    for j in 0..segments {
        triangles.push([0, ring(1, j), ring(1, j + 1)]);
    }
    for i in 1..bands - 1 {
        for j in 0..segments {
            let (a, b) = (ring(i, j), ring(i + 1, j));
            let (c, d) = (ring(i + 1, j + 1), ring(i, j + 1));
            triangles.push([a, b, c]);
            triangles.push([a, c, d]);
        }
    }
    for j in 0..segments {
        triangles.push([ring(bands - 1, j), south, ring(bands - 1, j + 1)]);
    }
    Mesh::new(vertices, triangles)
}

/// Closed tube of constant radius along a polyline.
///
/// Consecutive duplicate points are skipped; fewer than two distinct points
/// give an empty mesh.
pub fn tube(points: &[Vec3], radius: f32, sides: u32) -> Mesh {
    let mut path: Vec<Vec3> = Vec::with_capacity(points.len());
    for &p in points {
        if path.last().map_or(true, |&q: &Vec3| q.distance(p) > f32::EPSILON) {
            path.push(p);
        }
    }
    if path.len() < 2 {
        return Mesh::default();
    }
    let sides = sides.max(3);

    let tangents: Vec<Vec3> = (0..path.len())
        .map(|k| {
            let prev = path[k.saturating_sub(1)];
            let next = path[(k + 1).min(path.len() - 1)];
            (next - prev).normalize()
        })
        .collect();

    // parallel-transported frame
    let mut normal = tangents[0].any_orthonormal_vector();
    let mut vertices = Vec::with_capacity(path.len() * sides as usize + 2);
    for (k, (&p, &t)) in path.iter().zip(&tangents).enumerate() {
        if k > 0 {
            let projected = normal - t * t.dot(normal);
            normal = projected
                .try_normalize()
                .unwrap_or_else(|| t.any_orthonormal_vector());
        }
        let binormal = t.cross(normal);
        for j in 0..sides {
            let a = TAU * j as f32 / sides as f32;
            vertices.push(p + radius * (a.cos() * normal + a.sin() * binormal));
        }
    }

    let ring = |k: u32, j: u32| k * sides + j % sides;
    let rings = path.len() as u32;
    let mut triangles = Vec::with_capacity((rings as usize + 1) * sides as usize * 2);
    for k in 0..rings - 1 {
        for j in 0..sides {
            let (a, b) = (ring(k, j), ring(k, j + 1));
            let (c, d) = (ring(k + 1, j + 1), ring(k + 1, j));
            triangles.push([a, b, c]);
            triangles.push([a, c, d]);
        }
    }

    let start = vertices.len() as u32;
    vertices.push(path[0]);
    let end = vertices.len() as u32;
    vertices.push(path[path.len() - 1]);
    for j in 0..sides {
        triangles.push([start, ring(0, j + 1), ring(0, j)]);
        triangles.push([end, ring(rings - 1, j), ring(rings - 1, j + 1)]);
    }
    Mesh::new(vertices, triangles)
}

/// Closed cylinder between two points.
pub fn cylinder(p0: Vec3, p1: Vec3, radius: f32, sides: u32) -> Mesh {
    tube(&[p0, p1], radius, sides)
}

/// Rectangle of size `sx` by `sy` centred on `center`, facing `normal`.
///
/// `sx` runs along the plane's first in-plane axis, `sy` along the second.
pub fn plane_rect(center: Vec3, normal: Vec3, sx: f32, sy: f32) -> Mesh {
    let plane = Plane::new(center, normal);
    let (u, v) = plane.basis();
    let (hu, hv) = (u * sx * 0.5, v * sy * 0.5);
    let vertices = vec![
        center - hu - hv,
        center + hu - hv,
        center + hu + hv,
        center - hu + hv,
    ];
    Mesh::new(vertices, vec![[0, 1, 2], [0, 2, 3]])
}

/// Wireframe of an axis-aligned box.
pub fn box_lines(lo: Vec3, hi: Vec3) -> Mesh {
    let corner = |c: u32| {
        Vec3::new(
            if c & 1 == 0 { lo.x } else { hi.x },
            if c & 2 == 0 { lo.y } else { hi.y },
            if c & 4 == 0 { lo.z } else { hi.z },
        )
    };
    let vertices = (0..8).map(corner).collect();
    let mut lines = Vec::with_capacity(12);
    for c in 0..8_u32 {
        for bit in [1, 2, 4] {
            if c & bit == 0 {
                lines.push([c, c | bit]);
            }
        }
    }
    Mesh::from_lines(vertices, lines)
}
