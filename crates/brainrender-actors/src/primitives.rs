//! Simple actor factories: points, density clouds, lines, cylinders, rulers
//! and planes.
//!
//! Every factory returns an actor whose geometry is already in world
//! coordinates (micrometres, atlas axes).

use std::path::{Path, PathBuf};

use brainrender_core::io::{data_extension, read_npy};
use brainrender_core::{shapes, to_rgb, BrainrenderError, ColorLike, Mesh, Plane, Result, ScalarGrid};
use glam::Vec3;

use crate::actor::{Actor, BrClass};

/// Styling for a single sphere.
#[derive(Debug, Clone)]
pub struct PointOptions {
    pub radius: f32,
    pub color: ColorLike,
    pub alpha: f32,
    pub resolution: u32,
    pub name: Option<String>,
}

impl Default for PointOptions {
    fn default() -> Self {
        Self {
            radius: 100.0,
            color: "black".into(),
            alpha: 1.0,
            resolution: 16,
            name: None,
        }
    }
}

fn check_radius(radius: f32) -> Result<()> {
    if radius.is_finite() && radius > 0.0 {
        Ok(())
    } else {
        Err(BrainrenderError::invalid(format!("radius must be positive, got {radius}")))
    }
}

fn check_finite(points: &[Vec3]) -> Result<()> {
    match points.iter().position(|p| !p.is_finite()) {
        Some(i) => Err(BrainrenderError::invalid(format!("point {i} is not finite"))),
        None => Ok(()),
    }
}

/// A sphere at `pos`.
pub fn point(pos: Vec3, options: &PointOptions) -> Result<Actor> {
    check_radius(options.radius)?;
    check_finite(&[pos])?;
    let mesh = shapes::sphere(pos, options.radius, options.resolution)
        .with_color(to_rgb(&options.color)?)
        .with_alpha(options.alpha);
    let name = options.name.clone().unwrap_or_else(|| "Point".to_string());
    Ok(Actor::new(mesh, name, BrClass::Point))
}

/// Coordinates given directly or as a numpy file.
#[derive(Debug, Clone, PartialEq)]
pub enum PointsInput {
    Array(Vec<Vec3>),
    File(PathBuf),
}

impl From<Vec<Vec3>> for PointsInput {
    fn from(points: Vec<Vec3>) -> Self {
        Self::Array(points)
    }
}

impl From<&[Vec3]> for PointsInput {
    fn from(points: &[Vec3]) -> Self {
        Self::Array(points.to_vec())
    }
}

impl From<Vec<[f32; 3]>> for PointsInput {
    fn from(points: Vec<[f32; 3]>) -> Self {
        Self::Array(points.into_iter().map(Vec3::from_array).collect())
    }
}

impl From<PathBuf> for PointsInput {
    fn from(path: PathBuf) -> Self {
        Self::File(path)
    }
}

impl From<&Path> for PointsInput {
    fn from(path: &Path) -> Self {
        Self::File(path.to_path_buf())
    }
}

/// Reads an `(N, 3)` array from a `.npy` file.
pub fn load_points(path: &Path) -> Result<Vec<Vec3>> {
    match data_extension(path).as_deref() {
        Some("npy") => {}
        other => {
            return Err(BrainrenderError::UnsupportedFormat(format!(
                "cannot load points from '.{}' files",
                other.unwrap_or("")
            )))
        }
    }
    let array = read_npy::<f64>(path)?;
    match array.shape.as_slice() {
        [_, 3] => Ok(array
            .data
            .chunks_exact(3)
            .map(|c| Vec3::new(c[0] as f32, c[1] as f32, c[2] as f32))
            .collect()),
        shape => Err(BrainrenderError::invalid(format!(
            "points array must have shape (N, 3), got {shape:?}"
        ))),
    }
}

impl PointsInput {
    /// The coordinates, reading the file if needed.
    pub fn resolve(self) -> Result<Vec<Vec3>> {
        let points = match self {
            PointsInput::Array(points) => points,
            PointsInput::File(path) => load_points(&path)?,
        };
        check_finite(&points)?;
        Ok(points)
    }
}

/// One colour for all points, or one per point.
#[derive(Debug, Clone)]
pub enum PointColors {
    Uniform(ColorLike),
    PerPoint(Vec<ColorLike>),
}

/// Styling for [`points`].
#[derive(Debug, Clone)]
pub struct PointsOptions {
    pub radius: f32,
    pub colors: PointColors,
    pub alpha: f32,
    pub resolution: u32,
    pub name: Option<String>,
}

impl Default for PointsOptions {
    fn default() -> Self {
        Self {
            radius: 50.0,
            colors: PointColors::Uniform("salmon".into()),
            alpha: 1.0,
            resolution: 6,
            name: None,
        }
    }
}

/// Spheres at every coordinate, merged into one actor.
pub fn points(input: impl Into<PointsInput>, options: &PointsOptions) -> Result<Actor> {
    check_radius(options.radius)?;
    let coords = input.into().resolve()?;

    // validate colours before building any geometry
    let per_point = match &options.colors {
        PointColors::Uniform(color) => {
            let rgb = to_rgb(color)?;
            (None, rgb)
        }
        PointColors::PerPoint(colors) => {
            if colors.len() != coords.len() {
                return Err(BrainrenderError::invalid(format!(
                    "got {} colours for {} points",
                    colors.len(),
                    coords.len()
                )));
            }
            let rgb = colors.iter().map(to_rgb).collect::<Result<Vec<_>>>()?;
            let first = rgb.first().copied().unwrap_or(Vec3::ONE);
            (Some(rgb), first)
        }
    };

    let spheres: Vec<Mesh> = coords
        .iter()
        .map(|&p| shapes::sphere(p, options.radius, options.resolution))
        .collect();
    let mut mesh = Mesh::merge(&spheres).with_color(per_point.1).with_alpha(options.alpha);
    if let Some(rgb) = per_point.0 {
        let colors = spheres
            .iter()
            .zip(rgb)
            .flat_map(|(s, c)| std::iter::repeat(c).take(s.num_vertices()))
            .collect();
        mesh.set_vertex_colors(colors)?;
    }
    let name = options.name.clone().unwrap_or_else(|| "Points".to_string());
    Ok(Actor::new(mesh, name, BrClass::Points))
}

/// Settings of the kernel density estimate.
#[derive(Debug, Clone)]
pub struct DensityOptions {
    /// Number of voxels along each axis.
    pub dims: [usize; 3],
    /// Gaussian kernel width in micrometres.
    pub radius: f32,
    /// Isosurface level as a fraction of the peak density.
    pub level: f32,
    pub color: ColorLike,
    pub alpha: f32,
    pub name: Option<String>,
}

impl Default for DensityOptions {
    fn default() -> Self {
        Self {
            dims: [40, 40, 40],
            radius: 350.0,
            level: 0.3,
            color: "salmon".into(),
            alpha: 0.5,
            name: None,
        }
    }
}

/// Gaussian kernel density of `points` sampled on a regular grid covering
/// them plus three kernel widths of padding.
///
/// Points are binned first and the bins blurred with a separable kernel, so
/// the cost does not grow with the number of points.
pub fn density_grid(points: &[Vec3], dims: [usize; 3], radius: f32) -> Result<ScalarGrid> {
    if points.is_empty() {
        return Err(BrainrenderError::invalid("cannot estimate the density of zero points"));
    }
    check_radius(radius)?;
    check_finite(points)?;
    if dims.iter().any(|&d| d == 0) {
        return Err(BrainrenderError::invalid(format!("density grid dims must be positive, got {dims:?}")));
    }

    let (lo, hi) = points
        .iter()
        .fold((points[0], points[0]), |(lo, hi), &p| (lo.min(p), hi.max(p)));
    let pad = Vec3::splat(3.0 * radius);
    let (lo, hi) = (lo - pad, hi + pad);
    let spacing = (hi - lo) / Vec3::new(dims[0] as f32, dims[1] as f32, dims[2] as f32);

    let index = |i: usize, j: usize, k: usize| (i * dims[1] + j) * dims[2] + k;
    let mut values = vec![0.0_f32; dims.iter().product()];
    for p in points {
        let cell = ((*p - lo) / spacing).floor();
        let i = (cell.x.max(0.0) as usize).min(dims[0] - 1);
        let j = (cell.y.max(0.0) as usize).min(dims[1] - 1);
        let k = (cell.z.max(0.0) as usize).min(dims[2] - 1);
        values[index(i, j, k)] += 1.0;
    }

    for axis in 0..3 {
        let kernel = gaussian_kernel(spacing[axis], radius);
        let reach = kernel.len() / 2;
        let mut blurred = vec![0.0_f32; values.len()];
        for i in 0..dims[0] {
            for j in 0..dims[1] {
                for k in 0..dims[2] {
                    let v = values[index(i, j, k)];
                    if v == 0.0 {
                        continue;
                    }
                    let at = [i, j, k];
                    for (offset, w) in kernel.iter().enumerate() {
                        let Some(target) = (at[axis] + offset).checked_sub(reach) else {
                            continue;
                        };
                        if target >= dims[axis] {
                            continue;
                        }
                        let mut t = at;
                        t[axis] = target;
                        blurred[index(t[0], t[1], t[2])] += v * w;
                    }
                }
            }
        }
        values = blurred;
    }

    let norm = points.len() as f32;
    for v in &mut values {
        *v /= norm;
    }
    Ok(ScalarGrid::new(dims, values)?.with_spacing(spacing).with_origin(lo))
}

fn gaussian_kernel(spacing: f32, radius: f32) -> Vec<f32> {
    let reach = ((3.0 * radius / spacing).ceil() as usize).max(1);
    let weights: Vec<f32> = (0..=2 * reach)
        .map(|o| {
            let d = (o as f32 - reach as f32) * spacing;
            (-d * d / (2.0 * radius * radius)).exp()
        })
        .collect();
    let sum: f32 = weights.iter().sum();
    weights.into_iter().map(|w| w / sum).collect()
}

/// A translucent isosurface of the point density.
///
/// The actor keeps the density grid, see [`Actor::volume`].
pub fn points_density(points: &[Vec3], options: &DensityOptions) -> Result<Actor> {
    let grid = density_grid(points, options.dims, options.radius)?;
    let level = grid.max() * options.level.clamp(0.01, 0.99);
    let mesh = grid
        .isosurface(level)?
        .with_color(to_rgb(&options.color)?)
        .with_alpha(options.alpha);
    let name = options.name.clone().unwrap_or_else(|| "PointsDensity".to_string());
    Ok(Actor::new(mesh, name, BrClass::Density).with_volume(grid))
}

/// Styling for [`line`].
#[derive(Debug, Clone)]
pub struct LineOptions {
    pub color: ColorLike,
    pub alpha: f32,
    pub line_width: f32,
    pub name: Option<String>,
}

impl Default for LineOptions {
    fn default() -> Self {
        Self {
            color: "black".into(),
            alpha: 1.0,
            line_width: 2.0,
            name: None,
        }
    }
}

/// A polyline through `coords`.
pub fn line(coords: &[Vec3], options: &LineOptions) -> Result<Actor> {
    if coords.len() < 2 {
        return Err(BrainrenderError::invalid(format!(
            "a line needs at least two points, got {}",
            coords.len()
        )));
    }
    check_finite(coords)?;
    let mut mesh = Mesh::polyline(coords.to_vec())
        .with_color(to_rgb(&options.color)?)
        .with_alpha(options.alpha);
    mesh.set_line_width(options.line_width);
    let name = options.name.clone().unwrap_or_else(|| "Line".to_string());
    Ok(Actor::new(mesh, name, BrClass::Line))
}

/// Styling for [`cylinder`].
#[derive(Debug, Clone)]
pub struct CylinderOptions {
    pub radius: f32,
    /// Distance of the free end above the top of the root.
    pub offset: f32,
    pub color: ColorLike,
    pub alpha: f32,
    pub name: Option<String>,
}

impl Default for CylinderOptions {
    fn default() -> Self {
        Self {
            radius: 350.0,
            offset: 500.0,
            color: "skyblue".into(),
            alpha: 1.0,
            name: None,
        }
    }
}

/// A closed cylinder between two points.
pub fn cylinder(p0: Vec3, p1: Vec3, options: &CylinderOptions) -> Result<Actor> {
    check_radius(options.radius)?;
    check_finite(&[p0, p1])?;
    if p0.distance(p1) <= f32::EPSILON {
        return Err(BrainrenderError::invalid("cylinder end points coincide"));
    }
    let mesh = shapes::cylinder(p0, p1, options.radius, 24)
        .with_color(to_rgb(&options.color)?)
        .with_alpha(options.alpha);
    let name = options.name.clone().unwrap_or_else(|| "Cylinder".to_string());
    Ok(Actor::new(mesh, name, BrClass::Cylinder))
}

/// A vertical cylinder from `tip` up to above the root's top surface (its
/// minimum y), like an implanted probe.
pub fn cylinder_to_root(tip: Vec3, root: &Actor, options: &CylinderOptions) -> Result<Actor> {
    let (lo, _) = root
        .bounds()
        .ok_or_else(|| BrainrenderError::invalid("root actor has no geometry"))?;
    let top = Vec3::new(tip.x, lo.y - options.offset, tip.z);
    cylinder(tip, top, options)
}

/// Styling for [`ruler`].
#[derive(Debug, Clone)]
pub struct RulerOptions {
    /// Factor applied to the distance before printing it.
    pub unit_scale: f32,
    /// Units appended to the printed distance.
    pub units: Option<String>,
    pub color: ColorLike,
    pub alpha: f32,
    pub sphere_radius: f32,
    pub name: Option<String>,
}

impl Default for RulerOptions {
    fn default() -> Self {
        Self {
            unit_scale: 1.0,
            units: None,
            color: "black".into(),
            alpha: 1.0,
            sphere_radius: 50.0,
            name: None,
        }
    }
}

/// Fraction of the distance covered by each of the two ruler segments.
const RULER_SEGMENT: f32 = 0.4;

/// Formats `value` with `digits` significant figures.
pub fn format_significant(value: f64, digits: u32) -> String {
    if value == 0.0 || !value.is_finite() {
        return if value.is_finite() { "0".to_string() } else { value.to_string() };
    }
    let digits = digits.max(1) as i32;
    let round_to = |v: f64| {
        let magnitude = v.abs().log10().floor() as i32;
        let factor = 10f64.powi(digits - 1 - magnitude);
        (v * factor).round() / factor
    };
    let rounded = round_to(value);
    let magnitude = rounded.abs().log10().floor() as i32;
    let decimals = (digits - 1 - magnitude).max(0) as usize;
    format!("{rounded:.decimals$}")
}

/// Two segments with a gap in the middle, spheres at both ends and the
/// distance as text.
pub fn ruler(p1: Vec3, p2: Vec3, options: &RulerOptions) -> Result<Actor> {
    check_finite(&[p1, p2])?;
    check_radius(options.sphere_radius)?;
    let distance = f64::from(p1.distance(p2)) * f64::from(options.unit_scale);
    let mut text = format_significant(distance, 3);
    if let Some(units) = &options.units {
        text.push(' ');
        text.push_str(units);
    }

    let v = p2 - p1;
    let mid = p1 + v * 0.5;
    // the midpoint comes first so the text is drawn in the gap
    let mut mesh = Mesh::from_lines(
        vec![mid, p1, p1 + v * RULER_SEGMENT, p2, p2 - v * RULER_SEGMENT],
        vec![[1, 2], [3, 4]],
    );
    mesh.append(&shapes::sphere(p1, options.sphere_radius, 8));
    mesh.append(&shapes::sphere(p2, options.sphere_radius, 8));
    mesh.set_color(to_rgb(&options.color)?);
    mesh.set_alpha(options.alpha);
    mesh.set_line_width(2.0);

    let name = options.name.clone().unwrap_or_else(|| "Ruler".to_string());
    Ok(Actor::new(mesh, name, BrClass::Ruler).with_text(text))
}

/// A ruler from `point` straight up (decreasing y) to where that vertical
/// line leaves the root surface.
pub fn ruler_from_surface(point: Vec3, root: &Actor, options: &RulerOptions) -> Result<Actor> {
    let (lo, _) = root
        .bounds()
        .ok_or_else(|| BrainrenderError::invalid("root actor has no geometry"))?;
    let above = Vec3::new(point.x, lo.y - 1000.0, point.z);
    let surface = root
        .intersect_with_line(point, above)
        .into_iter()
        .min_by(|a, b| a.y.total_cmp(&b.y))
        .ok_or_else(|| BrainrenderError::invalid("no root surface above the point"))?;
    ruler(point, surface, options)
}

/// A rectangle of size `sx` x `sy` centred on `plane`.
pub fn plane(plane: Plane, sx: f32, sy: f32, color: &ColorLike, alpha: f32) -> Result<Actor> {
    if !(sx > 0.0 && sy > 0.0) {
        return Err(BrainrenderError::invalid(format!("plane size must be positive, got {sx} x {sy}")));
    }
    let mesh = shapes::plane_rect(plane.origin(), plane.normal(), sx, sy)
        .with_color(to_rgb(color)?)
        .with_alpha(alpha);
    Ok(Actor::new(mesh, "Plane", BrClass::Plane).with_plane(plane))
}

#[cfg(test)]
mod tests {
    use super::*;
    use brainrender_core::io::{write_npy, NpyArray};
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_point() {
        let actor = point(Vec3::new(1.0, 2.0, 3.0), &PointOptions::default()).expect("point");
        assert_eq!(actor.br_class(), BrClass::Point);
        assert!((actor.center_of_mass() - Vec3::new(1.0, 2.0, 3.0)).length() < 1.0);
        let bad = PointOptions {
            radius: -1.0,
            ..PointOptions::default()
        };
        assert!(point(Vec3::ZERO, &bad).is_err());
    }

    #[test]
    fn test_points_colors() {
        let coords = vec![Vec3::ZERO, Vec3::splat(500.0)];
        let options = PointsOptions {
            colors: PointColors::PerPoint(vec!["red".into(), "blue".into()]),
            ..PointsOptions::default()
        };
        let actor = points(coords.clone(), &options).expect("points");
        let colors = actor.mesh().vertex_colors().expect("per-point colours");
        assert_eq!(colors.first(), Some(&Vec3::X));
        assert_eq!(colors.last(), Some(&Vec3::Z));

        let wrong = PointsOptions {
            colors: PointColors::PerPoint(vec!["red".into()]),
            ..PointsOptions::default()
        };
        assert!(matches!(points(coords, &wrong), Err(BrainrenderError::InvalidInput(_))));
    }

    #[test]
    fn test_points_from_file() {
        let dir = std::env::temp_dir().join(format!("brainrender-points-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("dir");
        let path = dir.join("cells.npy");
        let array = NpyArray::new(vec![2, 3], vec![0.0_f64, 0.0, 0.0, 100.0, 200.0, 300.0]).expect("array");
        write_npy(&path, &array).expect("write");
        let actor = points(path.as_path(), &PointsOptions::default()).expect("points from npy");
        let (_, hi) = actor.bounds().expect("bounds");
        assert!(hi.z > 300.0);

        let csv = dir.join("cells.csv");
        std::fs::write(&csv, "0,0,0").expect("write csv");
        assert!(matches!(
            points(csv.as_path(), &PointsOptions::default()),
            Err(BrainrenderError::UnsupportedFormat(_))
        ));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_density() {
        assert!(matches!(
            points_density(&[], &DensityOptions::default()),
            Err(BrainrenderError::InvalidInput(_))
        ));
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let cloud: Vec<Vec3> = (0..300)
            .map(|_| Vec3::new(rng.gen_range(0.0..1000.0), rng.gen_range(0.0..1000.0), rng.gen_range(0.0..1000.0)))
            .collect();
        let actor = points_density(&cloud, &DensityOptions::default()).expect("density");
        let grid = actor.volume().expect("density grid");
        assert!(grid.max() > 0.0);
        assert_eq!(grid.shape(), [40, 40, 40]);
        assert!(actor.mesh().num_triangles() > 0);
        let (lo, hi) = actor.bounds().expect("bounds");
        assert!(lo.x < 1000.0 && hi.x > 0.0);
    }

    #[test]
    fn test_line_and_cylinder() {
        assert!(line(&[Vec3::ZERO], &LineOptions::default()).is_err());
        let l = line(&[Vec3::ZERO, Vec3::X, Vec3::Y], &LineOptions::default()).expect("line");
        assert_eq!(l.mesh().lines().len(), 2);

        let root = Actor::new(shapes::sphere(Vec3::ZERO, 1000.0, 12), "root", BrClass::BrainRegion);
        let probe = cylinder_to_root(Vec3::new(0.0, 200.0, 0.0), &root, &CylinderOptions::default()).expect("probe");
        let (lo, hi) = probe.bounds().expect("bounds");
        assert!((lo.y + 1500.0).abs() < 1.0);
        assert!((hi.y - 200.0).abs() < 1.0);
    }

    #[test]
    fn test_format_significant() {
        assert_eq!(format_significant(3.14159, 3), "3.14");
        assert_eq!(format_significant(1234.0, 3), "1230");
        assert_eq!(format_significant(0.012_345, 3), "0.0123");
        assert_eq!(format_significant(9.996, 3), "10.0");
        assert_eq!(format_significant(0.0, 3), "0");
    }

    #[test]
    fn test_ruler() {
        let options = RulerOptions {
            unit_scale: 0.01,
            units: Some("mm".to_string()),
            ..RulerOptions::default()
        };
        let r = ruler(Vec3::ZERO, Vec3::new(300.0, 400.0, 0.0), &options).expect("ruler");
        assert_eq!(r.text(), Some("5.00 mm"));
        assert_eq!(r.mesh().lines().len(), 2);

        let same = ruler(Vec3::ONE, Vec3::ONE, &options).expect("zero length");
        assert_eq!(same.text(), Some("0 mm"));
        assert!(same.mesh().num_triangles() > 0);
    }

    #[test]
    fn test_ruler_from_surface() {
        let root = Actor::new(shapes::sphere(Vec3::ZERO, 1000.0, 16), "root", BrClass::BrainRegion);
        let r = ruler_from_surface(Vec3::ZERO, &root, &RulerOptions::default()).expect("ruler");
        let value: f32 = r.text().expect("text").parse().expect("number");
        assert!((value - 1000.0).abs() < 20.0);
    }

    #[test]
    fn test_plane_actor() {
        let p = plane(Plane::new(Vec3::ZERO, Vec3::X), 10.0, 20.0, &"grey".into(), 0.5).expect("plane");
        assert_eq!(p.br_class(), BrClass::Plane);
        assert_eq!(p.plane().map(|pl| pl.normal()), Some(Vec3::X));
        assert!(plane(Plane::new(Vec3::ZERO, Vec3::X), 0.0, 1.0, &"grey".into(), 1.0).is_err());
    }

    proptest::proptest! {
        #[test]
        fn prop_significant_figures_are_close(value in 1e-3_f64..1e6) {
            let text = format_significant(value, 3);
            let parsed: f64 = text.parse().expect("numeric");
            proptest::prop_assert!((parsed - value).abs() <= value * 5e-3);
        }

        #[test]
        fn prop_ruler_distance(x in -5000.0_f32..5000.0, y in -5000.0_f32..5000.0) {
            let p2 = Vec3::new(x, y, 0.0);
            let r = ruler(Vec3::ZERO, p2, &RulerOptions::default()).expect("ruler");
            let expected = format_significant(f64::from(p2.length()), 3);
            proptest::prop_assert_eq!(r.text(), Some(expected.as_str()));
        }
    }
}
