//! Offscreen z-buffer rasteriser.
//!
//! Opaque triangles are drawn first with depth writes; translucent triangles
//! are then sorted back to front and blended without writing depth. Lines are
//! drawn last with a small depth bias so outlines on a surface stay visible.
//! Label text goes on top of everything, centred on the projected anchor
//! and always facing the screen.
//! Near and far planes are computed from the scene bounds each frame, the
//! clipping range stored in the camera is ignored.

use brainrender_core::{shapes, Mesh};
use glam::{DMat4, DVec3, DVec4, Vec3};
use image::{Rgba, RgbaImage};

use crate::backend::{Drawable, RenderBackend, SceneFrame};
use crate::camera::CameraParams;
use crate::error::{RenderError, RenderResult};
use crate::font;
use crate::materials::Material;

/// Vertical field of view in degrees.
pub const FIELD_OF_VIEW: f64 = 30.0;

const MAX_DIMENSION: u32 = 16_384;
const LINE_DEPTH_BIAS: f32 = 2e-4;
const AXES_COLOR: Vec3 = Vec3::new(0.3, 0.3, 0.3);
/// Image rows per font pixel of label text.
const TEXT_ROWS_PER_PIXEL: usize = 360;

/// A renderer that draws into memory.
pub struct SoftwareBackend {
    width: u32,
    height: u32,
    camera: Option<CameraParams>,
    last_frame: Option<RgbaImage>,
    closed: bool,
    warned_interactive: bool,
}

impl SoftwareBackend {
    /// Creates a backend drawing `width` x `height` images.
    pub fn new(width: u32, height: u32) -> RenderResult<Self> {
        check_size(width, height)?;
        Ok(Self {
            width,
            height,
            camera: None,
            last_frame: None,
            closed: false,
            warned_interactive: false,
        })
    }

    fn ensure_open(&self) -> RenderResult<()> {
        if self.closed {
            Err(RenderError::Closed)
        } else {
            Ok(())
        }
    }

    fn draw(&self, frame: &SceneFrame<'_>, width: u32, height: u32, scale: u32) -> RgbaImage {
        let camera = self
            .camera
            .or_else(|| frame.bounds().map(|(lo, hi)| fit_camera(lo, hi, DVec3::Z, DVec3::NEG_Y)))
            .unwrap_or_else(|| CameraParams::looking_along(DVec3::ZERO, DVec3::NEG_Z, 1.0, DVec3::Y));

        let mut canvas = Canvas::new(width as usize, height as usize, frame.background);
        if let Some(view) = View::new(&camera, frame.bounds(), width, height) {
            let axes = frame
                .axes_bounds
                .map(|(lo, hi)| shapes::box_lines(lo, hi).with_color(AXES_COLOR));
            let mut drawables = frame.drawables.clone();
            drawables.extend(axes.as_ref().map(Drawable::mesh));
            canvas.draw_scene(&view, &drawables, &frame.material, scale as f32);
        }

        if let Some(inset) = frame.inset {
            let inset_w = (width / 4).max(1);
            let inset_h = (height / 4).max(1);
            if let Some((lo, hi)) = inset.bounds() {
                let inset_camera = fit_camera(lo, hi, camera.direction(), camera.orthogonal_viewup());
                if let Some(view) = View::new(&inset_camera, Some((lo, hi)), inset_w, inset_h) {
                    let mut small = Canvas::new(inset_w as usize, inset_h as usize, frame.background);
                    small.draw_scene(&view, &[Drawable::mesh(inset)], &frame.material, 1.0);
                    let margin = (height / 40) as usize;
                    canvas.composite(&small, margin, height as usize - inset_h as usize - margin);
                }
            }
        }
        canvas.into_image()
    }
}

fn check_size(width: u32, height: u32) -> RenderResult<()> {
    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(RenderError::InvalidSize { width, height });
    }
    Ok(())
}

/// A camera looking along `direction` that frames the box `lo..hi`.
pub fn fit_camera(lo: Vec3, hi: Vec3, direction: DVec3, viewup: DVec3) -> CameraParams {
    let center = ((lo + hi) * 0.5).as_dvec3();
    let radius = (f64::from((hi - lo).length()) * 0.5).max(1.0);
    let distance = radius / (FIELD_OF_VIEW.to_radians() * 0.5).sin() * 1.05;
    CameraParams::looking_along(center, direction, distance, viewup)
}

impl RenderBackend for SoftwareBackend {
    fn name(&self) -> &str {
        "software"
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn camera(&self) -> Option<CameraParams> {
        self.camera
    }

    fn set_camera(&mut self, camera: &CameraParams) -> RenderResult<()> {
        self.ensure_open()?;
        self.camera = Some(*camera);
        Ok(())
    }

    fn show(&mut self, frame: &SceneFrame<'_>, interactive: bool) -> RenderResult<()> {
        self.ensure_open()?;
        if interactive && !self.warned_interactive {
            log::warn!("software backend has no window, rendering offscreen");
            self.warned_interactive = true;
        }
        let image = self.draw(frame, self.width, self.height, 1);
        self.last_frame = Some(image);
        Ok(())
    }

    fn grab_frame(&self) -> RenderResult<RgbaImage> {
        self.ensure_open()?;
        self.last_frame.clone().ok_or(RenderError::NoFrame)
    }

    fn render_scaled(&mut self, frame: &SceneFrame<'_>, scale: u32) -> RenderResult<RgbaImage> {
        self.ensure_open()?;
        let scale = scale.max(1);
        let (width, height) = (self.width.saturating_mul(scale), self.height.saturating_mul(scale));
        check_size(width, height)?;
        Ok(self.draw(frame, width, height, scale))
    }

    fn close(&mut self) {
        self.closed = true;
        self.last_frame = None;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Screen-space vertex: pixel coordinates plus depth in `[0, 1]`.
#[derive(Debug, Clone, Copy)]
struct ScreenPoint {
    x: f32,
    y: f32,
    z: f32,
}

struct View {
    view: DMat4,
    view_proj: DMat4,
    width: f32,
    height: f32,
    direction: Vec3,
}

impl View {
    fn new(camera: &CameraParams, bounds: Option<(Vec3, Vec3)>, width: u32, height: u32) -> Option<Self> {
        let view = camera.view_matrix();
        if !view.is_finite() {
            return None;
        }
        let (near, far) = bounds.map_or((1.0, camera.distance.max(1.0) * 4.0), |(lo, hi)| {
            clipping_range(&view, lo.as_dvec3(), hi.as_dvec3())
        });
        let aspect = f64::from(width) / f64::from(height);
        let proj = DMat4::perspective_rh(FIELD_OF_VIEW.to_radians(), aspect, near, far);
        Some(Self {
            view,
            view_proj: proj * view,
            width: width as f32,
            height: height as f32,
            direction: camera.direction().as_vec3(),
        })
    }

    fn project(&self, p: Vec3) -> Option<ScreenPoint> {
        let clip = self.view_proj * DVec4::new(f64::from(p.x), f64::from(p.y), f64::from(p.z), 1.0);
        if clip.w <= 1e-9 {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        Some(ScreenPoint {
            x: ((ndc.x + 1.0) * 0.5) as f32 * self.width,
            y: ((1.0 - ndc.y) * 0.5) as f32 * self.height,
            z: ndc.z as f32,
        })
    }

    fn eye_depth(&self, p: Vec3) -> f64 {
        -self.view.transform_point3(p.as_dvec3()).z
    }
}

/// Near/far distances enclosing the box `lo..hi` seen through `view`.
fn clipping_range(view: &DMat4, lo: DVec3, hi: DVec3) -> (f64, f64) {
    let mut d_min = f64::INFINITY;
    let mut d_max = f64::NEG_INFINITY;
    for i in 0..8 {
        let corner = DVec3::new(
            if i & 1 == 0 { lo.x } else { hi.x },
            if i & 2 == 0 { lo.y } else { hi.y },
            if i & 4 == 0 { lo.z } else { hi.z },
        );
        let d = -view.transform_point3(corner).z;
        d_min = d_min.min(d);
        d_max = d_max.max(d);
    }
    let far = d_max.max(1.0) * 1.05 + 1.0;
    let near = (d_min * 0.95).max(far * 1e-3);
    (near, far)
}

struct Canvas {
    width: usize,
    height: usize,
    color: Vec<Vec3>,
    depth: Vec<f32>,
    covered: Vec<bool>,
}

impl Canvas {
    fn new(width: usize, height: usize, background: Vec3) -> Self {
        let n = width * height;
        Self {
            width,
            height,
            color: vec![background; n],
            depth: vec![f32::INFINITY; n],
            covered: vec![false; n],
        }
    }

    fn draw_scene(&mut self, view: &View, drawables: &[Drawable<'_>], material: &Material, scale: f32) {
        let mut translucent: Vec<(f64, usize, usize)> = Vec::new();
        let text_scale = (self.height / TEXT_ROWS_PER_PIXEL).max(1);

        for (d_idx, drawable) in drawables.iter().enumerate() {
            let mesh = drawable.mesh;
            let alpha = mesh.alpha();
            if alpha <= 0.0 {
                continue;
            }
            if alpha < 1.0 {
                let points = mesh.points();
                for (t_idx, tri) in mesh.faces().iter().enumerate() {
                    let centroid = (points[tri[0] as usize] + points[tri[1] as usize] + points[tri[2] as usize]) / 3.0;
                    translucent.push((view.eye_depth(centroid), d_idx, t_idx));
                }
            } else {
                let normals = mesh.face_normals();
                for (tri, normal) in mesh.faces().iter().zip(normals) {
                    self.draw_triangle(view, mesh, *tri, normal, material, 1.0);
                }
            }
        }

        translucent.sort_by(|a, b| b.0.total_cmp(&a.0));
        for (_, d_idx, t_idx) in translucent {
            let mesh = drawables[d_idx].mesh;
            let tri = mesh.faces()[t_idx];
            let normal = triangle_normal(mesh, tri);
            self.draw_triangle(view, mesh, tri, normal, material, mesh.alpha());
        }

        for drawable in drawables {
            let mesh = drawable.mesh;
            if mesh.alpha() <= 0.0 {
                continue;
            }
            let width = (mesh.line_width() * scale).max(1.0);
            for line in mesh.lines() {
                let a = mesh.points()[line[0] as usize];
                let b = mesh.points()[line[1] as usize];
                if let (Some(a), Some(b)) = (view.project(a), view.project(b)) {
                    self.draw_line(a, b, mesh.vertex_color(line[0]), mesh.alpha(), width);
                }
            }
            if let Some(text) = drawable.label {
                if let Some(p) = mesh.points().first().and_then(|&p| view.project(p)) {
                    self.draw_text(p, text, mesh.color(), text_scale);
                }
            }
        }
    }

    fn draw_triangle(&mut self, view: &View, mesh: &Mesh, tri: [u32; 3], normal: Vec3, material: &Material, alpha: f32) {
        let points = mesh.points();
        let (Some(a), Some(b), Some(c)) = (
            view.project(points[tri[0] as usize]),
            view.project(points[tri[1] as usize]),
            view.project(points[tri[2] as usize]),
        ) else {
            return;
        };
        let shaded = material.shade(mesh.triangle_color(&tri), normal, view.direction);
        self.fill_triangle([a, b, c], shaded, alpha);
    }

    fn fill_triangle(&mut self, v: [ScreenPoint; 3], color: Vec3, alpha: f32) {
        let edge = |a: ScreenPoint, b: ScreenPoint, px: f32, py: f32| {
            (b.x - a.x) * (py - a.y) - (b.y - a.y) * (px - a.x)
        };
        let area = edge(v[0], v[1], v[2].x, v[2].y);
        if area.abs() < 1e-9 || !area.is_finite() {
            return;
        }
        let min_x = v.iter().map(|p| p.x).fold(f32::INFINITY, f32::min).floor().max(0.0) as usize;
        let min_y = v.iter().map(|p| p.y).fold(f32::INFINITY, f32::min).floor().max(0.0) as usize;
        let max_x = (v.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max).ceil() as usize).min(self.width);
        let max_y = (v.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max).ceil() as usize).min(self.height);

        for py in min_y..max_y {
            for px in min_x..max_x {
                let (sx, sy) = (px as f32 + 0.5, py as f32 + 0.5);
                let w0 = edge(v[1], v[2], sx, sy) / area;
                let w1 = edge(v[2], v[0], sx, sy) / area;
                let w2 = edge(v[0], v[1], sx, sy) / area;
                if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                    continue;
                }
                let z = w0 * v[0].z + w1 * v[1].z + w2 * v[2].z;
                if !(0.0..=1.0).contains(&z) {
                    continue;
                }
                let idx = py * self.width + px;
                if z >= self.depth[idx] {
                    continue;
                }
                if alpha >= 1.0 {
                    self.color[idx] = color;
                    self.depth[idx] = z;
                } else {
                    self.color[idx] = color * alpha + self.color[idx] * (1.0 - alpha);
                }
                self.covered[idx] = true;
            }
        }
    }

    fn draw_line(&mut self, a: ScreenPoint, b: ScreenPoint, color: Vec3, alpha: f32, width: f32) {
        let steps = (b.x - a.x).abs().max((b.y - a.y).abs()).ceil().max(1.0);
        if !steps.is_finite() || steps > 1e5 {
            return;
        }
        let half = ((width - 1.0) * 0.5).round() as i64;
        for s in 0..=steps as usize {
            let t = s as f32 / steps;
            let x = (a.x + (b.x - a.x) * t).floor() as i64;
            let y = (a.y + (b.y - a.y) * t).floor() as i64;
            let z = a.z + (b.z - a.z) * t;
            for oy in -half..=half {
                for ox in -half..=half {
                    self.plot(x + ox, y + oy, z, color, alpha);
                }
            }
        }
    }

    fn draw_text(&mut self, anchor: ScreenPoint, text: &str, color: Vec3, scale: usize) {
        let (w, h) = font::text_size(text, scale);
        let x0 = anchor.x.floor() as i64 - (w / 2) as i64;
        let y0 = anchor.y.floor() as i64 - (h / 2) as i64;
        font::for_each_pixel(text, scale, |x, y| {
            self.plot(x0 + x as i64, y0 + y as i64, f32::NEG_INFINITY, color, 1.0);
        });
    }

    fn plot(&mut self, x: i64, y: i64, z: f32, color: Vec3, alpha: f32) {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return;
        }
        let idx = y as usize * self.width + x as usize;
        if z > self.depth[idx] + LINE_DEPTH_BIAS {
            return;
        }
        self.color[idx] = color * alpha + self.color[idx] * (1.0 - alpha);
        self.covered[idx] = true;
    }

    fn composite(&mut self, other: &Canvas, x0: usize, y0: usize) {
        for y in 0..other.height {
            for x in 0..other.width {
                let (tx, ty) = (x0 + x, y0 + y);
                if tx >= self.width || ty >= self.height {
                    continue;
                }
                let src = y * other.width + x;
                if other.covered[src] {
                    let dst = ty * self.width + tx;
                    self.color[dst] = other.color[src];
                    self.covered[dst] = true;
                }
            }
        }
    }

    fn into_image(self) -> RgbaImage {
        let to_u8 = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        let mut image = RgbaImage::new(self.width as u32, self.height as u32);
        for (pixel, c) in image.pixels_mut().zip(&self.color) {
            *pixel = Rgba([to_u8(c.x), to_u8(c.y), to_u8(c.z), 255]);
        }
        image
    }
}

fn triangle_normal(mesh: &Mesh, tri: [u32; 3]) -> Vec3 {
    let p = mesh.points();
    let (a, b, c) = (p[tri[0] as usize], p[tri[1] as usize], p[tri[2] as usize]);
    (b - a).cross(c - a).normalize_or_zero()
}

#[cfg(test)]
mod tests {
    use super::*;
    use brainrender_core::shapes;

    fn non_background(image: &RgbaImage, background: [u8; 3]) -> usize {
        image
            .pixels()
            .filter(|p| p.0[..3] != background)
            .count()
    }

    #[test]
    fn test_invalid_size() {
        assert!(matches!(
            SoftwareBackend::new(0, 10),
            Err(RenderError::InvalidSize { .. })
        ));
    }

    #[test]
    fn test_sphere_is_drawn_centered() {
        let mut backend = SoftwareBackend::new(64, 48).expect("backend");
        let sphere = shapes::sphere(Vec3::new(100.0, 200.0, 300.0), 50.0, 12).with_color(Vec3::new(1.0, 0.0, 0.0));
        let frame = SceneFrame::new(vec![Drawable::mesh(&sphere)]);
        backend.show(&frame, false).expect("show");
        let image = backend.grab_frame().expect("frame");
        assert_eq!(image.dimensions(), (64, 48));
        assert!(non_background(&image, [255, 255, 255]) > 100);
        let center = image.get_pixel(32, 24);
        assert!(center.0[0] > center.0[2]);
    }

    #[test]
    fn test_camera_and_scale() {
        let mut backend = SoftwareBackend::new(40, 30).expect("backend");
        let sphere = shapes::sphere(Vec3::ZERO, 10.0, 8);
        let camera = fit_camera(Vec3::splat(-10.0), Vec3::splat(10.0), DVec3::NEG_X, DVec3::Y);
        backend.set_camera(&camera).expect("camera");
        assert_eq!(backend.camera(), Some(camera));
        let frame = SceneFrame::new(vec![Drawable::mesh(&sphere)]);
        let big = backend.render_scaled(&frame, 2).expect("scaled");
        assert_eq!(big.dimensions(), (80, 60));
        assert!(matches!(backend.grab_frame(), Err(RenderError::NoFrame)));
    }

    #[test]
    fn test_translucent_and_hidden() {
        let mut backend = SoftwareBackend::new(32, 32).expect("backend");
        let hidden = shapes::sphere(Vec3::ZERO, 10.0, 8).with_alpha(0.0);
        let ghost = shapes::sphere(Vec3::ZERO, 10.0, 8).with_color(Vec3::ZERO).with_alpha(0.5);
        let frame = SceneFrame::new(vec![Drawable::mesh(&hidden)]);
        backend.show(&frame, false).expect("show hidden");
        // nothing drawn, the whole image keeps the background
        assert_eq!(non_background(&backend.grab_frame().expect("frame"), [255, 255, 255]), 0);

        let frame = SceneFrame::new(vec![Drawable::mesh(&hidden), Drawable::mesh(&ghost)]);
        backend.show(&frame, false).expect("show ghost");
        let center = *backend.grab_frame().expect("frame").get_pixel(16, 16);
        assert!(center.0[0] > 0 && center.0[0] < 255);
    }

    #[test]
    fn test_closed_backend() {
        let mut backend = SoftwareBackend::new(8, 8).expect("backend");
        backend.close();
        assert!(backend.is_closed());
        let frame = SceneFrame::new(Vec::new());
        assert!(matches!(backend.show(&frame, false), Err(RenderError::Closed)));
    }

    #[test]
    fn test_label_text_is_rasterised() {
        let anchor = Mesh::from_lines(vec![Vec3::new(5.0, 5.0, 5.0)], Vec::new()).with_color(Vec3::ZERO);
        let lit = |text: &'static str| {
            let mut backend = SoftwareBackend::new(120, 40).expect("backend");
            let frame = SceneFrame::new(vec![Drawable {
                label: Some(text),
                ..Drawable::named("label", &anchor)
            }]);
            backend.show(&frame, false).expect("show");
            non_background(&backend.grab_frame().expect("frame"), [255, 255, 255])
        };
        let mut expected = 0;
        font::for_each_pixel("12.5 mm", 1, |_, _| expected += 1);

        assert_eq!(lit("TH"), 28);
        assert_eq!(lit("12.5 mm"), expected);
        assert!(lit("thalamus") > lit("TH"));
    }

    #[test]
    fn test_lines_labels_axes_inset() {
        let mut backend = SoftwareBackend::new(64, 64).expect("backend");
        let line = Mesh::polyline(vec![Vec3::new(-10.0, 0.0, 0.0), Vec3::new(10.0, 0.0, 0.0)]).with_color(Vec3::ZERO);
        let label = Mesh::from_lines(vec![Vec3::new(0.0, 5.0, 0.0)], Vec::new()).with_color(Vec3::ZERO);
        let root = shapes::sphere(Vec3::ZERO, 20.0, 8);
        let mut frame = SceneFrame::new(vec![
            Drawable::mesh(&line),
            Drawable {
                label: Some("TH"),
                ..Drawable::named("label", &label)
            },
        ]);
        frame.axes_bounds = Some((Vec3::splat(-12.0), Vec3::splat(12.0)));
        frame.inset = Some(&root);
        backend.show(&frame, true).expect("show");
        let image = backend.grab_frame().expect("frame");
        assert!(non_background(&image, [255, 255, 255]) > 20);
    }
}
