//! The rendering backend interface.
//!
//! A scene hands the backend a [`SceneFrame`] borrowing the meshes to draw;
//! the backend owns the camera and the last rendered image.

use brainrender_core::Mesh;
use glam::Vec3;
use image::RgbaImage;

use crate::camera::CameraParams;
use crate::error::RenderResult;
use crate::materials::Material;

/// One mesh to draw, plus its text when it is a label.
#[derive(Debug, Clone, Copy)]
pub struct Drawable<'a> {
    /// Actor name, used by exporters.
    pub name: &'a str,
    /// Geometry in display coordinates.
    pub mesh: &'a Mesh,
    /// Text shown at the first vertex of `mesh`.
    pub label: Option<&'a str>,
}

impl<'a> Drawable<'a> {
    /// A plain mesh.
    pub fn mesh(mesh: &'a Mesh) -> Self {
        Self::named("", mesh)
    }

    /// A named mesh.
    pub fn named(name: &'a str, mesh: &'a Mesh) -> Self {
        Self {
            name,
            mesh,
            label: None,
        }
    }
}

/// Everything the backend needs to draw one frame.
#[derive(Debug, Clone)]
pub struct SceneFrame<'a> {
    /// Meshes in draw order.
    pub drawables: Vec<Drawable<'a>>,
    /// Mesh shown in the orientation inset, if any.
    pub inset: Option<&'a Mesh>,
    /// Bounding box to outline as axes.
    pub axes_bounds: Option<(Vec3, Vec3)>,
    /// Background colour.
    pub background: Vec3,
    /// Surface material.
    pub material: Material,
}

impl<'a> SceneFrame<'a> {
    /// A frame with the default material on a white background.
    pub fn new(drawables: Vec<Drawable<'a>>) -> Self {
        Self {
            drawables,
            inset: None,
            axes_bounds: None,
            background: Vec3::ONE,
            material: Material::default(),
        }
    }

    /// Union of the bounds of every drawable and the axes box.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        self.drawables
            .iter()
            .filter_map(|d| d.mesh.bounds())
            .chain(self.axes_bounds)
            .reduce(|(lo, hi), (l, h)| (lo.min(l), hi.max(h)))
    }
}

/// A rendering library driving a window or an offscreen buffer.
pub trait RenderBackend {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Output size in pixels.
    fn size(&self) -> (u32, u32);

    /// The current camera, if one was set.
    fn camera(&self) -> Option<CameraParams>;

    /// Writes the camera fields into the backend camera.
    fn set_camera(&mut self, camera: &CameraParams) -> RenderResult<()>;

    /// Draws a frame. With `interactive` the backend may hand control to the
    /// user until the window is closed.
    fn show(&mut self, frame: &SceneFrame<'_>, interactive: bool) -> RenderResult<()>;

    /// The last frame drawn by [`RenderBackend::show`].
    fn grab_frame(&self) -> RenderResult<RgbaImage>;

    /// Draws a frame at `scale` times the output size without changing the
    /// stored frame.
    fn render_scaled(&mut self, frame: &SceneFrame<'_>, scale: u32) -> RenderResult<RgbaImage>;

    /// Releases the backend. Further drawing fails with `RenderError::Closed`.
    fn close(&mut self);

    /// True once [`RenderBackend::close`] was called.
    fn is_closed(&self) -> bool;
}
