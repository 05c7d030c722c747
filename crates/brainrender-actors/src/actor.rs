//! The scene node: one mesh plus identity and render-time requests.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use brainrender_core::{to_rgb, AxisCorrection, ColorLike, Mesh, Plane, Result, ScalarGrid};
use glam::Vec3;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique actor identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(u64);

impl ActorId {
    fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw id.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The kind of object an actor represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrClass {
    BrainRegion,
    Point,
    Points,
    Neuron,
    Line,
    Cylinder,
    Streamlines,
    Volume,
    Ruler,
    Plane,
    Density,
    FromFile,
    Silhouette,
    Label,
}

impl BrClass {
    /// Display name of the class.
    pub fn as_str(self) -> &'static str {
        match self {
            BrClass::BrainRegion => "brain region",
            BrClass::Point => "Point",
            BrClass::Points => "Points",
            BrClass::Neuron => "Neuron",
            BrClass::Line => "Line",
            BrClass::Cylinder => "Cylinder",
            BrClass::Streamlines => "Streamlines",
            BrClass::Volume => "Volume",
            BrClass::Ruler => "Ruler",
            BrClass::Plane => "Plane",
            BrClass::Density => "density",
            BrClass::FromFile => "from file",
            BrClass::Silhouette => "silhouette",
            BrClass::Label => "label",
        }
    }
}

impl fmt::Display for BrClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Styling of a deferred label.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelParams {
    /// Label colour; the actor's colour when unset.
    pub color: Option<Vec3>,
    /// Marker size in pixels.
    pub size: f32,
    /// Offset from the anchor point, in micrometres.
    pub offset: Vec3,
    /// Radius of a sphere drawn at the anchor, if any.
    pub anchor_radius: Option<f32>,
}

impl Default for LabelParams {
    fn default() -> Self {
        Self {
            color: None,
            size: 3.0,
            offset: Vec3::new(0.0, -300.0, 0.0),
            anchor_radius: None,
        }
    }
}

/// Styling of a deferred silhouette.
#[derive(Debug, Clone, PartialEq)]
pub struct SilhouetteParams {
    pub color: Vec3,
    pub line_width: f32,
}

impl Default for SilhouetteParams {
    fn default() -> Self {
        Self {
            color: Vec3::ZERO,
            line_width: 2.0,
        }
    }
}

/// A scene node that exclusively owns one mesh.
///
/// Actors are not `Clone`: [`Actor::duplicate`] makes a copy with a new
/// identity.
#[derive(Debug)]
pub struct Actor {
    id: ActorId,
    name: String,
    br_class: BrClass,
    mesh: Mesh,
    is_transformed: bool,
    label_request: Option<(String, LabelParams)>,
    silhouette_request: Option<SilhouetteParams>,
    labels: Vec<ActorId>,
    parent: Option<ActorId>,
    text: Option<String>,
    volume: Option<ScalarGrid>,
    plane: Option<Plane>,
}

impl Actor {
    /// Wraps a mesh.
    pub fn new(mesh: Mesh, name: impl Into<String>, br_class: BrClass) -> Self {
        Self {
            id: ActorId::next(),
            name: name.into(),
            br_class,
            mesh,
            is_transformed: false,
            label_request: None,
            silhouette_request: None,
            labels: Vec::new(),
            parent: None,
            text: None,
            volume: None,
            plane: None,
        }
    }

    /// Attaches a text (rulers and labels).
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Attaches the scalar grid the actor was built from.
    #[must_use]
    pub fn with_volume(mut self, volume: ScalarGrid) -> Self {
        self.volume = Some(volume);
        self
    }

    /// Attaches the plane a Plane actor was built from.
    #[must_use]
    pub fn with_plane(mut self, plane: Plane) -> Self {
        self.plane = Some(plane);
        self
    }

    /// A copy with a fresh identity and no pending requests or children.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        Self {
            id: ActorId::next(),
            name: self.name.clone(),
            br_class: self.br_class,
            mesh: self.mesh.clone(),
            is_transformed: self.is_transformed,
            label_request: None,
            silhouette_request: None,
            labels: Vec::new(),
            parent: None,
            text: self.text.clone(),
            volume: self.volume.clone(),
            plane: self.plane,
        }
    }

    #[must_use]
    pub fn id(&self) -> ActorId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    #[must_use]
    pub fn br_class(&self) -> BrClass {
        self.br_class
    }

    #[must_use]
    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// Mutable mesh access, used by scene operations such as slicing.
    pub fn mesh_mut(&mut self) -> &mut Mesh {
        &mut self.mesh
    }

    #[must_use]
    pub fn color(&self) -> Vec3 {
        self.mesh.color()
    }

    /// Sets the colour from any colour specification.
    pub fn set_color(&mut self, color: impl Into<ColorLike>) -> Result<()> {
        let rgb = to_rgb(&color.into())?;
        self.mesh.set_color(rgb);
        Ok(())
    }

    #[must_use]
    pub fn alpha(&self) -> f32 {
        self.mesh.alpha()
    }

    pub fn set_alpha(&mut self, alpha: f32) {
        self.mesh.set_alpha(alpha);
    }

    #[must_use]
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        self.mesh.bounds()
    }

    #[must_use]
    pub fn center_of_mass(&self) -> Vec3 {
        self.mesh.center_of_mass()
    }

    #[must_use]
    pub fn points(&self) -> &[Vec3] {
        self.mesh.points()
    }

    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    #[must_use]
    pub fn volume(&self) -> Option<&ScalarGrid> {
        self.volume.as_ref()
    }

    /// The plane of a Plane actor, in the actor's current coordinates.
    #[must_use]
    pub fn plane(&self) -> Option<Plane> {
        self.plane
    }

    #[must_use]
    pub fn parent(&self) -> Option<ActorId> {
        self.parent
    }

    /// Ids of the label actors derived from this actor.
    #[must_use]
    pub fn labels(&self) -> &[ActorId] {
        &self.labels
    }

    #[must_use]
    pub fn is_transformed(&self) -> bool {
        self.is_transformed
    }

    /// Applies the axis correction once. Returns false if it was already
    /// applied.
    pub fn apply_axis_correction(&mut self, correction: &AxisCorrection) -> bool {
        if self.is_transformed {
            return false;
        }
        correction.apply_mesh(&mut self.mesh);
        self.plane = self.plane.map(|p| correction.apply_plane(&p));
        self.is_transformed = true;
        true
    }

    /// Reflects the actor across `coordinate[axis] == origin`.
    pub fn mirror(&mut self, axis: usize, origin: f32) {
        self.mesh.mirror(axis, origin);
    }

    /// Cuts the mesh in place, keeping the side the plane normal points to.
    pub fn cut_with_plane(&mut self, plane: &Plane) -> usize {
        self.mesh.cut_with_plane(plane)
    }

    /// Points where the segment `p0..p1` crosses the surface.
    #[must_use]
    pub fn intersect_with_line(&self, p0: Vec3, p1: Vec3) -> Vec<Vec3> {
        self.mesh.intersect_with_line(p0, p1)
    }

    /// Indices of `points` inside the (closed) mesh.
    #[must_use]
    pub fn inside_points(&self, points: &[Vec3]) -> Vec<usize> {
        self.mesh.inside_points(points)
    }

    /// Outline of the mesh seen along `view_dir`.
    #[must_use]
    pub fn silhouette(&self, view_dir: Vec3) -> Mesh {
        self.mesh.silhouette(view_dir)
    }

    /// Requests a text label, created at render time.
    pub fn caption(&mut self, text: impl Into<String>, params: LabelParams) -> &mut Self {
        self.label_request = Some((text.into(), params));
        self
    }

    /// Requests an outline, created at render time.
    pub fn outlined(&mut self, params: SilhouetteParams) -> &mut Self {
        self.silhouette_request = Some(params);
        self
    }

    #[must_use]
    pub fn needs_label(&self) -> bool {
        self.label_request.is_some()
    }

    #[must_use]
    pub fn needs_silhouette(&self) -> bool {
        self.silhouette_request.is_some()
    }

    /// Lowest vertex (minimum y), the default label anchor.
    #[must_use]
    pub fn label_anchor(&self) -> Option<Vec3> {
        self.mesh
            .points()
            .iter()
            .copied()
            .min_by(|a, b| a.y.total_cmp(&b.y))
    }

    /// Realises the pending label at `position`.
    ///
    /// Returns the label actor, followed by an anchor sphere when requested.
    /// Derived actors are already transformed and record this actor as parent.
    pub fn make_label(&mut self, position: Vec3) -> Vec<Actor> {
        let Some((text, params)) = self.label_request.take() else {
            return Vec::new();
        };
        let color = params.color.unwrap_or_else(|| self.color());
        let mut marker = Mesh::from_lines(vec![position + params.offset], Vec::new()).with_color(color);
        marker.set_line_width(params.size);

        let mut derived = vec![Actor::new(marker, format!("label {text}"), BrClass::Label).with_text(text)];
        if let Some(radius) = params.anchor_radius {
            let sphere = brainrender_core::shapes::sphere(position, radius, 8).with_color(color);
            derived.push(Actor::new(sphere, format!("{} label anchor", self.name), BrClass::Label));
        }
        for actor in &mut derived {
            actor.is_transformed = true;
            actor.parent = Some(self.id);
            self.labels.push(actor.id);
        }
        derived
    }

    /// Realises the pending silhouette for a camera looking along `view_dir`.
    pub fn make_silhouette(&mut self, view_dir: Vec3) -> Option<Actor> {
        let params = self.silhouette_request.take()?;
        let mut outline = self.mesh.silhouette(view_dir).with_color(params.color);
        outline.set_line_width(params.line_width);
        let mut actor = Actor::new(outline, format!("{} silhouette", self.name), BrClass::Silhouette);
        actor.is_transformed = true;
        actor.parent = Some(self.id);
        Some(actor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brainrender_core::shapes;

    fn sphere_actor() -> Actor {
        Actor::new(shapes::sphere(Vec3::new(0.0, 0.0, 10.0), 5.0, 8), "ball", BrClass::FromFile)
    }

    #[test]
    fn test_ids_are_unique() {
        let a = sphere_actor();
        let b = a.duplicate();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.mesh(), b.mesh());
        assert_eq!(b.name(), "ball");
    }

    #[test]
    fn test_axis_correction_once() {
        let mut a = sphere_actor();
        let correction = AxisCorrection::canonical();
        assert!(a.apply_axis_correction(&correction));
        let after = a.points().to_vec();
        assert!(!a.apply_axis_correction(&correction));
        assert_eq!(a.points(), after.as_slice());
        assert!(a.center_of_mass().z < 0.0);
    }

    #[test]
    fn test_label_state_machine() {
        let mut a = sphere_actor();
        assert!(!a.needs_label());
        a.caption("ball", LabelParams { anchor_radius: Some(1.0), ..LabelParams::default() });
        assert!(a.needs_label());
        let anchor = a.label_anchor().expect("anchor");
        assert!((anchor.y + 5.0).abs() < 1e-3);
        let derived = a.make_label(anchor);
        assert_eq!(derived.len(), 2);
        assert!(!a.needs_label());
        assert_eq!(a.labels().len(), 2);
        assert_eq!(derived[0].text(), Some("ball"));
        assert!(derived.iter().all(|d| d.is_transformed() && d.parent() == Some(a.id())));
        assert!(a.make_label(anchor).is_empty());
    }

    #[test]
    fn test_silhouette_request() {
        let mut a = sphere_actor();
        assert!(a.make_silhouette(Vec3::Z).is_none());
        a.outlined(SilhouetteParams::default());
        let outline = a.make_silhouette(Vec3::Z).expect("silhouette");
        assert_eq!(outline.br_class(), BrClass::Silhouette);
        assert!(!outline.mesh().lines().is_empty());
        assert!(!a.needs_silhouette());
    }

    #[test]
    fn test_set_color() {
        let mut a = sphere_actor();
        a.set_color("red").expect("named colour");
        assert_eq!(a.color(), Vec3::new(1.0, 0.0, 0.0));
        assert!(a.set_color("not-a-colour").is_err());
        assert_eq!(BrClass::BrainRegion.to_string(), "brain region");
    }
}
