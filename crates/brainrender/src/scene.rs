//! The [`Scene`]: an atlas, the actors drawn over it and the backend that
//! draws them.
//!
//! Actors are built in atlas coordinates. The first call to
//! [`Scene::render`] moves every actor into display coordinates with the
//! atlas' [`AxisCorrection`]; actors added later are corrected on the next
//! render. Labels and silhouettes are requested on actors and realised at
//! render time, once the geometry they attach to is in its final place.

use std::path::{Path, PathBuf};

use brainrender_actors::{
    neuron, points, Actor, ActorId, BrClass, LabelParams, Morphology, NeuronCache, NeuronOptions,
    PointsOptions, SilhouetteParams,
};
use brainrender_atlas::{atlas_by_name, Atlas, Hemisphere, PlaneOptions, ROOT};
use brainrender_core::io::{data_extension, load_mesh};
use brainrender_core::{settings, AxisCorrection, BrainrenderError, ColorLike, Mesh, Paths, Plane, Result, Settings};
use brainrender_render::{
    check_format, export_html, resolve_camera, save_image, screenshot_path, CameraArg, CameraParams, Drawable, Material,
    RenderBackend, SceneFrame, SoftwareBackend,
};
use chrono::Utc;
use glam::Vec3;
use image::RgbaImage;

/// Construction options for a [`Scene`].
#[derive(Debug, Clone)]
pub struct SceneOptions {
    /// Atlas to load; the configured default when unset.
    pub atlas_name: Option<String>,
    pub title: Option<String>,
    /// Draw a small copy of the root in a corner.
    pub inset: bool,
    /// Add the root (whole brain) actor.
    pub root: bool,
    /// Where screenshots go; `<base>/screenshots` when unset.
    pub screenshots_folder: Option<PathBuf>,
    /// Cache directory; the per-user data directory when unset.
    pub base_dir: Option<PathBuf>,
}

impl Default for SceneOptions {
    fn default() -> Self {
        Self {
            atlas_name: None,
            title: None,
            inset: true,
            root: true,
            screenshots_folder: None,
            base_dir: None,
        }
    }
}

/// Anything [`Scene::add`] accepts.
#[derive(Debug)]
pub enum Addable {
    Actor(Actor),
    Mesh(Mesh),
    /// A mesh (`.obj`, `.ply`), morphology (`.swc`) or points (`.npy`) file.
    Path(PathBuf),
    Morphology(Morphology),
    Points(Vec<Vec3>),
}

impl From<Actor> for Addable {
    fn from(actor: Actor) -> Self {
        Self::Actor(actor)
    }
}

impl From<Mesh> for Addable {
    fn from(mesh: Mesh) -> Self {
        Self::Mesh(mesh)
    }
}

impl From<PathBuf> for Addable {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for Addable {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<Morphology> for Addable {
    fn from(morphology: Morphology) -> Self {
        Self::Morphology(morphology)
    }
}

impl From<Vec<Vec3>> for Addable {
    fn from(coords: Vec<Vec3>) -> Self {
        Self::Points(coords)
    }
}

/// Options for [`Scene::add_brain_region`].
#[derive(Debug, Clone)]
pub struct RegionOptions {
    pub alpha: f32,
    /// Overrides the atlas colour of every region.
    pub color: Option<ColorLike>,
    pub silhouette: bool,
    /// Keep only one half of each region.
    pub hemisphere: Option<Hemisphere>,
}

impl Default for RegionOptions {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            color: None,
            silhouette: false,
            hemisphere: None,
        }
    }
}

/// The plane a [`Scene::slice`] cuts with.
#[derive(Debug, Clone, PartialEq)]
pub enum SliceTarget {
    /// A named atlas plane through the root centre of mass.
    Named(String),
    /// A plane in atlas coordinates.
    Plane(Plane),
    /// The plane of a Plane actor already in the scene.
    Actor(ActorId),
}

impl From<&str> for SliceTarget {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<Plane> for SliceTarget {
    fn from(plane: Plane) -> Self {
        Self::Plane(plane)
    }
}

impl From<ActorId> for SliceTarget {
    fn from(id: ActorId) -> Self {
        Self::Actor(id)
    }
}

/// Selects actors to remove: one identity, or every actor with a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActorRef {
    Id(ActorId),
    Name(String),
}

impl From<ActorId> for ActorRef {
    fn from(id: ActorId) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for ActorRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

/// Options for [`Scene::render`].
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Hand control to the viewer; the configured default when unset.
    pub interactive: Option<bool>,
    /// Camera for this render. On the first render an unset camera falls
    /// back to the scene camera, the atlas camera and the configured camera,
    /// in that order. Later renders keep the current camera.
    pub camera: CameraArg,
    /// Zoom applied to the resolved camera; the atlas zoom on first render.
    pub zoom: Option<f64>,
}

impl RenderOptions {
    /// A non-interactive render with the default camera.
    pub fn offscreen() -> Self {
        Self {
            interactive: Some(false),
            ..Self::default()
        }
    }
}

/// Initialises `env_logger` once. `RUST_LOG` overrides the default filter.
pub fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).try_init();
}

/// A brain atlas with actors drawn over it.
pub struct Scene {
    config: Settings,
    title: String,
    paths: Paths,
    atlas: Atlas,
    correction: AxisCorrection,
    actors: Vec<Actor>,
    root: Option<ActorId>,
    want_inset: bool,
    inset: Option<Mesh>,
    camera: Option<CameraParams>,
    backend: Box<dyn RenderBackend>,
    is_rendered: bool,
    screenshots_folder: PathBuf,
    /// Cuts already applied, as (actor, plane in atlas coordinates).
    cuts: Vec<(ActorId, Plane)>,
    neuron_cache: NeuronCache,
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("title", &self.title)
            .field("atlas", &self.atlas.name())
            .field("actors", &self.actors.len())
            .field("backend", &self.backend.name())
            .field("is_rendered", &self.is_rendered)
            .finish_non_exhaustive()
    }
}

impl Scene {
    /// Creates a scene drawn by the software backend.
    pub fn new(options: SceneOptions) -> Result<Self> {
        let config = settings();
        let (width, height) = config.render_size();
        let backend = SoftwareBackend::new(width, height)?;
        Self::build(options, config, Box::new(backend))
    }

    /// Creates a scene drawn by `backend`.
    pub fn with_backend(options: SceneOptions, backend: Box<dyn RenderBackend>) -> Result<Self> {
        Self::build(options, settings(), backend)
    }

    fn build(options: SceneOptions, config: Settings, backend: Box<dyn RenderBackend>) -> Result<Self> {
        init_logging(config.debug);
        let paths = Paths::resolve(options.base_dir.as_deref())?;
        let atlas_name = options.atlas_name.unwrap_or_else(|| config.default_atlas.clone());
        let atlas = atlas_by_name(&atlas_name, &paths, config.atlas_mirror_url.as_deref())?;
        let correction = atlas.axis_correction()?;
        let screenshots_folder = match options.screenshots_folder {
            Some(folder) => {
                std::fs::create_dir_all(&folder)?;
                folder
            }
            None => paths.screenshots()?,
        };

        let mut scene = Self {
            title: options.title.unwrap_or_else(|| format!("brainrender - {atlas_name}")),
            paths,
            atlas,
            correction,
            actors: Vec::new(),
            root: None,
            want_inset: options.inset,
            inset: None,
            camera: None,
            backend,
            is_rendered: false,
            screenshots_folder,
            cuts: Vec::new(),
            neuron_cache: NeuronCache::new(),
            config,
        };
        if options.root {
            let color = ColorLike::from(scene.config.root_color);
            let alpha = scene.config.root_alpha;
            if let Some(root) = scene.atlas.get_region(&[ROOT], Some(&color), alpha)?.pop() {
                scene.root = Some(scene.push(root));
            }
        }
        log::info!("created scene '{}' with atlas {atlas_name}", scene.title);
        Ok(scene)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// The settings captured when the scene was created.
    pub fn config(&self) -> &Settings {
        &self.config
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    pub fn atlas(&self) -> &Atlas {
        &self.atlas
    }

    pub fn atlas_mut(&mut self) -> &mut Atlas {
        &mut self.atlas
    }

    pub fn axis_correction(&self) -> &AxisCorrection {
        &self.correction
    }

    pub fn is_rendered(&self) -> bool {
        self.is_rendered
    }

    pub fn screenshots_folder(&self) -> &Path {
        &self.screenshots_folder
    }

    /// Actors in insertion order.
    pub fn actors(&self) -> &[Actor] {
        &self.actors
    }

    pub fn actor(&self, id: ActorId) -> Option<&Actor> {
        self.actors.iter().find(|a| a.id() == id)
    }

    pub fn actor_mut(&mut self, id: ActorId) -> Option<&mut Actor> {
        self.actors.iter_mut().find(|a| a.id() == id)
    }

    /// The root actor, unless it was not added or was removed.
    pub fn root(&self) -> Option<&Actor> {
        self.root.and_then(|id| self.actor(id))
    }

    /// Actors matching both filters; `None` matches anything.
    pub fn get_actors(&self, name: Option<&str>, br_class: Option<BrClass>) -> Vec<&Actor> {
        self.actors
            .iter()
            .filter(|a| name.map_or(true, |n| a.name() == n))
            .filter(|a| br_class.map_or(true, |c| a.br_class() == c))
            .collect()
    }

    fn push(&mut self, actor: Actor) -> ActorId {
        let id = actor.id();
        if self.actor(id).is_none() {
            self.actors.push(actor);
        }
        id
    }

    fn require(&self, id: ActorId) -> Result<&Actor> {
        self.actor(id)
            .ok_or_else(|| BrainrenderError::Logic(format!("actor {id} is not in the scene")))
    }

    fn make_actor(&mut self, item: Addable) -> Result<Actor> {
        match item {
            Addable::Actor(actor) => Ok(actor),
            Addable::Mesh(mesh) => Ok(Actor::new(mesh, "Mesh", BrClass::FromFile)),
            Addable::Morphology(morphology) => neuron(morphology, &NeuronOptions::default(), None),
            Addable::Points(coords) => points(coords, &PointsOptions::default()),
            Addable::Path(path) => match data_extension(&path).as_deref() {
                Some("obj" | "ply") => {
                    let name = path
                        .file_stem()
                        .map_or_else(|| "from file".to_string(), |s| s.to_string_lossy().into_owned());
                    let mesh = load_mesh(&path)?.with_color(Vec3::from_array(self.config.default_mesh_color));
                    Ok(Actor::new(mesh, name, BrClass::FromFile))
                }
                Some("swc") => neuron(path, &NeuronOptions::default(), Some(&mut self.neuron_cache)),
                Some("npy") => points(path, &PointsOptions::default()),
                _ => Err(BrainrenderError::UnsupportedFormat(format!(
                    "cannot add {} to a scene",
                    path.display()
                ))),
            },
        }
    }

    /// Adds one object. Adding an actor already in the scene does nothing.
    pub fn add(&mut self, item: impl Into<Addable>) -> Result<ActorId> {
        let actor = self.make_actor(item.into())?;
        Ok(self.push(actor))
    }

    /// Adds several objects. Nothing is added unless every object converts.
    pub fn add_many(&mut self, items: impl IntoIterator<Item = Addable>) -> Result<Vec<ActorId>> {
        let actors = items
            .into_iter()
            .map(|item| self.make_actor(item))
            .collect::<Result<Vec<_>>>()?;
        Ok(actors.into_iter().map(|a| self.push(a)).collect())
    }

    /// Adds atlas regions. Regions the atlas cannot provide are skipped.
    pub fn add_brain_region(&mut self, acronyms: &[&str], options: &RegionOptions) -> Result<Vec<ActorId>> {
        let mut regions = self.atlas.get_region(acronyms, options.color.as_ref(), options.alpha)?;
        if let Some(hemisphere) = options.hemisphere {
            let plane = self.atlas.hemisphere_plane(hemisphere);
            for region in &mut regions {
                region.cut_with_plane(&plane);
            }
        }
        if options.silhouette {
            for region in &mut regions {
                region.outlined(SilhouetteParams::default());
            }
        }
        Ok(regions.into_iter().map(|r| self.push(r)).collect())
    }

    /// Requests a text label on an actor, placed at render time.
    pub fn add_label(&mut self, id: ActorId, text: &str, params: LabelParams) -> Result<()> {
        self.require(id)?;
        if let Some(actor) = self.actor_mut(id) {
            actor.caption(text, params);
        }
        Ok(())
    }

    /// Requests an outline of an actor, drawn at render time.
    pub fn add_silhouette(&mut self, id: ActorId, params: SilhouetteParams) -> Result<()> {
        self.require(id)?;
        if let Some(actor) = self.actor_mut(id) {
            actor.outlined(params);
        }
        Ok(())
    }

    /// Removes actors and everything derived from them. Absent actors are
    /// ignored. Returns the removed actors.
    pub fn remove(&mut self, target: impl Into<ActorRef>) -> Vec<Actor> {
        let target = target.into();
        let mut removed_ids: Vec<ActorId> = self
            .actors
            .iter()
            .filter(|a| match &target {
                ActorRef::Id(id) => a.id() == *id,
                ActorRef::Name(name) => a.name() == name,
            })
            .map(Actor::id)
            .collect();
        if removed_ids.is_empty() {
            return Vec::new();
        }
        let derived: Vec<ActorId> = self
            .actors
            .iter()
            .filter(|a| a.parent().is_some_and(|p| removed_ids.contains(&p)))
            .map(Actor::id)
            .collect();
        removed_ids.extend(derived);

        let (removed, kept): (Vec<Actor>, Vec<Actor>) =
            std::mem::take(&mut self.actors).into_iter().partition(|a| removed_ids.contains(&a.id()));
        self.actors = kept;
        self.cuts.retain(|(id, _)| !removed_ids.contains(id));
        if self.root.is_some_and(|r| removed_ids.contains(&r)) {
            self.root = None;
        }
        log::debug!("removed {} actors", removed.len());
        removed
    }

    fn slice_plane(&mut self, target: &SliceTarget) -> Result<Plane> {
        match target {
            SliceTarget::Named(name) => self.atlas.plane_geometry(&PlaneOptions::named(name)),
            SliceTarget::Plane(plane) => Ok(*plane),
            SliceTarget::Actor(id) => {
                let actor = self.require(*id)?;
                let plane = actor
                    .plane()
                    .ok_or_else(|| BrainrenderError::invalid(format!("actor '{}' is not a plane", actor.name())))?;
                Ok(if actor.is_transformed() {
                    plane.transformed(&self.correction.matrix().inverse())
                } else {
                    plane
                })
            }
        }
    }

    /// Cuts actors in place, keeping the side the plane normal points to.
    ///
    /// Without `actors` every actor but planes, labels and silhouettes is
    /// cut. With `close_actors` the cut surfaces are capped, except the
    /// root's. Repeating a cut does nothing.
    pub fn slice(
        &mut self,
        plane: impl Into<SliceTarget>,
        actors: Option<&[ActorId]>,
        close_actors: bool,
    ) -> Result<()> {
        let plane = self.slice_plane(&plane.into())?;
        let targets: Vec<ActorId> = match actors {
            Some(ids) => {
                for &id in ids {
                    self.require(id)?;
                }
                ids.to_vec()
            }
            None => self
                .actors
                .iter()
                .filter(|a| !matches!(a.br_class(), BrClass::Plane | BrClass::Label | BrClass::Silhouette))
                .map(Actor::id)
                .collect(),
        };

        let correction = self.correction;
        let root = self.root;
        for id in targets {
            if self.cuts.contains(&(id, plane)) {
                continue;
            }
            let Some(actor) = self.actors.iter_mut().find(|a| a.id() == id) else {
                continue;
            };
            let local = if actor.is_transformed() {
                correction.apply_plane(&plane)
            } else {
                plane
            };
            actor.cut_with_plane(&local);
            if close_actors && Some(id) != root {
                actor.mesh_mut().cap();
            }
            self.cuts.push((id, plane));
        }
        Ok(())
    }

    /// Resolves and stores the scene camera.
    pub fn set_camera(&mut self, camera: impl Into<CameraArg>) -> Result<CameraParams> {
        let params = resolve_camera(&camera.into(), &self.config.default_camera)?;
        self.camera = Some(params);
        self.backend.set_camera(&params)?;
        Ok(params)
    }

    /// The camera the backend currently uses, else the scene camera.
    pub fn camera(&self) -> Option<CameraParams> {
        self.backend.camera().or(self.camera)
    }

    fn render_camera(&self, options: &RenderOptions, first: bool) -> Result<Option<CameraParams>> {
        let zoom = options.zoom.or_else(|| first.then(|| self.atlas.zoom()));
        let base = match &options.camera {
            CameraArg::Default if first => match (self.camera, self.atlas.default_camera()) {
                (Some(camera), _) => Some(camera),
                (None, Some(atlas_camera)) => Some(resolve_camera(&atlas_camera, &self.config.default_camera)?),
                (None, None) => Some(resolve_camera(&CameraArg::Default, &self.config.default_camera)?),
            },
            CameraArg::Default => options.zoom.and(self.backend.camera()),
            explicit => Some(resolve_camera(explicit, &self.config.default_camera)?),
        };
        Ok(base.map(|camera| camera.zoomed(zoom.unwrap_or(1.0))))
    }

    /// Where a label of an actor anchored at `anchor` goes: the anchor
    /// itself, mirrored into the right hemisphere when it lies in the left.
    fn label_position(&self, anchor: Vec3) -> Vec3 {
        let atlas_point = self.correction.invert_point(anchor);
        match self.atlas.hemisphere_from_coords(atlas_point) {
            Some(Hemisphere::Left) => self
                .correction
                .apply_point(self.atlas.mirror_point_across_hemispheres(atlas_point)),
            _ => anchor,
        }
    }

    fn realise_requests(&mut self) {
        let view_dir = self.backend.camera().map_or(Vec3::Z, |c| c.direction().as_vec3());
        let mut derived = Vec::new();
        for i in 0..self.actors.len() {
            if self.actors[i].needs_label() {
                if let Some(anchor) = self.actors[i].label_anchor() {
                    let position = self.label_position(anchor);
                    derived.extend(self.actors[i].make_label(position));
                }
            }
            if self.actors[i].needs_silhouette() {
                derived.extend(self.actors[i].make_silhouette(view_dir));
            }
        }
        self.actors.extend(derived);
    }

    /// Draws the scene.
    ///
    /// Actors not yet in display coordinates are corrected, pending labels
    /// and silhouettes are realised and the camera is resolved.
    pub fn render(&mut self, options: &RenderOptions) -> Result<()> {
        let first = !self.is_rendered;
        let correction = self.correction;
        let transformed = self
            .actors
            .iter_mut()
            .map(|a| a.apply_axis_correction(&correction))
            .filter(|&moved| moved)
            .count();
        if transformed > 0 {
            log::debug!("moved {transformed} actors to display coordinates");
        }

        if let Some(camera) = self.render_camera(options, first)? {
            self.backend.set_camera(&camera)?;
        }
        self.realise_requests();
        if first && self.want_inset {
            self.inset = self.root().map(|r| r.mesh().clone());
        }

        let interactive = options.interactive.unwrap_or(self.config.interactive) && !self.config.offscreen;
        let frame = build_frame(&self.actors, self.inset.as_ref(), &self.config, self.root);
        self.backend.show(&frame, interactive)?;
        self.is_rendered = true;
        log::info!("rendered {} actors with the {} backend", self.actors.len(), self.backend.name());
        Ok(())
    }

    /// The last rendered image.
    pub fn grab_frame(&self) -> Result<RgbaImage> {
        Ok(self.backend.grab_frame()?)
    }

    /// Saves an image of the scene and returns its path.
    ///
    /// Renders offscreen first if the scene was never rendered. `scale`
    /// multiplies the window size; the configured scale when unset. The
    /// extension picks the format (png, jpg, bmp, or svg/eps/pdf around the
    /// raster); any other extension fails before anything is rendered.
    pub fn screenshot(&mut self, name: Option<&str>, scale: Option<u32>) -> Result<PathBuf> {
        let path = screenshot_path(&self.screenshots_folder, name, Utc::now());
        check_format(&path)?;
        if !self.is_rendered {
            self.render(&RenderOptions::offscreen())?;
        }
        let scale = scale.unwrap_or(self.config.screenshot_scale).max(1);
        let frame = build_frame(&self.actors, self.inset.as_ref(), &self.config, self.root);
        let image = self.backend.render_scaled(&frame, scale)?;
        save_image(&path, &image)?;
        log::info!("saved screenshot to {}", path.display());
        Ok(path)
    }

    /// Writes a self-contained HTML viewer of the scene.
    pub fn export(&mut self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();
        if !self.is_rendered {
            self.render(&RenderOptions::offscreen())?;
        }
        let frame = build_frame(&self.actors, self.inset.as_ref(), &self.config, self.root);
        export_html(path, &self.title, &frame, self.backend.camera())?;
        Ok(path.to_path_buf())
    }

    /// Releases the backend.
    pub fn close(&mut self) {
        self.backend.close();
        self.is_rendered = false;
    }

    /// Keyboard shortcuts: `s` screenshot, `c` log the camera, `q` close.
    /// Returns whether the key was handled.
    pub fn handle_key(&mut self, key: char) -> Result<bool> {
        match key.to_ascii_lowercase() {
            's' => {
                self.screenshot(None, None)?;
            }
            'c' => match self.camera() {
                Some(camera) => log::info!("camera: {}", serde_json::to_string(&camera)?),
                None => log::info!("camera not set"),
            },
            'q' => self.close(),
            _ => return Ok(false),
        }
        Ok(true)
    }
}

fn build_frame<'a>(
    actors: &'a [Actor],
    inset: Option<&'a Mesh>,
    config: &Settings,
    root: Option<ActorId>,
) -> SceneFrame<'a> {
    let drawables = actors
        .iter()
        .map(|a| Drawable {
            name: a.name(),
            mesh: a.mesh(),
            label: a.text(),
        })
        .collect();
    let axes_bounds = if config.show_axes {
        root.and_then(|id| actors.iter().find(|a| a.id() == id))
            .and_then(Actor::bounds)
    } else {
        None
    };
    SceneFrame {
        drawables,
        inset,
        axes_bounds,
        background: Vec3::from_array(config.background_color),
        material: Material::from_style(config.shader_style),
    }
}
