//! Region heatmaps: brain regions coloured by a scalar and cut to a thin
//! slab, plus the 2-D outline of every region on the slab's face.

use std::collections::BTreeMap;

use brainrender_actors::{Actor, ActorId};
use brainrender_atlas::Hemisphere;
use brainrender_core::{chain_segments, BrainrenderError, ColorLike, Plane, Result, Vec2};
use brainrender_render::{map_color, CameraArg, DEFAULT_COLOR_MAP};
use glam::Vec3;

use crate::scene::{RegionOptions, RenderOptions, Scene};

/// Distance (µm) under which intersection segments are chained together.
const CHAIN_TOLERANCE: f32 = 1e-2;

/// Orientation of the slab.
#[derive(Debug, Clone, PartialEq)]
pub enum HeatmapOrientation {
    /// `sagittal`, `frontal` or `horizontal`.
    Named(String),
    /// An explicit normal in atlas coordinates.
    Normal(Vec3),
}

impl From<&str> for HeatmapOrientation {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<Vec3> for HeatmapOrientation {
    fn from(normal: Vec3) -> Self {
        Self::Normal(normal)
    }
}

/// Where the slab is centred.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeatmapPosition {
    /// Offset (µm) along the normal from the root centre of mass.
    Offset(f32),
    /// A point in atlas coordinates.
    Point(Vec3),
}

impl Default for HeatmapPosition {
    fn default() -> Self {
        Self::Offset(0.0)
    }
}

/// Options for [`Heatmap::new`].
#[derive(Debug, Clone)]
pub struct HeatmapOptions {
    pub orientation: HeatmapOrientation,
    pub position: HeatmapPosition,
    /// Slab thickness in µm.
    pub thickness: f32,
    pub cmap: String,
    /// Colour range; the smallest and largest value when unset.
    pub vmin: Option<f32>,
    pub vmax: Option<f32>,
    pub hemisphere: Option<Hemisphere>,
    pub alpha: f32,
}

impl Default for HeatmapOptions {
    fn default() -> Self {
        Self {
            orientation: "frontal".into(),
            position: HeatmapPosition::default(),
            thickness: 10.0,
            cmap: DEFAULT_COLOR_MAP.to_string(),
            vmin: None,
            vmax: None,
            hemisphere: None,
            alpha: 1.0,
        }
    }
}

/// A scene showing a heatmap of region values.
#[derive(Debug)]
pub struct Heatmap {
    scene: Scene,
    regions: BTreeMap<String, ActorId>,
    values: BTreeMap<String, f32>,
    range: (f32, f32),
    planes: (Plane, Plane),
    camera: &'static str,
    projections: BTreeMap<String, Vec<Vec2>>,
}

fn validate(values: &BTreeMap<String, f32>, scene: &Scene) -> Result<()> {
    if values.is_empty() {
        return Err(BrainrenderError::invalid("a heatmap needs at least one region"));
    }
    for (acronym, value) in values {
        if !scene.atlas().hierarchy().contains(acronym) {
            return Err(BrainrenderError::invalid(format!("unknown acronym '{acronym}'")));
        }
        if !value.is_finite() {
            return Err(BrainrenderError::invalid(format!("value of '{acronym}' is not a number")));
        }
    }
    Ok(())
}

impl Heatmap {
    /// Adds one coloured region per value to `scene`, cuts them to a slab
    /// `thickness` thick and cuts the root on the slab's first face.
    pub fn new(mut scene: Scene, values: BTreeMap<String, f32>, options: &HeatmapOptions) -> Result<Self> {
        validate(&values, &scene)?;
        if !(options.thickness.is_finite() && options.thickness > 0.0) {
            return Err(BrainrenderError::invalid(format!(
                "slab thickness must be positive, got {}",
                options.thickness
            )));
        }
        let vmin = options
            .vmin
            .unwrap_or_else(|| values.values().copied().fold(f32::INFINITY, f32::min));
        let vmax = options
            .vmax
            .unwrap_or_else(|| values.values().copied().fold(f32::NEG_INFINITY, f32::max));

        let (normal, camera) = match &options.orientation {
            HeatmapOrientation::Named(name) => {
                let camera = match name.to_ascii_lowercase().as_str() {
                    "sagittal" => "sagittal",
                    "horizontal" | "axial" => "top",
                    _ => "frontal",
                };
                (scene.atlas().plane_normal(name)?, camera)
            }
            HeatmapOrientation::Normal(n) if n.is_finite() && n.length_squared() > 0.0 => {
                (n.normalize(), "three_quarters")
            }
            HeatmapOrientation::Normal(n) => {
                return Err(BrainrenderError::invalid(format!("invalid heatmap normal {n}")));
            }
        };
        let center = match options.position {
            HeatmapPosition::Offset(offset) => scene.atlas_mut().root_mesh()?.center_of_mass() + normal * offset,
            HeatmapPosition::Point(point) => point,
        };
        let half = options.thickness * 0.5;
        let plane0 = Plane::new(center - normal * half, normal);
        let plane1 = Plane::new(center + normal * half, -normal);

        // colours are computed before touching the scene
        let colors = values
            .iter()
            .map(|(acronym, &value)| Ok((acronym.clone(), map_color(value, &options.cmap, vmin, vmax)?)))
            .collect::<Result<Vec<_>>>()?;

        let mut regions = BTreeMap::new();
        for (acronym, rgb) in colors {
            let region_options = RegionOptions {
                alpha: options.alpha,
                color: Some(ColorLike::from(rgb)),
                hemisphere: options.hemisphere,
                ..RegionOptions::default()
            };
            if let Some(&id) = scene.add_brain_region(&[acronym.as_str()], &region_options)?.first() {
                regions.insert(acronym, id);
            }
        }

        let projections = regions
            .iter()
            .filter_map(|(acronym, &id)| {
                let actor = scene.actor(id)?;
                Some((acronym.clone(), project_section(actor, &plane0, &scene)))
            })
            .collect();

        let ids: Vec<ActorId> = regions.values().copied().collect();
        scene.slice(plane0, Some(ids.as_slice()), true)?;
        scene.slice(plane1, Some(ids.as_slice()), true)?;
        if let Some(root) = scene.root().map(Actor::id) {
            scene.slice(plane0, Some(&[root][..]), false)?;
        }
        log::info!("heatmap of {} regions over [{vmin}, {vmax}]", regions.len());

        Ok(Self {
            scene,
            regions,
            values,
            range: (vmin, vmax),
            planes: (plane0, plane1),
            camera,
            projections,
        })
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn into_scene(self) -> Scene {
        self.scene
    }

    /// Region actors by acronym.
    pub fn regions(&self) -> &BTreeMap<String, ActorId> {
        &self.regions
    }

    pub fn values(&self) -> &BTreeMap<String, f32> {
        &self.values
    }

    /// The `(vmin, vmax)` colour range.
    pub fn range(&self) -> (f32, f32) {
        self.range
    }

    /// The two faces of the slab, in atlas coordinates, normals pointing in.
    pub fn planes(&self) -> (Plane, Plane) {
        self.planes
    }

    /// Outline of every region on the slab's first face, in that plane's
    /// 2-D basis.
    pub fn slice_coordinates(&self) -> &BTreeMap<String, Vec<Vec2>> {
        &self.projections
    }

    /// Renders with a camera facing the slab.
    pub fn show(&mut self, interactive: Option<bool>) -> Result<()> {
        self.scene.render(&RenderOptions {
            interactive,
            camera: CameraArg::from(self.camera),
            zoom: None,
        })
    }
}

/// Intersection of an actor with `plane`, as ordered 2-D points.
fn project_section(actor: &Actor, plane: &Plane, scene: &Scene) -> Vec<Vec2> {
    let local = if actor.is_transformed() {
        scene.axis_correction().apply_plane(plane)
    } else {
        *plane
    };
    let segments = actor.mesh().intersect_with_plane(&local);
    chain_segments(&segments, CHAIN_TOLERANCE)
        .into_iter()
        .flatten()
        .map(|p| local.to_local_2d(p))
        .collect()
}
