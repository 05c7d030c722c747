//! The [`Atlas`]: hierarchy, annotation and region meshes of one reference
//! brain.
//!
//! Every coordinate taken or returned here is in atlas space (micrometres
//! along the atlas' own axes), before the display axis correction.

use std::collections::HashMap;
use std::fmt;

use brainrender_actors::{plane, Actor, BrClass};
use brainrender_core::{to_rgb, AxisCorrection, BrainrenderError, ColorLike, Mesh, Paths, Plane, Result};
use brainrender_render::CameraArg;
use glam::Vec3;

use crate::hierarchy::{Hierarchy, StructureRecord};
use crate::metadata::AtlasMetadata;
use crate::source::{Annotation, AtlasSource, LocalAtlas};

/// Acronym of the whole-brain structure.
pub const ROOT: &str = "root";

/// Largest physical extent (µm) framed at zoom 1.
const ZOOM_REFERENCE_EXTENT: f32 = 13_200.0;

/// One side of the brain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hemisphere {
    Left,
    Right,
}

impl Hemisphere {
    pub fn as_str(self) -> &'static str {
        match self {
            Hemisphere::Left => "left",
            Hemisphere::Right => "right",
        }
    }

    /// Parses `"left"` or `"right"`.
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            other => Err(BrainrenderError::invalid(format!(
                "hemisphere must be 'left' or 'right', got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Hemisphere {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request for [`Atlas::get_plane`].
#[derive(Debug, Clone)]
pub struct PlaneOptions {
    /// Centre of the plane; the root centre of mass when unset.
    pub pos: Option<Vec3>,
    /// Explicit normal, used when `plane` is unset.
    pub norm: Option<Vec3>,
    /// A named orientation: sagittal, frontal or horizontal.
    pub plane: Option<String>,
    /// Size along the plane's first axis; the root extent when unset.
    pub sx: Option<f32>,
    /// Size along the plane's second axis; the root extent when unset.
    pub sy: Option<f32>,
    pub color: ColorLike,
    pub alpha: f32,
}

impl Default for PlaneOptions {
    fn default() -> Self {
        Self {
            pos: None,
            norm: None,
            plane: None,
            sx: None,
            sy: None,
            color: "lightgrey".into(),
            alpha: 0.25,
        }
    }
}

impl PlaneOptions {
    /// A named plane through the root centre of mass.
    pub fn named(name: &str) -> Self {
        Self {
            plane: Some(name.to_string()),
            ..Self::default()
        }
    }
}

/// A reference atlas.
pub struct Atlas {
    source: Box<dyn AtlasSource>,
    metadata: AtlasMetadata,
    hierarchy: Hierarchy,
    annotation: Annotation,
    meshes: HashMap<String, Mesh>,
}

impl fmt::Debug for Atlas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Atlas")
            .field("name", &self.metadata.name)
            .field("structures", &self.hierarchy.len())
            .field("cached_meshes", &self.meshes.len())
            .finish_non_exhaustive()
    }
}

/// Opens an atlas from the local cache, fetching missing files from
/// `mirror` when one is given.
pub fn atlas_by_name(name: &str, paths: &Paths, mirror: Option<&str>) -> Result<Atlas> {
    let source = LocalAtlas::new(name, paths.clone(), mirror.map(str::to_string))?;
    Atlas::new(Box::new(source))
}

impl Atlas {
    /// Loads metadata, hierarchy and annotation from `source`.
    pub fn new(source: Box<dyn AtlasSource>) -> Result<Self> {
        let metadata = source.metadata()?;
        let hierarchy = Hierarchy::new(source.structures()?)?;
        let annotation = source.annotation()?;
        if annotation.shape() != metadata.shape {
            return Err(BrainrenderError::invalid(format!(
                "annotation shape {:?} does not match atlas shape {:?}",
                annotation.shape(),
                metadata.shape
            )));
        }
        if !hierarchy.contains(ROOT) {
            return Err(BrainrenderError::invalid(format!("atlas '{}' has no '{ROOT}' structure", metadata.name)));
        }
        log::info!(
            "loaded atlas {} ({} structures, {:?} voxels)",
            source.name(),
            hierarchy.len(),
            metadata.shape
        );
        Ok(Self {
            source,
            metadata,
            hierarchy,
            annotation,
            meshes: HashMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn metadata(&self) -> &AtlasMetadata {
        &self.metadata
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    pub fn annotation(&self) -> &Annotation {
        &self.annotation
    }

    /// The display correction for this atlas' axes.
    pub fn axis_correction(&self) -> Result<AxisCorrection> {
        self.metadata.axis_correction()
    }

    /// Zoom that fits the root in a standard viewport.
    pub fn zoom(&self) -> f64 {
        let extent = self.metadata.extent().max_element();
        f64::from(ZOOM_REFERENCE_EXTENT / extent.max(1.0))
    }

    /// The atlas' preferred camera, if it has one.
    pub fn default_camera(&self) -> Option<CameraArg> {
        self.metadata.default_camera.clone().map(CameraArg::from_json)
    }

    pub fn structure(&self, acronym: &str) -> Option<&StructureRecord> {
        self.hierarchy.get(acronym)
    }

    pub fn structure_by_id(&self, id: u32) -> Option<&StructureRecord> {
        self.hierarchy.get_by_id(id)
    }

    pub fn parent(&self, acronym: &str) -> Result<Option<&StructureRecord>> {
        self.hierarchy.parent(acronym)
    }

    pub fn children(&self, acronym: &str) -> Result<Vec<&StructureRecord>> {
        self.hierarchy.children(acronym)
    }

    pub fn descendants(&self, acronym: &str) -> Result<Vec<&StructureRecord>> {
        self.hierarchy.descendants(acronym)
    }

    pub fn ancestors(&self, acronym: &str) -> Result<Vec<&StructureRecord>> {
        self.hierarchy.ancestors(acronym)
    }

    /// `(id, acronym, name)` of every structure.
    pub fn lookup(&self) -> Vec<(u32, &str, &str)> {
        self.hierarchy.lookup()
    }

    /// The mesh of a structure, loaded once per atlas.
    pub fn region_mesh(&mut self, acronym: &str) -> Result<Mesh> {
        if let Some(mesh) = self.meshes.get(acronym) {
            return Ok(mesh.clone());
        }
        self.hierarchy.require(acronym)?;
        let mesh = self.source.region_mesh(acronym)?;
        if mesh.is_empty() {
            return Err(BrainrenderError::invalid(format!("mesh of '{acronym}' is empty")));
        }
        self.meshes.insert(acronym.to_string(), mesh.clone());
        Ok(mesh)
    }

    pub fn root_mesh(&mut self) -> Result<Mesh> {
        self.region_mesh(ROOT)
    }

    pub fn root_bounds(&mut self) -> Result<(Vec3, Vec3)> {
        self.root_mesh()?
            .bounds()
            .ok_or_else(|| BrainrenderError::Logic("root mesh has no vertices".to_string()))
    }

    /// Region actors, one per acronym that resolves.
    ///
    /// Unknown acronyms and structures without a usable mesh (missing, empty
    /// or unparseable) are skipped with a warning. The colour defaults to the
    /// structure's own colour. Download failures are returned.
    pub fn get_region(&mut self, acronyms: &[&str], color: Option<&ColorLike>, alpha: f32) -> Result<Vec<Actor>> {
        let color = color.map(to_rgb).transpose()?;
        let mut actors = Vec::with_capacity(acronyms.len());
        for &acronym in acronyms {
            let Some(record) = self.hierarchy.get(acronym) else {
                log::warn!("no structure '{acronym}' in atlas {}, skipping", self.name());
                continue;
            };
            let rgb = color.unwrap_or_else(|| {
                let [r, g, b] = record.rgb_triplet;
                Vec3::new(f32::from(r), f32::from(g), f32::from(b)) / 255.0
            });
            let mesh = match self.region_mesh(acronym) {
                Ok(mesh) => mesh,
                Err(BrainrenderError::ResourceMissing(path)) => {
                    log::warn!("no mesh for '{acronym}' at {}, skipping", path.display());
                    continue;
                }
                Err(err @ (BrainrenderError::InvalidInput(_) | BrainrenderError::UnsupportedFormat(_))) => {
                    log::warn!("unusable mesh for '{acronym}' ({err}), skipping");
                    continue;
                }
                Err(err) => return Err(err),
            };
            actors.push(Actor::new(mesh.with_color(rgb).with_alpha(alpha), acronym, BrClass::BrainRegion));
        }
        Ok(actors)
    }

    /// Centre of mass of a region mesh.
    pub fn get_region_center_of_mass(&mut self, acronym: &str) -> Result<Vec3> {
        Ok(self.region_mesh(acronym)?.center_of_mass())
    }

    /// Normal of a named plane.
    pub fn plane_normal(&self, name: &str) -> Result<Vec3> {
        self.metadata
            .plane_normals
            .get(name)
            .ok_or_else(|| BrainrenderError::invalid(format!("unknown plane name '{name}'")))
    }

    /// The infinite plane a [`PlaneOptions`] describes.
    pub fn plane_geometry(&mut self, options: &PlaneOptions) -> Result<Plane> {
        let normal = match (&options.plane, options.norm) {
            (Some(name), norm) => match self.metadata.plane_normals.get(name) {
                Some(n) => n,
                None => norm.ok_or_else(|| BrainrenderError::invalid(format!("unknown plane name '{name}'")))?,
            },
            (None, Some(norm)) => norm,
            (None, None) => return Err(BrainrenderError::invalid("a plane needs either a name or a normal")),
        };
        if !(normal.is_finite() && normal.length_squared() > 0.0) {
            return Err(BrainrenderError::invalid(format!("invalid plane normal {normal}")));
        }
        let origin = match options.pos {
            Some(pos) => pos,
            None => self.root_mesh()?.center_of_mass(),
        };
        Ok(Plane::new(origin, normal))
    }

    /// A rectangular Plane actor.
    ///
    /// Unset sizes default to the extent of the root bounding box along the
    /// plane's two in-plane axes.
    pub fn get_plane(&mut self, options: &PlaneOptions) -> Result<Actor> {
        let geometry = self.plane_geometry(options)?;
        let (sx, sy) = match (options.sx, options.sy) {
            (Some(sx), Some(sy)) => (sx, sy),
            (sx, sy) => {
                let (lo, hi) = self.root_bounds()?;
                let extent = hi - lo;
                let (u, v) = geometry.basis();
                let along = |axis: Vec3| axis.abs().dot(extent);
                (sx.unwrap_or_else(|| along(u)), sy.unwrap_or_else(|| along(v)))
            }
        };
        plane(geometry, sx, sy, &options.color, options.alpha)
    }

    fn voxel(&self, point: Vec3) -> Option<[usize; 3]> {
        let v = point / self.metadata.resolution_vec();
        if !v.is_finite() || v.min_element() < 0.0 {
            return None;
        }
        let idx = [v.x as usize, v.y as usize, v.z as usize];
        let shape = self.metadata.shape;
        (idx[0] < shape[0] && idx[1] < shape[1] && idx[2] < shape[2]).then_some(idx)
    }

    /// The finest structure annotated at `point`, `None` outside the volume
    /// or the brain.
    pub fn structure_from_coords(&self, point: Vec3) -> Option<&StructureRecord> {
        let [i, j, k] = self.voxel(point)?;
        match self.annotation.get(i, j, k)? {
            0 => None,
            id => self.hierarchy.get_by_id(id),
        }
    }

    /// Acronym of [`Atlas::structure_from_coords`].
    pub fn acronym_from_coords(&self, point: Vec3) -> Option<&str> {
        self.structure_from_coords(point).map(|r| r.acronym.as_str())
    }

    /// The side of the midline `point` lies on, `None` outside the volume.
    pub fn hemisphere_from_coords(&self, point: Vec3) -> Option<Hemisphere> {
        self.voxel(point)?;
        let (axis, starts_right) = self.metadata.lateral_axis().unwrap_or((2, true));
        let near_origin = point[axis] < self.metadata.midline()[axis];
        Some(if near_origin == starts_right {
            Hemisphere::Right
        } else {
            Hemisphere::Left
        })
    }

    /// Reflects `point` across the sagittal midline.
    pub fn mirror_point_across_hemispheres(&self, point: Vec3) -> Vec3 {
        let (axis, _) = self.metadata.lateral_axis().unwrap_or((2, true));
        let mut mirrored = point;
        mirrored[axis] = 2.0 * self.metadata.midline()[axis] - point[axis];
        mirrored
    }

    /// The midline plane whose normal points into `hemisphere`.
    pub fn hemisphere_plane(&self, hemisphere: Hemisphere) -> Plane {
        let (axis, starts_right) = self.metadata.lateral_axis().unwrap_or((2, true));
        let mut normal = Vec3::ZERO;
        // increasing coordinates move away from the origin side
        normal[axis] = if (hemisphere == Hemisphere::Right) == starts_right { -1.0 } else { 1.0 };
        Plane::new(self.metadata.midline(), normal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toy::write_toy_atlas;

    fn toy(tag: &str) -> (std::path::PathBuf, Atlas) {
        let dir = std::env::temp_dir().join(format!("brainrender-atlas-{tag}-{}", std::process::id()));
        let paths = Paths::new(&dir);
        write_toy_atlas(&paths, "toy_atlas").expect("write toy atlas");
        let atlas = atlas_by_name("toy_atlas", &paths, None).expect("open toy atlas");
        (dir, atlas)
    }

    #[test]
    fn test_get_region_is_memoised() {
        let (dir, mut atlas) = toy("memo");
        let first = atlas.get_region(&["TH"], None, 1.0).expect("TH");
        let second = atlas.get_region(&["TH"], None, 1.0).expect("TH again");
        assert_eq!(first[0].mesh().num_vertices(), second[0].mesh().num_vertices());
        assert_eq!(first[0].bounds(), second[0].bounds());
        assert_ne!(first[0].id(), second[0].id());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_unknown_regions_are_skipped() {
        let (dir, mut atlas) = toy("unknown");
        let actors = atlas.get_region(&["TH", "NOPE"], None, 0.5).expect("regions");
        assert_eq!(actors.len(), 1);
        assert_eq!(actors[0].name(), "TH");
        assert_eq!(actors[0].alpha(), 0.5);
        assert!(atlas.get_region(&[], None, 1.0).expect("empty").is_empty());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_coordinate_queries() {
        let (dir, mut atlas) = toy("coords");
        let th = atlas.get_region_center_of_mass("TH").expect("TH centre");
        assert_eq!(atlas.acronym_from_coords(th), Some("TH"));
        assert_eq!(atlas.structure_from_coords(Vec3::splat(-10.0)), None);
        assert_eq!(atlas.structure_from_coords(Vec3::new(100.0, 100.0, 100.0)), None);

        let mid = atlas.metadata().midline();
        let right = Vec3::new(mid.x, mid.y, mid.z - 1000.0);
        assert_eq!(atlas.hemisphere_from_coords(right), Some(Hemisphere::Right));
        let left = atlas.mirror_point_across_hemispheres(right);
        assert_eq!(atlas.hemisphere_from_coords(left), Some(Hemisphere::Left));
        assert!((atlas.mirror_point_across_hemispheres(left) - right).length() < 1e-3);
        assert!(atlas.hemisphere_plane(Hemisphere::Right).is_kept(right));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_planes() {
        let (dir, mut atlas) = toy("planes");
        let sagittal = atlas.get_plane(&PlaneOptions::named("sagittal")).expect("sagittal");
        assert_eq!(sagittal.br_class(), BrClass::Plane);
        let geometry = sagittal.plane().expect("plane geometry");
        assert_eq!(geometry.normal(), Vec3::Z);
        let root_com = atlas.root_mesh().expect("root").center_of_mass();
        assert!((geometry.origin() - root_com).length() < 1e-3);

        assert!(atlas.get_plane(&PlaneOptions::named("diagonal")).is_err());
        assert!(atlas.get_plane(&PlaneOptions::default()).is_err());
        let explicit = PlaneOptions {
            norm: Some(Vec3::new(1.0, 1.0, 0.0)),
            sx: Some(100.0),
            sy: Some(200.0),
            ..PlaneOptions::default()
        };
        let tilted = atlas.get_plane(&explicit).expect("explicit normal");
        let (lo, hi) = tilted.bounds().expect("bounds");
        assert!((hi - lo).length() < 300.0);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_hierarchy_access() {
        let (dir, atlas) = toy("hierarchy");
        assert_eq!(atlas.parent("MOs").expect("known").map(|r| r.acronym.as_str()), Some("CTX"));
        assert!(atlas.descendants("root").expect("root").len() + 1 == atlas.lookup().len());
        assert!(atlas.ancestors("TH").expect("TH").iter().any(|r| r.acronym == ROOT));
        assert!(atlas.zoom() > 0.0);
        let _ = std::fs::remove_dir_all(dir);
    }
}
