//! A small synthetic mouse-like atlas.
//!
//! Regions are ellipsoids at a 200 µm resolution. The toy atlas is written
//! to the same cache layout as downloaded atlases, so it goes through the
//! regular loading path. Tests and demos use it offline.

use brainrender_core::io::{save_json, write_npy, write_obj, NpyArray};
use brainrender_core::{shapes, Paths, Result};
use glam::Vec3;

use crate::hierarchy::StructureRecord;
use crate::metadata::{AtlasMetadata, PlaneNormals};

/// Name the toy atlas is usually written under.
pub const TOY_ATLAS: &str = "toy_mouse_200um";

const RESOLUTION: f32 = 200.0;
const SHAPE: [usize; 3] = [66, 40, 57];
const MIDLINE: [f64; 3] = [6600.0, 4000.0, 5700.0];

struct ToyRegion {
    id: u32,
    acronym: &'static str,
    name: &'static str,
    rgb: [u8; 3],
    parent: Option<u32>,
    center: [f32; 3],
    semi_axes: [f32; 3],
}

/// Regions in annotation priority: a voxel takes the first region containing
/// it.
const REGIONS: &[ToyRegion] = &[
    ToyRegion {
        id: 549,
        acronym: "TH",
        name: "Thalamus",
        rgb: [255, 112, 128],
        parent: Some(8),
        center: [6800.0, 4200.0, 5700.0],
        semi_axes: [1200.0, 900.0, 1400.0],
    },
    ToyRegion {
        id: 993,
        acronym: "MOs",
        name: "Secondary motor area",
        rgb: [31, 157, 90],
        parent: Some(688),
        center: [5000.0, 1800.0, 5700.0],
        semi_axes: [2200.0, 700.0, 2600.0],
    },
    ToyRegion {
        id: 382,
        acronym: "CA1",
        name: "Field CA1",
        rgb: [126, 208, 75],
        parent: Some(688),
        center: [7200.0, 2400.0, 5700.0],
        semi_axes: [1400.0, 600.0, 3200.0],
    },
    ToyRegion {
        id: 477,
        acronym: "STR",
        name: "Striatum",
        rgb: [152, 214, 249],
        parent: Some(567),
        center: [5200.0, 3800.0, 5700.0],
        semi_axes: [1500.0, 1200.0, 3200.0],
    },
    ToyRegion {
        id: 1097,
        acronym: "HY",
        name: "Hypothalamus",
        rgb: [230, 68, 56],
        parent: Some(8),
        center: [6800.0, 6000.0, 5700.0],
        semi_axes: [1000.0, 700.0, 900.0],
    },
    ToyRegion {
        id: 313,
        acronym: "MB",
        name: "Midbrain",
        rgb: [255, 100, 255],
        parent: Some(8),
        center: [8200.0, 4200.0, 5700.0],
        semi_axes: [900.0, 900.0, 1300.0],
    },
    ToyRegion {
        id: 512,
        acronym: "CB",
        name: "Cerebellum",
        rgb: [240, 240, 128],
        parent: Some(8),
        center: [10300.0, 3900.0, 5700.0],
        semi_axes: [1200.0, 1500.0, 3000.0],
    },
    ToyRegion {
        id: 688,
        acronym: "CTX",
        name: "Cerebral cortex",
        rgb: [176, 255, 184],
        parent: Some(567),
        center: [5600.0, 2800.0, 5700.0],
        semi_axes: [3900.0, 2300.0, 4300.0],
    },
    ToyRegion {
        id: 567,
        acronym: "CH",
        name: "Cerebrum",
        rgb: [176, 240, 255],
        parent: Some(8),
        center: [5600.0, 3300.0, 5700.0],
        semi_axes: [4000.0, 2500.0, 4400.0],
    },
    ToyRegion {
        id: 8,
        acronym: "grey",
        name: "Basic cell groups and regions",
        rgb: [191, 218, 227],
        parent: Some(997),
        center: [6600.0, 4000.0, 5700.0],
        semi_axes: [5390.0, 3234.0, 4704.0],
    },
    ToyRegion {
        id: 997,
        acronym: "root",
        name: "root",
        rgb: [255, 255, 255],
        parent: None,
        center: [6600.0, 4000.0, 5700.0],
        semi_axes: [5500.0, 3300.0, 4800.0],
    },
];

impl ToyRegion {
    fn contains(&self, p: Vec3) -> bool {
        let d = (p - Vec3::from_array(self.center)) / Vec3::from_array(self.semi_axes);
        d.length_squared() <= 1.0
    }

    fn record(&self) -> StructureRecord {
        StructureRecord {
            id: self.id,
            acronym: self.acronym.to_string(),
            name: self.name.to_string(),
            rgb_triplet: self.rgb,
            parent_id: self.parent,
            structure_id_path: Vec::new(),
        }
    }
}

/// Acronyms of every toy structure.
pub fn toy_acronyms() -> Vec<&'static str> {
    REGIONS.iter().map(|r| r.acronym).collect()
}

/// Writes the toy atlas into the cache under `name`.
pub fn write_toy_atlas(paths: &Paths, name: &str) -> Result<()> {
    let dir = paths.atlas_dir(name)?;
    let metadata = AtlasMetadata {
        name: name.to_string(),
        resolution: [f64::from(RESOLUTION); 3],
        shape: SHAPE,
        orientation: "asr".to_string(),
        axis_order: vec!["frontal".into(), "vertical".into(), "lateral".into()],
        plane_normals: PlaneNormals::default(),
        midline_point: MIDLINE,
        default_camera: None,
        species: Some("Mus musculus (synthetic)".to_string()),
        symmetric: true,
    };
    save_json(dir.join("metadata.json"), &metadata)?;

    let records: Vec<StructureRecord> = REGIONS.iter().rev().map(ToyRegion::record).collect();
    save_json(dir.join("structures.json"), &records)?;

    let [nx, ny, nz] = SHAPE;
    let mut labels = Vec::with_capacity(nx * ny * nz);
    for i in 0..nx {
        for j in 0..ny {
            for k in 0..nz {
                let center = (Vec3::new(i as f32, j as f32, k as f32) + 0.5) * RESOLUTION;
                // root only bounds the brain; voxels inside it are labelled grey at least
                let label = REGIONS
                    .iter()
                    .filter(|r| r.acronym != "root")
                    .find(|r| r.contains(center))
                    .map_or(0, |r| r.id);
                labels.push(label);
            }
        }
    }
    write_npy(dir.join("annotation.npy"), &NpyArray::new(vec![nx, ny, nz], labels)?)?;

    let unit = shapes::sphere(Vec3::ZERO, 1.0, 24);
    for region in REGIONS {
        let mut mesh = unit.clone();
        let (center, semi) = (Vec3::from_array(region.center), Vec3::from_array(region.semi_axes));
        for p in mesh.points_mut() {
            *p = *p * semi + center;
        }
        write_obj(paths.mesh_file(name, region.acronym)?, &mesh)?;
    }
    log::debug!("wrote toy atlas {name} to {}", dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::Hierarchy;

    #[test]
    fn test_regions_form_a_tree() {
        let records = REGIONS.iter().map(ToyRegion::record).collect();
        let hierarchy = Hierarchy::new(records).expect("toy hierarchy");
        assert_eq!(hierarchy.root().acronym, "root");
        assert_eq!(hierarchy.len(), toy_acronyms().len());
    }

    #[test]
    fn test_annotation_priority() {
        let th = &REGIONS[0];
        let center = Vec3::from_array(th.center);
        let first = REGIONS.iter().find(|r| r.contains(center)).map(|r| r.acronym);
        assert_eq!(first, Some("TH"));
        assert!(!REGIONS.iter().any(|r| r.acronym != "root" && r.contains(Vec3::splat(100.0))));
    }
}
