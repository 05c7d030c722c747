//! Where atlas files come from.
//!
//! An atlas is a folder `<base>/atlases/<name>/` holding `metadata.json`,
//! `structures.json` and `annotation.npy`, plus one mesh per structure under
//! `<base>/meshes/<name>/<acronym>.obj`. A [`LocalAtlas`] reads that layout
//! and, when given a mirror URL, downloads files that are not cached yet.

use std::path::PathBuf;

use brainrender_core::io::{download_file, fail_on_no_connection, load_json, load_mesh, read_npy};
use brainrender_core::{BrainrenderError, Mesh, Paths, Result};

use crate::hierarchy::StructureRecord;
use crate::metadata::AtlasMetadata;

/// Voxel-wise structure ids.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    shape: [usize; 3],
    labels: Vec<u32>,
}

impl Annotation {
    pub fn new(shape: [usize; 3], labels: Vec<u32>) -> Result<Self> {
        let expected = shape.iter().product();
        if labels.len() != expected {
            return Err(BrainrenderError::SizeMismatch {
                expected,
                actual: labels.len(),
            });
        }
        Ok(Self { shape, labels })
    }

    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    /// Structure id at a voxel, `None` outside the volume.
    pub fn get(&self, i: usize, j: usize, k: usize) -> Option<u32> {
        let [a, b, c] = self.shape;
        (i < a && j < b && k < c).then(|| self.labels[(i * b + j) * c + k])
    }
}

/// Collaborator providing the files of one atlas.
pub trait AtlasSource {
    /// Atlas name.
    fn name(&self) -> &str;

    fn metadata(&self) -> Result<AtlasMetadata>;

    fn structures(&self) -> Result<Vec<StructureRecord>>;

    fn annotation(&self) -> Result<Annotation>;

    /// The mesh of one structure, in atlas coordinates.
    ///
    /// Fails with `ResourceMissing` when the structure has no mesh and with
    /// `RemoteUnavailable` when it would have to be downloaded but cannot.
    fn region_mesh(&self, acronym: &str) -> Result<Mesh>;
}

/// Atlas files in the local cache, optionally backed by an HTTP mirror.
#[derive(Debug, Clone)]
pub struct LocalAtlas {
    name: String,
    paths: Paths,
    mirror: Option<String>,
}

impl LocalAtlas {
    /// `mirror` is the base URL files are fetched from, as
    /// `<mirror>/<name>/<file>` and `<mirror>/<name>/meshes/<acronym>.obj`.
    pub fn new(name: impl Into<String>, paths: Paths, mirror: Option<String>) -> Result<Self> {
        let name = name.into();
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
            && name != "."
            && name != "..";
        if !valid {
            return Err(BrainrenderError::invalid(format!("invalid atlas name '{name}'")));
        }
        Ok(Self {
            name,
            paths,
            mirror: mirror.map(|url| url.trim_end_matches('/').to_string()),
        })
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    /// Returns `path`, downloading `remote_file` into it first if needed.
    fn fetch(&self, path: PathBuf, remote_file: &str) -> Result<PathBuf> {
        if path.exists() {
            return Ok(path);
        }
        let Some(mirror) = &self.mirror else {
            return Err(BrainrenderError::ResourceMissing(path));
        };
        fail_on_no_connection(Some(mirror))?;
        let url = format!("{mirror}/{}/{remote_file}", self.name);
        download_file(&url, &path)?;
        Ok(path)
    }

    fn atlas_file(&self, file: &str) -> Result<PathBuf> {
        let path = self.paths.atlas_dir(&self.name)?.join(file);
        self.fetch(path, file)
    }
}

impl AtlasSource for LocalAtlas {
    fn name(&self) -> &str {
        &self.name
    }

    fn metadata(&self) -> Result<AtlasMetadata> {
        let metadata: AtlasMetadata = load_json(self.atlas_file("metadata.json")?)?;
        metadata.validate()?;
        Ok(metadata)
    }

    fn structures(&self) -> Result<Vec<StructureRecord>> {
        load_json(self.atlas_file("structures.json")?)
    }

    fn annotation(&self) -> Result<Annotation> {
        let array = read_npy::<u32>(self.atlas_file("annotation.npy")?)?;
        match array.shape.as_slice() {
            &[a, b, c] => Annotation::new([a, b, c], array.data),
            shape => Err(BrainrenderError::invalid(format!(
                "annotation must be 3-D, got shape {shape:?}"
            ))),
        }
    }

    fn region_mesh(&self, acronym: &str) -> Result<Mesh> {
        let path = self.paths.mesh_file(&self.name, acronym)?;
        let path = self.fetch(path, &format!("meshes/{acronym}.obj"))?;
        load_mesh(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotation_lookup() {
        let a = Annotation::new([2, 2, 2], (0..8).collect()).expect("annotation");
        assert_eq!(a.get(1, 0, 1), Some(5));
        assert_eq!(a.get(2, 0, 0), None);
        assert!(Annotation::new([2, 2, 2], vec![0; 7]).is_err());
    }

    #[test]
    fn test_names_are_checked() {
        let paths = Paths::new(std::env::temp_dir());
        assert!(LocalAtlas::new("allen_mouse_25um", paths.clone(), None).is_ok());
        assert!(LocalAtlas::new("../etc", paths.clone(), None).is_err());
        assert!(LocalAtlas::new("", paths, None).is_err());
    }

    #[test]
    fn test_missing_files_without_mirror() {
        let dir = std::env::temp_dir().join(format!("brainrender-source-{}", std::process::id()));
        let source = LocalAtlas::new("nowhere", Paths::new(&dir), None).expect("source");
        assert!(matches!(source.metadata(), Err(BrainrenderError::ResourceMissing(_))));
        assert!(matches!(source.region_mesh("TH"), Err(BrainrenderError::ResourceMissing(_))));
        let _ = std::fs::remove_dir_all(dir);
    }
}
