//! Local cache directory layout.
//!
//! ```text
//! <base_dir>/
//!     atlases/<atlas_name>/{metadata.json, structures.json, annotation.npy}
//!     meshes/<atlas_name>/<acronym>.obj
//!     morphology/<source>/<neuron_id>.swc
//!     streamlines/<experiment_id>.json
//!     screenshots/
//!     videos/
//! ```
//!
//! Folders are created the first time they are asked for.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use crate::error::{BrainrenderError, Result};

const QUALIFIER: &str = "org";
const ORGANIZATION: &str = "brainrender";
const APPLICATION: &str = "brainrender";

/// Cache folder resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    base_dir: PathBuf,
}

impl Paths {
    /// Uses `base_dir` as the cache root.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Uses the per-user data directory (e.g. `~/.local/share/brainrender`).
    pub fn user_default() -> Result<Self> {
        let dirs = ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION).ok_or_else(|| {
            BrainrenderError::ResourceMissing(PathBuf::from("<user data directory>"))
        })?;
        Ok(Self::new(dirs.data_dir()))
    }

    /// Uses `base_dir` if given, the per-user default otherwise.
    pub fn resolve(base_dir: Option<&Path>) -> Result<Self> {
        match base_dir {
            Some(dir) => Ok(Self::new(dir)),
            None => Self::user_default(),
        }
    }

    /// Returns the cache root.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn folder(&self, parts: &[&str]) -> Result<PathBuf> {
        let mut path = self.base_dir.clone();
        for part in parts {
            path.push(part);
        }
        fs::create_dir_all(&path)?;
        Ok(path)
    }

    /// Folder holding atlas metadata, hierarchy and annotation for `atlas_name`.
    pub fn atlas_dir(&self, atlas_name: &str) -> Result<PathBuf> {
        self.folder(&["atlases", atlas_name])
    }

    /// Folder holding region meshes for `atlas_name`.
    pub fn meshes(&self, atlas_name: &str) -> Result<PathBuf> {
        self.folder(&["meshes", atlas_name])
    }

    /// Path of the mesh file for one region.
    pub fn mesh_file(&self, atlas_name: &str, acronym: &str) -> Result<PathBuf> {
        Ok(self.meshes(atlas_name)?.join(format!("{acronym}.obj")))
    }

    /// Folder holding morphologies downloaded from `source`.
    pub fn morphology(&self, source: &str) -> Result<PathBuf> {
        self.folder(&["morphology", source])
    }

    /// Path of a cached morphology file.
    pub fn morphology_file(&self, source: &str, neuron_id: &str) -> Result<PathBuf> {
        Ok(self.morphology(source)?.join(format!("{neuron_id}.swc")))
    }

    /// Folder holding streamline JSON files.
    pub fn streamlines(&self) -> Result<PathBuf> {
        self.folder(&["streamlines"])
    }

    /// Path of a cached streamline file.
    pub fn streamlines_file(&self, experiment_id: u64) -> Result<PathBuf> {
        Ok(self.streamlines()?.join(format!("{experiment_id}.json")))
    }

    /// Folder for screenshots.
    pub fn screenshots(&self) -> Result<PathBuf> {
        self.folder(&["screenshots"])
    }

    /// Folder for videos.
    pub fn videos(&self) -> Result<PathBuf> {
        self.folder(&["videos"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_base(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("brainrender-paths-{tag}-{}", std::process::id()))
    }

    #[test]
    fn test_folders_created_on_demand() {
        let base = temp_base("ondemand");
        let paths = Paths::new(&base);
        assert!(!base.join("screenshots").exists());
        let shots = paths.screenshots().expect("create screenshots folder");
        assert!(shots.is_dir());
        let _ = fs::remove_dir_all(base);
    }

    #[test]
    fn test_layout() {
        let base = temp_base("layout");
        let paths = Paths::new(&base);
        let mesh = paths.mesh_file("allen_mouse_25um", "TH").expect("mesh path");
        assert_eq!(mesh, base.join("meshes").join("allen_mouse_25um").join("TH.obj"));
        let swc = paths.morphology_file("mouselight", "AA0001").expect("swc path");
        assert!(swc.ends_with("morphology/mouselight/AA0001.swc"));
        let sl = paths.streamlines_file(12345).expect("streamline path");
        assert!(sl.ends_with("streamlines/12345.json"));
        let _ = fs::remove_dir_all(base);
    }
}
