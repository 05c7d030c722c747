//! File and network helpers: JSON, numpy arrays, mesh files, downloads.

mod net;
pub mod npy;

pub use net::{
    connected_to_internet, download_file, fail_on_no_connection, http_get, DEFAULT_PROBE_URL,
    PROBE_TIMEOUT,
};
pub use npy::{parse_npy, read_npy, write_npy, NpyArray, NpyElement};

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use glam::Vec3;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{BrainrenderError, Result};
use crate::mesh::Mesh;

pub(crate) fn is_gzipped(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

/// Lowercase extension, looking through a trailing `.gz`.
pub fn data_extension(path: &Path) -> Option<String> {
    let stem_path;
    let path = if is_gzipped(path) {
        stem_path = path.with_extension("");
        stem_path.as_path()
    } else {
        path
    };
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}

/// Writes `bytes` to a temporary sibling file and renames it over `path`, so
/// concurrent readers never observe a partial file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(format!(".tmp-{}", std::process::id()));
    let tmp = path.with_file_name(tmp_name);
    {
        let mut file = BufWriter::new(File::create(&tmp)?);
        file.write_all(bytes)?;
        file.flush()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Reads a JSON file, gunzipping it when the path ends in `.gz`.
pub fn load_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(BrainrenderError::ResourceMissing(path.to_path_buf()));
    }
    let reader = BufReader::new(File::open(path)?);
    if is_gzipped(path) {
        Ok(serde_json::from_reader(BufReader::new(GzDecoder::new(reader)))?)
    } else {
        Ok(serde_json::from_reader(reader)?)
    }
}

/// Writes a JSON file atomically, gzipped when the path ends in `.gz`.
pub fn save_json<T: Serialize + ?Sized>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let path = path.as_ref();
    let text = serde_json::to_vec_pretty(value)?;
    if is_gzipped(path) {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&text)?;
        write_atomic(path, &encoder.finish()?)
    } else {
        write_atomic(path, &text)
    }
}

/// Decompresses a gzip byte buffer.
pub fn gunzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(bytes).read_to_end(&mut out)?;
    Ok(out)
}

/// Immediate subdirectories of `path`, sorted by name.
pub fn list_subdirs(path: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Loads a triangle mesh from an `.obj` or `.ply` file.
pub fn load_mesh(path: impl AsRef<Path>) -> Result<Mesh> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(BrainrenderError::ResourceMissing(path.to_path_buf()));
    }
    match data_extension(path).as_deref() {
        Some("obj") => load_obj(path),
        Some("ply") => load_ply(path),
        other => Err(BrainrenderError::UnsupportedFormat(format!(
            "mesh file extension {:?} ({})",
            other.unwrap_or(""),
            path.display()
        ))),
    }
}

fn load_obj(path: &Path) -> Result<Mesh> {
    let (models, _materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
    )
    .map_err(|err| BrainrenderError::invalid(format!("{}: {err}", path.display())))?;

    let mut vertices = Vec::new();
    let mut triangles = Vec::new();
    for model in models {
        let mesh = model.mesh;
        let offset = vertices.len() as u32;
        vertices.extend(
            mesh.positions
                .chunks_exact(3)
                .map(|p| Vec3::new(p[0], p[1], p[2])),
        );
        triangles.extend(
            mesh.indices
                .chunks_exact(3)
                .map(|t| [t[0] + offset, t[1] + offset, t[2] + offset]),
        );
    }
    Ok(Mesh::new(vertices, triangles))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn load_ply(path: &Path) -> Result<Mesh> {
    use ply_rs::parser::Parser;
    use ply_rs::ply::{DefaultElement, Property};

    fn scalar(property: Option<&Property>) -> Option<f32> {
        Some(match property? {
            Property::Float(v) => *v,
            Property::Double(v) => *v as f32,
            Property::Int(v) => *v as f32,
            Property::UInt(v) => *v as f32,
            Property::Short(v) => f32::from(*v),
            Property::UShort(v) => f32::from(*v),
            Property::Char(v) => f32::from(*v),
            Property::UChar(v) => f32::from(*v),
            _ => return None,
        })
    }

    fn indices(property: &Property) -> Option<Vec<u32>> {
        Some(match property {
            Property::ListInt(v) => v.iter().map(|&i| i as u32).collect(),
            Property::ListUInt(v) => v.clone(),
            Property::ListShort(v) => v.iter().map(|&i| i as u32).collect(),
            Property::ListUShort(v) => v.iter().map(|&i| u32::from(i)).collect(),
            Property::ListChar(v) => v.iter().map(|&i| i as u32).collect(),
            Property::ListUChar(v) => v.iter().map(|&i| u32::from(i)).collect(),
            _ => return None,
        })
    }

    let malformed = |what: &str| BrainrenderError::invalid(format!("{}: {what}", path.display()));
    let mut reader = BufReader::new(File::open(path)?);
    let ply = Parser::<DefaultElement>::new()
        .read_ply(&mut reader)
        .map_err(|err| malformed(&err.to_string()))?;

    let vertices = ply
        .payload
        .get("vertex")
        .ok_or_else(|| malformed("no vertex element"))?
        .iter()
        .map(|v| {
            Some(Vec3::new(
                scalar(v.get("x"))?,
                scalar(v.get("y"))?,
                scalar(v.get("z"))?,
            ))
        })
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| malformed("vertex without x/y/z"))?;

    let mut triangles = Vec::new();
    for face in ply.payload.get("face").map(Vec::as_slice).unwrap_or_default() {
        let list = face
            .get("vertex_indices")
            .or_else(|| face.get("vertex_index"))
            .and_then(indices)
            .ok_or_else(|| malformed("face without vertex indices"))?;
        for k in 1..list.len().saturating_sub(1) {
            triangles.push([list[0], list[k], list[k + 1]]);
        }
    }
    let n = vertices.len() as u32;
    if triangles.iter().flatten().any(|&i| i >= n) {
        return Err(malformed("face index out of range"));
    }
    Ok(Mesh::new(vertices, triangles))
}

/// Writes the triangles of `mesh` as a Wavefront OBJ file.
pub fn write_obj(path: impl AsRef<Path>, mesh: &Mesh) -> Result<()> {
    let mut text = String::with_capacity(mesh.num_vertices() * 32 + mesh.num_triangles() * 24);
    for p in mesh.points() {
        text.push_str(&format!("v {} {} {}\n", p.x, p.y, p.z));
    }
    for t in mesh.faces() {
        text.push_str(&format!("f {} {} {}\n", t[0] + 1, t[1] + 1, t[2] + 1));
    }
    write_atomic(path.as_ref(), text.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::shapes;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("brainrender-io-{tag}-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("temp dir");
        dir
    }

    #[test]
    fn test_obj_roundtrip() {
        let dir = temp_dir("obj");
        let sphere = shapes::sphere(Vec3::new(1.0, 2.0, 3.0), 4.0, 8);
        let path = dir.join("sphere.obj");
        write_obj(&path, &sphere).expect("write obj");
        let loaded = load_mesh(&path).expect("load obj");
        assert_eq!(loaded.num_vertices(), sphere.num_vertices());
        assert_eq!(loaded.num_triangles(), sphere.num_triangles());
        assert!((loaded.signed_volume() - sphere.signed_volume()).abs() < 1e-2);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_load_ply() {
        let dir = temp_dir("ply");
        let path = dir.join("quad.ply");
        let text = "ply\nformat ascii 1.0\nelement vertex 4\nproperty float x\nproperty float y\nproperty float z\nelement face 1\nproperty list uchar int vertex_indices\nend_header\n0 0 0\n1 0 0\n1 1 0\n0 1 0\n4 0 1 2 3\n";
        fs::write(&path, text).expect("write ply");
        let mesh = load_mesh(&path).expect("load ply");
        assert_eq!(mesh.num_vertices(), 4);
        assert_eq!(mesh.faces(), &[[0, 1, 2], [0, 2, 3]]);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_missing_and_unsupported() {
        let dir = temp_dir("missing");
        assert!(matches!(
            load_mesh(dir.join("nope.obj")),
            Err(BrainrenderError::ResourceMissing(_))
        ));
        let stl = dir.join("mesh.stl");
        fs::write(&stl, "solid").expect("write");
        assert!(matches!(load_mesh(&stl), Err(BrainrenderError::UnsupportedFormat(_))));
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_json_gz() {
        let dir = temp_dir("json");
        let path = dir.join("values.json.gz");
        save_json(&path, &vec![1, 2, 3]).expect("save");
        let back: Vec<i32> = load_json(&path).expect("load");
        assert_eq!(back, vec![1, 2, 3]);
        assert_eq!(data_extension(&path).as_deref(), Some("json"));
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_list_subdirs() {
        let dir = temp_dir("subdirs");
        fs::create_dir_all(dir.join("b")).expect("mkdir");
        fs::create_dir_all(dir.join("a")).expect("mkdir");
        fs::write(dir.join("file.txt"), "x").expect("write");
        let subdirs = list_subdirs(&dir).expect("list");
        assert_eq!(subdirs, vec![dir.join("a"), dir.join("b")]);
        let _ = fs::remove_dir_all(dir);
    }
}
