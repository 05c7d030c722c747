//! Projection streamlines from anterograde tracing experiments.
//!
//! The JSON holds a `lines` entry, either a list of polylines or an object
//! whose values are polylines, each a list of `{"x", "y", "z"}` points, and an
//! optional `injection_sites` list of points.

use std::fs;
use std::path::{Path, PathBuf};

use brainrender_core::io::{data_extension, download_file, fail_on_no_connection, gunzip};
use brainrender_core::{shapes, to_rgb, BrainrenderError, ColorLike, Mesh, Paths, Result};
use glam::Vec3;
use serde::Deserialize;
use serde_json::Value;

use crate::actor::{Actor, BrClass};

/// Remote store of precomputed streamlines, one gzipped JSON per experiment.
pub const STREAMLINES_URL: &str = "https://neuroinformatics.nl/HBP/allen-connectivity-viewer/json";

#[derive(Debug, Clone, Copy, Deserialize)]
struct JsonPoint {
    x: f32,
    y: f32,
    z: f32,
}

impl From<JsonPoint> for Vec3 {
    fn from(p: JsonPoint) -> Self {
        Vec3::new(p.x, p.y, p.z)
    }
}

/// Parsed streamline data, in atlas micrometres.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamlinesData {
    pub lines: Vec<Vec<Vec3>>,
    pub injection_sites: Vec<Vec3>,
}

fn parse_polyline(value: &Value) -> Result<Vec<Vec3>> {
    let points: Vec<JsonPoint> = serde_json::from_value(value.clone())
        .map_err(|err| BrainrenderError::invalid(format!("malformed streamline: {err}")))?;
    Ok(points.into_iter().map(Vec3::from).collect())
}

impl StreamlinesData {
    /// Interprets a decoded JSON document.
    pub fn from_json(value: &Value) -> Result<Self> {
        let lines = match value.get("lines") {
            Some(Value::Array(items)) => items.iter().map(parse_polyline).collect::<Result<Vec<_>>>()?,
            Some(Value::Object(map)) => {
                let mut entries: Vec<(&String, &Value)> = map.iter().collect();
                // numeric keys in numeric order
                entries.sort_by(|a, b| match (a.0.parse::<u64>(), b.0.parse::<u64>()) {
                    (Ok(x), Ok(y)) => x.cmp(&y),
                    _ => a.0.cmp(b.0),
                });
                entries
                    .into_iter()
                    .map(|(_, v)| parse_polyline(v))
                    .collect::<Result<Vec<_>>>()?
            }
            Some(_) => return Err(BrainrenderError::invalid("'lines' must be a list or an object")),
            None => return Err(BrainrenderError::invalid("streamlines JSON has no 'lines' entry")),
        };
        let injection_sites = match value.get("injection_sites") {
            Some(sites) => parse_polyline(sites)?,
            None => Vec::new(),
        };
        Ok(Self { lines, injection_sites })
    }

    /// Reads a `.json` or `.json.gz` file.
    pub fn from_file(path: &Path) -> Result<Self> {
        if data_extension(path).as_deref() != Some("json") {
            return Err(BrainrenderError::UnsupportedFormat(format!(
                "streamlines must be .json or .json.gz, got {}",
                path.display()
            )));
        }
        if !path.exists() {
            return Err(BrainrenderError::ResourceMissing(path.to_path_buf()));
        }
        let mut bytes = fs::read(path)?;
        if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("gz")) {
            bytes = gunzip(&bytes)?;
        }
        let value: Value = serde_json::from_slice(&bytes)?;
        Self::from_json(&value)
    }
}

/// Fetches the streamlines of an experiment into the cache folder, unless
/// already there, and returns the cached path.
pub fn download_streamlines(experiment_id: u64, paths: &Paths) -> Result<PathBuf> {
    let dest = paths.streamlines_file(experiment_id)?;
    if dest.exists() {
        log::debug!("streamlines {experiment_id} already cached");
        return Ok(dest);
    }
    let url = format!("{STREAMLINES_URL}/streamlines_{experiment_id}.json.gz");
    fail_on_no_connection(None)?;
    let gz = dest.with_extension("json.gz");
    download_file(&url, &gz)?;
    let json = gunzip(&fs::read(&gz)?)?;
    brainrender_core::io::write_atomic(&dest, &json)?;
    fs::remove_file(&gz)?;
    Ok(dest)
}

/// Styling for [`streamlines`].
#[derive(Debug, Clone)]
pub struct StreamlinesOptions {
    pub radius: f32,
    pub color: ColorLike,
    pub alpha: f32,
    pub show_injection: bool,
    pub injection_radius: f32,
    pub sides: u32,
    pub name: Option<String>,
}

impl Default for StreamlinesOptions {
    fn default() -> Self {
        Self {
            radius: 10.0,
            color: "salmon".into(),
            alpha: 1.0,
            show_injection: true,
            injection_radius: 120.0,
            sides: 6,
            name: None,
        }
    }
}

/// Tubes along every streamline, plus a sphere at each injection site.
///
/// Polylines with fewer than two distinct points are skipped.
pub fn streamlines(data: &StreamlinesData, options: &StreamlinesOptions) -> Result<Actor> {
    if !(options.radius > 0.0) {
        return Err(BrainrenderError::invalid(format!("radius must be positive, got {}", options.radius)));
    }
    let mut parts: Vec<Mesh> = data
        .lines
        .iter()
        .map(|line| shapes::tube(line, options.radius, options.sides))
        .filter(|tube| !tube.is_empty())
        .collect();
    let skipped = data.lines.len() - parts.len();
    if skipped > 0 {
        log::debug!("skipped {skipped} degenerate streamlines");
    }
    if options.show_injection {
        parts.extend(
            data.injection_sites
                .iter()
                .map(|&site| shapes::sphere(site, options.injection_radius, 12)),
        );
    }
    if parts.is_empty() {
        return Err(BrainrenderError::invalid("no streamline has two distinct points"));
    }
    let mesh = Mesh::merge(&parts)
        .with_color(to_rgb(&options.color)?)
        .with_alpha(options.alpha);
    let name = options.name.clone().unwrap_or_else(|| "Streamlines".to_string());
    Ok(Actor::new(mesh, name, BrClass::Streamlines))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "lines": [
                [{"x": 0, "y": 0, "z": 0}, {"x": 100, "y": 0, "z": 0}, {"x": 200, "y": 50, "z": 0}],
                [{"x": 5, "y": 5, "z": 5}]
            ],
            "injection_sites": [{"x": 0, "y": 0, "z": 0}]
        })
    }

    #[test]
    fn test_parse_list_and_map() {
        let data = StreamlinesData::from_json(&sample()).expect("list form");
        assert_eq!(data.lines.len(), 2);
        assert_eq!(data.injection_sites, vec![Vec3::ZERO]);

        let mapped = json!({
            "lines": {
                "10": [{"x": 3, "y": 0, "z": 0}],
                "2": [{"x": 1, "y": 0, "z": 0}]
            }
        });
        let data = StreamlinesData::from_json(&mapped).expect("map form");
        assert_eq!(data.lines[0], vec![Vec3::X]);
        assert!(data.injection_sites.is_empty());

        assert!(StreamlinesData::from_json(&json!({"lines": 3})).is_err());
        assert!(StreamlinesData::from_json(&json!({})).is_err());
    }

    #[test]
    fn test_streamline_tubes() {
        let data = StreamlinesData::from_json(&sample()).expect("parse");
        let actor = streamlines(&data, &StreamlinesOptions::default()).expect("actor");
        assert!(actor.mesh().num_triangles() > 0);
        assert_eq!(actor.br_class(), BrClass::Streamlines);

        let degenerate = StreamlinesData {
            lines: vec![vec![Vec3::ONE, Vec3::ONE]],
            injection_sites: Vec::new(),
        };
        assert!(streamlines(&degenerate, &StreamlinesOptions::default()).is_err());
    }

    #[test]
    fn test_from_gzipped_file() {
        let dir = std::env::temp_dir().join(format!("brainrender-streamlines-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("dir");
        let path = dir.join("streamlines_1.json.gz");
        let bytes = serde_json::to_vec(&sample()).expect("encode");
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        std::io::Write::write_all(&mut encoder, &bytes).expect("gzip");
        fs::write(&path, encoder.finish().expect("finish")).expect("write");
        let data = StreamlinesData::from_file(&path).expect("read gz");
        assert_eq!(data.lines.len(), 2);
        assert!(matches!(
            StreamlinesData::from_file(&dir.join("lines.csv")),
            Err(BrainrenderError::UnsupportedFormat(_))
        ));
        let _ = fs::remove_dir_all(dir);
    }
}
