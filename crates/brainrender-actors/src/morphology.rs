//! SWC neuron morphologies.
//!
//! Each non-comment line of an SWC file holds seven whitespace separated
//! fields: `id type x y z radius parent`, with `parent == -1` for roots.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use brainrender_core::io::data_extension;
use brainrender_core::{BrainrenderError, Result};
use glam::Vec3;

/// SWC structure identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NeuriteType {
    Soma,
    Axon,
    BasalDendrite,
    ApicalDendrite,
    Undefined,
}

impl NeuriteType {
    /// Maps an SWC type code; codes other than 1 to 4 are undefined.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Soma,
            2 => Self::Axon,
            3 => Self::BasalDendrite,
            4 => Self::ApicalDendrite,
            _ => Self::Undefined,
        }
    }

    pub fn is_dendrite(self) -> bool {
        matches!(self, Self::BasalDendrite | Self::ApicalDendrite)
    }
}

/// One SWC line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwcSample {
    pub id: i64,
    pub kind: NeuriteType,
    pub position: Vec3,
    pub radius: f32,
    pub parent: i64,
}

/// An unbranched run of samples, from a root or branch point to a tip or the
/// next branch point (both included).
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub kind: NeuriteType,
    pub points: Vec<Vec3>,
}

/// A parsed reconstruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Morphology {
    samples: Vec<SwcSample>,
}

fn parse_field<T: std::str::FromStr>(field: &str, line_no: usize, what: &str) -> Result<T> {
    field
        .parse()
        .map_err(|_| BrainrenderError::invalid(format!("line {line_no}: invalid {what} '{field}'")))
}

impl Morphology {
    /// Parses SWC text.
    pub fn parse(text: &str) -> Result<Self> {
        let mut samples = Vec::new();
        let mut seen = HashSet::new();
        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 7 {
                return Err(BrainrenderError::invalid(format!(
                    "line {line_no}: expected 7 fields, got {}",
                    fields.len()
                )));
            }
            let id: i64 = parse_field(fields[0], line_no, "id")?;
            // type codes are sometimes written as floats
            let code: f64 = parse_field(fields[1], line_no, "type")?;
            let x: f32 = parse_field(fields[2], line_no, "x")?;
            let y: f32 = parse_field(fields[3], line_no, "y")?;
            let z: f32 = parse_field(fields[4], line_no, "z")?;
            let radius: f32 = parse_field(fields[5], line_no, "radius")?;
            let parent: i64 = parse_field(fields[6], line_no, "parent")?;
            if !seen.insert(id) {
                return Err(BrainrenderError::invalid(format!("line {line_no}: duplicate sample id {id}")));
            }
            let position = Vec3::new(x, y, z);
            if !position.is_finite() {
                return Err(BrainrenderError::invalid(format!("line {line_no}: non-finite coordinates")));
            }
            samples.push(SwcSample {
                id,
                kind: NeuriteType::from_code(code as i64),
                position,
                radius,
                parent,
            });
        }
        if samples.is_empty() {
            return Err(BrainrenderError::invalid("morphology has no samples"));
        }
        if let Some(orphan) = samples
            .iter()
            .find(|s| s.parent != -1 && !seen.contains(&s.parent))
        {
            return Err(BrainrenderError::invalid(format!(
                "sample {} references missing parent {}",
                orphan.id, orphan.parent
            )));
        }
        Ok(Self { samples })
    }

    /// Reads an `.swc` file.
    pub fn from_file(path: &Path) -> Result<Self> {
        if data_extension(path).as_deref() != Some("swc") {
            return Err(BrainrenderError::UnsupportedFormat(format!(
                "expected an .swc morphology, got {}",
                path.display()
            )));
        }
        if !path.exists() {
            return Err(BrainrenderError::ResourceMissing(path.to_path_buf()));
        }
        let text = fs::read_to_string(path)?;
        log::debug!("parsing morphology {}", path.display());
        Self::parse(&text)
    }

    pub fn samples(&self) -> &[SwcSample] {
        &self.samples
    }

    /// Mean position of the soma samples, else the first root.
    pub fn soma_position(&self) -> Vec3 {
        let soma: Vec<Vec3> = self
            .samples
            .iter()
            .filter(|s| s.kind == NeuriteType::Soma)
            .map(|s| s.position)
            .collect();
        if soma.is_empty() {
            self.samples
                .iter()
                .find(|s| s.parent == -1)
                .unwrap_or(&self.samples[0])
                .position
        } else {
            soma.iter().copied().sum::<Vec3>() / soma.len() as f32
        }
    }

    /// Applies `f` to every sample position.
    pub fn map_positions(&mut self, mut f: impl FnMut(Vec3) -> Vec3) {
        for s in &mut self.samples {
            s.position = f(s.position);
        }
    }

    /// Splits the tree into unbranched neurite segments. A segment also ends
    /// where the neurite type changes. Soma to soma connections are left out.
    pub fn branches(&self) -> Vec<Branch> {
        let index: HashMap<i64, usize> = self
            .samples
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id, i))
            .collect();
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); self.samples.len()];
        for (i, s) in self.samples.iter().enumerate() {
            if let Some(&p) = index.get(&s.parent) {
                children[p].push(i);
            }
        }

        let mut branches = Vec::new();
        let mut visited = vec![false; self.samples.len()];
        let mut starts: Vec<usize> = self
            .samples
            .iter()
            .enumerate()
            .filter(|(_, s)| s.parent == -1)
            .map(|(i, _)| i)
            .collect();
        while let Some(start) = starts.pop() {
            if std::mem::replace(&mut visited[start], true) {
                continue;
            }
            for &first in &children[start] {
                let kind = self.samples[first].kind;
                let mut points = vec![self.samples[start].position];
                let mut current = first;
                loop {
                    points.push(self.samples[current].position);
                    let single = children[current].len() == 1
                        && self.samples[children[current][0]].kind == kind;
                    if single && !visited[current] {
                        visited[current] = true;
                        current = children[current][0];
                    } else {
                        break;
                    }
                }
                if !children[current].is_empty() {
                    starts.push(current);
                }
                let soma_link = kind == NeuriteType::Soma && self.samples[start].kind == NeuriteType::Soma;
                if !soma_link {
                    branches.push(Branch { kind, points });
                }
            }
        }
        branches
    }
}
