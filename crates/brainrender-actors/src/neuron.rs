//! Neuron actors built from morphologies or ready-made meshes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use brainrender_core::io::{data_extension, load_mesh};
use brainrender_core::{shapes, to_rgb, BrainrenderError, ColorLike, Mesh, Result};
use glam::Vec3;

use crate::actor::{Actor, BrClass};
use crate::morphology::{Morphology, NeuriteType};

/// Where a neuron comes from.
#[derive(Debug)]
pub enum NeuronSource {
    /// An `.swc` morphology or an `.obj` / `.ply` mesh.
    File(PathBuf),
    Morphology(Morphology),
    Mesh(Mesh),
    Actor(Actor),
}

impl From<PathBuf> for NeuronSource {
    fn from(path: PathBuf) -> Self {
        Self::File(path)
    }
}

impl From<&Path> for NeuronSource {
    fn from(path: &Path) -> Self {
        Self::File(path.to_path_buf())
    }
}

impl From<Morphology> for NeuronSource {
    fn from(morphology: Morphology) -> Self {
        Self::Morphology(morphology)
    }
}

impl From<Mesh> for NeuronSource {
    fn from(mesh: Mesh) -> Self {
        Self::Mesh(mesh)
    }
}

impl From<Actor> for NeuronSource {
    fn from(actor: Actor) -> Self {
        Self::Actor(actor)
    }
}

/// Styling for [`neuron`].
#[derive(Debug, Clone)]
pub struct NeuronOptions {
    pub soma_radius: f32,
    pub neurite_radius: f32,
    pub soma_color: ColorLike,
    pub axon_color: ColorLike,
    pub dendrites_color: ColorLike,
    pub alpha: f32,
    /// Sides of the neurite tubes.
    pub sides: u32,
    pub name: Option<String>,
}

impl Default for NeuronOptions {
    fn default() -> Self {
        Self {
            soma_radius: 15.0,
            neurite_radius: 8.0,
            soma_color: "salmon".into(),
            axon_color: "salmon".into(),
            dendrites_color: "salmon".into(),
            alpha: 1.0,
            sides: 6,
            name: None,
        }
    }
}

/// Neuron meshes already built from files, keyed by path.
#[derive(Debug, Default)]
pub struct NeuronCache {
    meshes: HashMap<PathBuf, Mesh>,
}

impl NeuronCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn clear(&mut self) {
        self.meshes.clear();
    }
}

fn colored(mut mesh: Mesh, color: Vec3) -> Result<Mesh> {
    let n = mesh.num_vertices();
    mesh.set_color(color);
    // per-part colours survive merging only as vertex colours
    mesh.set_vertex_colors(vec![color; n])?;
    Ok(mesh)
}

/// Soma sphere, axon tubes and merged dendrite tubes in one mesh, coloured
/// per part.
pub fn morphology_mesh(morphology: &Morphology, options: &NeuronOptions) -> Result<Mesh> {
    let soma_color = to_rgb(&options.soma_color)?;
    let axon_color = to_rgb(&options.axon_color)?;
    let dendrites_color = to_rgb(&options.dendrites_color)?;

    let mut parts = vec![colored(
        shapes::sphere(morphology.soma_position(), options.soma_radius, 12),
        soma_color,
    )?];
    for branch in morphology.branches() {
        let tube = shapes::tube(&branch.points, options.neurite_radius, options.sides);
        if tube.is_empty() {
            continue;
        }
        let color = match branch.kind {
            NeuriteType::Axon | NeuriteType::Undefined => axon_color,
            NeuriteType::BasalDendrite | NeuriteType::ApicalDendrite => dendrites_color,
            NeuriteType::Soma => soma_color,
        };
        parts.push(colored(tube, color)?);
    }
    let mut mesh = Mesh::merge(&parts);
    mesh.set_alpha(options.alpha);
    Ok(mesh)
}

fn mesh_from_file(path: &Path, options: &NeuronOptions) -> Result<Mesh> {
    match data_extension(path).as_deref() {
        Some("swc") => morphology_mesh(&Morphology::from_file(path)?, options),
        Some("obj" | "ply") => {
            let mesh = load_mesh(path)?;
            Ok(mesh.with_color(to_rgb(&options.soma_color)?))
        }
        _ => Err(BrainrenderError::UnsupportedFormat(format!(
            "cannot load a neuron from {}",
            path.display()
        ))),
    }
}

/// Builds a neuron actor.
///
/// Files are parsed once per `cache`; later requests for the same path reuse
/// the stored mesh.
pub fn neuron(source: impl Into<NeuronSource>, options: &NeuronOptions, cache: Option<&mut NeuronCache>) -> Result<Actor> {
    let (mesh, default_name) = match source.into() {
        NeuronSource::File(path) => {
            let name = path
                .file_stem()
                .map_or_else(|| "Neuron".to_string(), |s| s.to_string_lossy().into_owned());
            let mesh = match cache {
                Some(cache) => {
                    if let Some(mesh) = cache.meshes.get(&path) {
                        log::debug!("neuron cache hit for {}", path.display());
                        mesh.clone()
                    } else {
                        let mesh = mesh_from_file(&path, options)?;
                        cache.meshes.insert(path, mesh.clone());
                        mesh
                    }
                }
                None => mesh_from_file(&path, options)?,
            };
            (mesh, name)
        }
        NeuronSource::Morphology(m) => (morphology_mesh(&m, options)?, "Neuron".to_string()),
        NeuronSource::Mesh(mesh) => (mesh, "Neuron".to_string()),
        NeuronSource::Actor(actor) => {
            let name = actor.name().to_string();
            (actor.mesh().clone(), name)
        }
    };
    if mesh.is_empty() {
        return Err(BrainrenderError::invalid("neuron has no geometry"));
    }
    let name = options.name.clone().unwrap_or(default_name);
    Ok(Actor::new(mesh, name, BrClass::Neuron))
}
