//! Actor implementations for brainrender-rs.
//!
//! This crate provides the scene node type and the factories that build it:
//! - [`Actor`], its identity, class and deferred label/silhouette requests
//! - points, density clouds, lines, cylinders, rulers and planes
//! - neurons from SWC morphologies
//! - streamlines from tracing experiments
//! - volumes from 3-D scalar grids

// Geometry code intentionally uses casts for indices and coordinates
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
// `!(x > 0.0)` also rejects NaN
#![allow(clippy::neg_cmp_op_on_partial_ord)]

pub mod actor;
pub mod morphology;
pub mod neuron;
pub mod primitives;
pub mod streamlines;
pub mod volume;

pub use actor::{Actor, ActorId, BrClass, LabelParams, SilhouetteParams};
pub use morphology::{Branch, Morphology, NeuriteType, SwcSample};
pub use neuron::{morphology_mesh, neuron, NeuronCache, NeuronOptions, NeuronSource};
pub use primitives::{
    cylinder, cylinder_to_root, density_grid, format_significant, line, load_points, plane, point,
    points, points_density, ruler, ruler_from_surface, CylinderOptions, DensityOptions, LineOptions,
    PointColors, PointOptions, PointsInput, PointsOptions, RulerOptions,
};
pub use streamlines::{download_streamlines, streamlines, StreamlinesData, StreamlinesOptions, STREAMLINES_URL};
pub use volume::{extract_surface, load_grid, volume, VolumeInput, VolumeMode, VolumeOptions};
