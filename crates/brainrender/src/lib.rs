//! brainrender-rs: render brain atlases and the anatomical data registered
//! to them.
//!
//! A [`Scene`] holds an atlas and the actors drawn over it: brain regions,
//! cell positions, neurons, streamlines, volumes, rulers and planes. Scenes
//! can be sliced, rendered offscreen to screenshots, exported to HTML, or
//! animated into videos.
//!
//! # Quick Start
//!
//! ```no_run
//! use brainrender::*;
//!
//! fn main() -> Result<()> {
//!     let mut scene = Scene::new(SceneOptions::default())?;
//!
//!     // Thalamus and a few cells inside it
//!     scene.add_brain_region(&["TH"], &RegionOptions::default())?;
//!     let cells = vec![Vec3::new(6800.0, 4200.0, 5700.0), Vec3::new(6900.0, 4300.0, 5600.0)];
//!     scene.add(cells)?;
//!
//!     scene.slice("sagittal", None, true)?;
//!     scene.render(&RenderOptions::offscreen())?;
//!     scene.screenshot(Some("thalamus"), None)?;
//!     Ok(())
//! }
//! ```
//!
//! # Coordinates
//!
//! Actors are built in atlas space (µm). The first render moves them into
//! display space with the atlas' [`AxisCorrection`]; queries that take
//! coordinates, such as slicing planes, are always given in atlas space.
//!
//! # Animation
//!
//! - [`VideoMaker`] rotates the camera by a fixed step every frame
//! - [`Animation`] interpolates cameras and zoom between keyframes

// Geometry and pixel code converts between indices and coordinates
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
// `!(x > 0.0)` also rejects NaN
#![allow(clippy::neg_cmp_op_on_partial_ord)]

pub mod heatmap;
pub mod scene;
pub mod video;

pub use heatmap::{Heatmap, HeatmapOptions, HeatmapOrientation, HeatmapPosition};
pub use scene::{
    init_logging, ActorRef, Addable, RegionOptions, RenderOptions, Scene, SceneOptions, SliceTarget,
};
pub use video::{
    frame_count, Animation, CameraStep, FrameCallback, FrameParams, Frames, Keyframe, VideoMaker,
};

// Re-export core types
pub use brainrender_core::{
    load_settings, settings, shapes, to_rgb, update_settings, AxisCorrection, BrainrenderError, ColorLike,
    DVec3, Mat4, Mesh, Paths, Plane, Result, ScalarGrid, Settings, ShaderStyle, Vec2, Vec3,
};

// Re-export render types
pub use brainrender_render::{
    map_color, named_camera, resolve_camera, CameraArg, CameraParams, RenderBackend, SoftwareBackend,
    CAMERA_NAMES, DEFAULT_COLOR_MAP,
};

// Re-export actors
pub use brainrender_actors::{
    cylinder, cylinder_to_root, line, neuron, plane, point, points, points_density, ruler, ruler_from_surface,
    streamlines, volume, Actor, ActorId, BrClass, CylinderOptions, DensityOptions, LabelParams, LineOptions,
    Morphology, NeuronOptions, NeuronSource, PointOptions, PointsInput, PointsOptions, RulerOptions,
    SilhouetteParams, StreamlinesData, StreamlinesOptions, VolumeInput, VolumeMode, VolumeOptions,
};

// Re-export atlas types
pub use brainrender_atlas::{
    atlas_by_name, toy_acronyms, write_toy_atlas, Atlas, Hemisphere, PlaneOptions, ROOT, TOY_ATLAS,
};
