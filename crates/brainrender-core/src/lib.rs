//! Core abstractions for brainrender-rs.
//!
//! This crate provides the building blocks shared by every other crate:
//! - [`Mesh`] geometry with cutting, capping and ray queries
//! - [`Plane`], [`ScalarGrid`] and marching-cubes surfaces
//! - the [`AxisCorrection`] that maps atlas axes to display axes
//! - process-wide [`Settings`], cache [`Paths`] and file/network IO
//! - colour parsing through [`to_rgb`]

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Settings legitimately have many boolean flags
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
// Index and size conversions between u32, usize and f32 are pervasive in mesh code
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap
)]

pub mod color;
pub mod coordinates;
pub mod error;
pub mod grid;
pub mod io;
pub mod marching_cubes;
pub mod mesh;
pub mod paths;
pub mod plane;
pub mod settings;

pub use color::{to_rgb, ColorLike};
pub use coordinates::{AxisCorrection, CANONICAL_ORIENTATION};
pub use error::{BrainrenderError, Result};
pub use grid::ScalarGrid;
pub use mesh::{chain_segments, shapes, Mesh};
pub use paths::Paths;
pub use plane::Plane;
pub use settings::{load_settings, settings, update_settings, Settings, ShaderStyle};

// Re-export glam types for convenience
pub use glam::{DVec3, Mat4, Vec2, Vec3};
