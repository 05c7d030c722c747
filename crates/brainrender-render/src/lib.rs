//! Rendering backend for brainrender-rs.
//!
//! This crate provides:
//! - the camera library, camera resolver and camera moves
//! - color maps and shading materials
//! - the [`RenderBackend`] interface and an offscreen software rasteriser
//! - a bitmap font for label text
//! - screenshot writing (raster and vector), HTML export and video encoders

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
// Pixel arithmetic converts between u32, usize, i64 and f32 throughout
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap
)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::many_single_char_names)]

pub mod backend;
pub mod camera;
pub mod color_maps;
pub mod error;
pub mod export;
pub mod font;
pub mod materials;
pub mod screenshot;
pub mod software;
pub mod vector;
pub mod video;

pub use backend::{Drawable, RenderBackend, SceneFrame};
pub use camera::{named_camera, resolve_camera, CameraArg, CameraParams, CAMERA_NAMES};
pub use color_maps::{color_map, map_color, ColorMap, ColorMapRegistry, DEFAULT_COLOR_MAP};
pub use error::{RenderError, RenderResult};
pub use export::{export_html, ExportPayload};
pub use materials::Material;
pub use screenshot::{
    check_format, save_image, save_to_buffer, screenshot_name, screenshot_path, ScreenshotError, SUPPORTED_FORMATS,
};
pub use software::{fit_camera, SoftwareBackend};
pub use vector::{write_eps, write_pdf, write_svg};
pub use video::{open_video_writer, FfmpegWriter, FrameDirWriter, GifWriter, VideoWriter};
