//! Rendering error types.

use brainrender_core::BrainrenderError;
use thiserror::Error;

/// Errors that can occur during rendering operations.
#[derive(Error, Debug)]
pub enum RenderError {
    /// The backend was closed and cannot draw anymore.
    #[error("rendering backend has been closed")]
    Closed,

    /// Nothing has been drawn yet.
    #[error("no frame has been rendered yet")]
    NoFrame,

    /// Image dimensions are zero or too large.
    #[error("invalid image size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    /// The requested output format cannot be produced.
    #[error("unsupported output format: {0}")]
    UnsupportedFormat(String),

    /// A video encoder failed.
    #[error("video encoding failed: {0}")]
    Encoding(String),

    /// Image encoding error.
    #[error("image encoding error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error raised by shared core code.
    #[error(transparent)]
    Core(#[from] BrainrenderError),
}

impl From<RenderError> for BrainrenderError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::Core(inner) => inner,
            RenderError::UnsupportedFormat(format) => BrainrenderError::UnsupportedFormat(format),
            other => BrainrenderError::backend(other),
        }
    }
}

/// A specialized Result type for rendering operations.
pub type RenderResult<T> = std::result::Result<T, RenderError>;
