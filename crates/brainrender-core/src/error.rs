//! Error types for brainrender-rs.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for brainrender-rs operations.
#[derive(Error, Debug)]
pub enum BrainrenderError {
    /// Malformed user input: wrong shapes, mismatched lengths, unknown names.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A mesh, morphology or data file was not found on disk.
    #[error("resource missing: {}", .0.display())]
    ResourceMissing(PathBuf),

    /// No internet connection, or an HTTP request failed.
    #[error("remote unavailable: {0}")]
    RemoteUnavailable(String),

    /// The file extension or data layout is not one the engine parses.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Failure raised by the rendering backend, kept as the source error.
    #[error("backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),

    /// An internal invariant was violated.
    #[error("logic error: {0}")]
    Logic(String),

    /// Data size mismatch.
    #[error("data size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BrainrenderError {
    /// Shorthand for [`BrainrenderError::InvalidInput`].
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Wraps a backend error without flattening it.
    pub fn backend(err: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>) -> Self {
        Self::Backend(err.into())
    }
}

/// A specialized Result type for brainrender-rs operations.
pub type Result<T> = std::result::Result<T, BrainrenderError>;
