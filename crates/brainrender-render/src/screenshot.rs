//! Screenshot naming and image writing.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use brainrender_core::BrainrenderError;
use chrono::{DateTime, Utc};
use image::RgbaImage;

use crate::vector::{write_eps, write_pdf, write_svg};

/// Prefix of screenshots saved without an explicit name.
pub const DEFAULT_PREFIX: &str = "screenshot";

/// Default screenshot name: `<prefix>_<YYYYMMDD_HHMMSS>`.
pub fn screenshot_name(prefix: &str, time: DateTime<Utc>) -> String {
    format!("{prefix}_{}", time.format("%Y%m%d_%H%M%S"))
}

/// Resolves the output path of a screenshot inside `folder`.
///
/// Without `name` a timestamped name is used. Names without an extension get
/// `.png`; `.tif`/`.tiff` are coerced to `.png`.
pub fn screenshot_path(folder: &Path, name: Option<&str>, time: DateTime<Utc>) -> PathBuf {
    let name = name.map_or_else(|| screenshot_name(DEFAULT_PREFIX, time), str::to_string);
    let mut path = folder.join(name);
    match extension(&path).as_deref() {
        None | Some("") => {
            path.set_extension("png");
        }
        Some("tif" | "tiff") => {
            log::warn!("tiff screenshots are not supported, saving {} as png", path.display());
            path.set_extension("png");
        }
        Some(_) => {}
    }
    path
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
}

/// Extensions [`save_image`] can write.
pub const SUPPORTED_FORMATS: [&str; 7] = ["png", "jpg", "jpeg", "bmp", "svg", "eps", "pdf"];

/// Fails with `UnsupportedFormat` unless [`save_image`] can write `path`.
pub fn check_format(path: &Path) -> Result<(), ScreenshotError> {
    let extension = extension(path).unwrap_or_default();
    if SUPPORTED_FORMATS.contains(&extension.as_str()) {
        Ok(())
    } else {
        Err(ScreenshotError::UnsupportedFormat(extension))
    }
}

/// Saves an RGBA image, choosing the encoder from the file extension.
///
/// Raster formats are `.png`, `.jpg`/`.jpeg` and `.bmp`. `.svg`, `.eps` and
/// `.pdf` wrap the pixels in the matching vector container.
pub fn save_image(path: &Path, image: &RgbaImage) -> Result<(), ScreenshotError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(ScreenshotError::InvalidImageData);
    }
    check_format(path)?;
    let extension = extension(path).unwrap_or_default();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    match extension.as_str() {
        "png" => {
            image.save_with_format(path, image::ImageFormat::Png)?;
        }
        "jpg" | "jpeg" => {
            // Convert to RGB for JPEG (no alpha)
            let rgb_img = image::DynamicImage::ImageRgba8(image.clone()).to_rgb8();
            rgb_img.save_with_format(path, image::ImageFormat::Jpeg)?;
        }
        "bmp" => {
            image.save_with_format(path, image::ImageFormat::Bmp)?;
        }
        vector => {
            let mut out = BufWriter::new(File::create(path)?);
            match vector {
                "svg" => write_svg(&mut out, image)?,
                "eps" => write_eps(&mut out, image)?,
                _ => write_pdf(&mut out, image)?,
            }
            out.flush()?;
        }
    }

    Ok(())
}

/// Encodes an RGBA image as PNG in memory.
pub fn save_to_buffer(image: &RgbaImage) -> Result<Vec<u8>, ScreenshotError> {
    let mut buffer = std::io::Cursor::new(Vec::new());
    image.write_to(&mut buffer, image::ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

/// Error type for screenshot operations.
#[derive(Debug, thiserror::Error)]
pub enum ScreenshotError {
    #[error("Failed to save image: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Image encoding error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid image data")]
    InvalidImageData,
}

impl From<ScreenshotError> for BrainrenderError {
    fn from(err: ScreenshotError) -> Self {
        match err {
            ScreenshotError::IoError(inner) => BrainrenderError::Io(inner),
            ScreenshotError::UnsupportedFormat(format) => {
                BrainrenderError::UnsupportedFormat(format!("screenshot format '{format}'"))
            }
            other => BrainrenderError::backend(other),
        }
    }
}
