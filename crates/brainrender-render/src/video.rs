//! Video encoders.
//!
//! Frames arrive one at a time as RGBA images. `gif` is encoded in process,
//! `frames` writes numbered PNG files, and every other format is piped as raw
//! RGBA to an external `ffmpeg` executable.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, RgbaImage};

use crate::error::{RenderError, RenderResult};

/// Consumes rendered frames and produces a video file.
pub trait VideoWriter {
    /// Appends one frame.
    fn add_frame(&mut self, frame: &RgbaImage) -> RenderResult<()>;

    /// Number of frames appended so far.
    fn frames_written(&self) -> usize;

    /// Flushes the encoder and returns the output path.
    fn finish(self: Box<Self>) -> RenderResult<PathBuf>;
}

/// Opens a writer for `path`, choosing the encoder from `format`.
pub fn open_video_writer(path: &Path, format: &str, fps: u32) -> RenderResult<Box<dyn VideoWriter>> {
    if fps == 0 {
        return Err(RenderError::Encoding("fps must be positive".to_string()));
    }
    match format.to_ascii_lowercase().as_str() {
        "gif" => Ok(Box::new(GifWriter::create(path, fps)?)),
        "frames" => Ok(Box::new(FrameDirWriter::create(path)?)),
        _ => Ok(Box::new(FfmpegWriter::new(path, fps))),
    }
}

/// Animated GIF encoder, looping forever.
pub struct GifWriter {
    path: PathBuf,
    encoder: GifEncoder<BufWriter<File>>,
    delay: Delay,
    frames: usize,
}

impl GifWriter {
    /// Creates the output file.
    pub fn create(path: &Path, fps: u32) -> RenderResult<Self> {
        create_parent(path)?;
        let file = BufWriter::new(File::create(path)?);
        let mut encoder = GifEncoder::new(file);
        encoder.set_repeat(Repeat::Infinite)?;
        Ok(Self {
            path: path.to_path_buf(),
            encoder,
            delay: Delay::from_numer_denom_ms(1000, fps.max(1)),
            frames: 0,
        })
    }
}

impl VideoWriter for GifWriter {
    fn add_frame(&mut self, frame: &RgbaImage) -> RenderResult<()> {
        self.encoder
            .encode_frame(Frame::from_parts(frame.clone(), 0, 0, self.delay))?;
        self.frames += 1;
        Ok(())
    }

    fn frames_written(&self) -> usize {
        self.frames
    }

    fn finish(self: Box<Self>) -> RenderResult<PathBuf> {
        let Self { path, encoder, .. } = *self;
        // the trailer is written when the encoder is dropped
        drop(encoder);
        Ok(path)
    }
}

/// Writes `frame_00000.png`, `frame_00001.png`, ... into a directory.
pub struct FrameDirWriter {
    dir: PathBuf,
    frames: usize,
}

impl FrameDirWriter {
    /// Uses `path` without its extension as the output directory.
    pub fn create(path: &Path) -> RenderResult<Self> {
        let dir = path.with_extension("");
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, frames: 0 })
    }
}

impl VideoWriter for FrameDirWriter {
    fn add_frame(&mut self, frame: &RgbaImage) -> RenderResult<()> {
        let path = self.dir.join(format!("frame_{:05}.png", self.frames));
        frame.save_with_format(&path, image::ImageFormat::Png)?;
        self.frames += 1;
        Ok(())
    }

    fn frames_written(&self) -> usize {
        self.frames
    }

    fn finish(self: Box<Self>) -> RenderResult<PathBuf> {
        Ok(self.dir)
    }
}

/// Streams raw RGBA frames to an `ffmpeg` subprocess.
///
/// The process is spawned on the first frame, once the frame size is known.
pub struct FfmpegWriter {
    path: PathBuf,
    fps: u32,
    size: Option<(u32, u32)>,
    child: Option<(Child, ChildStdin)>,
    frames: usize,
}

impl FfmpegWriter {
    /// Creates a writer; nothing is spawned yet.
    pub fn new(path: &Path, fps: u32) -> Self {
        Self {
            path: path.to_path_buf(),
            fps,
            size: None,
            child: None,
            frames: 0,
        }
    }

    fn spawn(&mut self, width: u32, height: u32) -> RenderResult<()> {
        create_parent(&self.path)?;
        let mut child = Command::new("ffmpeg")
            .args(["-y", "-loglevel", "error", "-f", "rawvideo", "-pix_fmt", "rgba"])
            .args(["-s", &format!("{width}x{height}")])
            .args(["-r", &self.fps.to_string(), "-i", "-"])
            .args(["-vf", "pad=ceil(iw/2)*2:ceil(ih/2)*2", "-pix_fmt", "yuv420p"])
            .arg(&self.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()
            .map_err(|err| RenderError::Encoding(format!("could not start ffmpeg: {err}")))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| RenderError::Encoding("ffmpeg stdin unavailable".to_string()))?;
        log::debug!("ffmpeg started for {}", self.path.display());
        self.size = Some((width, height));
        self.child = Some((child, stdin));
        Ok(())
    }
}

impl VideoWriter for FfmpegWriter {
    fn add_frame(&mut self, frame: &RgbaImage) -> RenderResult<()> {
        let dims = frame.dimensions();
        match self.size {
            None => self.spawn(dims.0, dims.1)?,
            Some(size) if size != dims => {
                return Err(RenderError::Encoding(format!(
                    "frame size changed from {}x{} to {}x{}",
                    size.0, size.1, dims.0, dims.1
                )));
            }
            Some(_) => {}
        }
        if let Some((_, stdin)) = self.child.as_mut() {
            stdin.write_all(frame.as_raw())?;
        }
        self.frames += 1;
        Ok(())
    }

    fn frames_written(&self) -> usize {
        self.frames
    }

    fn finish(self: Box<Self>) -> RenderResult<PathBuf> {
        let Self { path, child, .. } = *self;
        if let Some((mut child, stdin)) = child {
            drop(stdin);
            let status = child.wait()?;
            if !status.success() {
                return Err(RenderError::Encoding(format!("ffmpeg exited with {status}")));
            }
        }
        Ok(path)
    }
}

fn create_parent(path: &Path) -> RenderResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("brainrender-video-{tag}-{}", std::process::id()))
    }

    fn frame(shade: u8) -> RgbaImage {
        RgbaImage::from_pixel(8, 6, image::Rgba([shade, 0, 255 - shade, 255]))
    }

    #[test]
    fn test_gif_writer() {
        let dir = temp_dir("gif");
        let mut writer = open_video_writer(&dir.join("movie.gif"), "gif", 10).expect("gif");
        for i in 0..3 {
            writer.add_frame(&frame(i * 80)).expect("frame");
        }
        assert_eq!(writer.frames_written(), 3);
        let path = writer.finish().expect("finish");
        let bytes = fs::read(&path).expect("read gif");
        assert_eq!(&bytes[..3], b"GIF");
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_frame_dir_writer() {
        let dir = temp_dir("frames");
        let mut writer = open_video_writer(&dir.join("movie.mp4"), "frames", 5).expect("frames");
        writer.add_frame(&frame(0)).expect("frame");
        writer.add_frame(&frame(1)).expect("frame");
        let out = writer.finish().expect("finish");
        assert_eq!(out, dir.join("movie"));
        assert!(out.join("frame_00001.png").is_file());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_zero_fps_rejected() {
        assert!(open_video_writer(Path::new("movie.gif"), "gif", 0).is_err());
    }
}
