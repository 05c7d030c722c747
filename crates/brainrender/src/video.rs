//! Videos of a scene: free camera motion with [`VideoMaker`] and keyframed
//! camera paths with [`Animation`].

use std::path::{Path, PathBuf};

use brainrender_core::{BrainrenderError, Result};
use brainrender_render::{open_video_writer, resolve_camera, CameraArg, CameraParams};

use crate::scene::{RenderOptions, Scene};

/// Called before each frame with the scene and the frame index.
pub type FrameCallback = Box<dyn FnMut(&mut Scene, usize) -> Result<()>>;

/// Number of frames in a video: `round(duration * fps)`.
pub fn frame_count(duration: f64, fps: u32) -> Result<usize> {
    if !(duration.is_finite() && duration > 0.0) {
        return Err(BrainrenderError::invalid(format!("video duration must be positive, got {duration}")));
    }
    if fps == 0 {
        return Err(BrainrenderError::invalid("fps must be positive"));
    }
    match (duration * f64::from(fps)).round() {
        n if n >= 1.0 => Ok(n as usize),
        _ => Err(BrainrenderError::invalid(format!(
            "a {duration} s video at {fps} fps has no frames"
        ))),
    }
}

/// Camera rotation applied at every frame by the default frame function.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CameraStep {
    pub azimuth: f64,
    pub elevation: f64,
    pub roll: f64,
}

/// Renders a scene frame by frame into a video file.
pub struct VideoMaker {
    scene: Scene,
    save_fld: PathBuf,
    save_name: String,
    fmt: String,
    make_frame: Option<FrameCallback>,
}

impl std::fmt::Debug for VideoMaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoMaker")
            .field("save_fld", &self.save_fld)
            .field("save_name", &self.save_name)
            .field("fmt", &self.fmt)
            .field("custom_frames", &self.make_frame.is_some())
            .finish_non_exhaustive()
    }
}

impl VideoMaker {
    /// Videos are written to `<save_fld>/<save_name>.mp4` unless
    /// [`VideoMaker::with_format`] picks another format.
    pub fn new(scene: Scene, save_fld: impl Into<PathBuf>, save_name: impl Into<String>) -> Self {
        Self {
            scene,
            save_fld: save_fld.into(),
            save_name: save_name.into(),
            fmt: "mp4".to_string(),
            make_frame: None,
        }
    }

    /// `gif`, `frames` (a folder of PNGs) or any format `ffmpeg` writes.
    #[must_use]
    pub fn with_format(mut self, fmt: impl Into<String>) -> Self {
        self.fmt = fmt.into();
        self
    }

    /// Replaces the default camera rotation with `make_frame`.
    #[must_use]
    pub fn with_frame_callback(mut self, make_frame: FrameCallback) -> Self {
        self.make_frame = Some(make_frame);
        self
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn into_scene(self) -> Scene {
        self.scene
    }

    /// Output path of the video.
    pub fn output_path(&self) -> PathBuf {
        self.save_fld.join(format!("{}.{}", self.save_name, self.fmt))
    }

    /// Renders `round(duration * fps)` frames and encodes them.
    ///
    /// Each frame runs the frame callback, or rotates the camera by `step`
    /// when there is none, then renders offscreen.
    pub fn make_video(&mut self, duration: f64, fps: u32, step: CameraStep) -> Result<PathBuf> {
        let n_frames = frame_count(duration, fps)?;
        let mut writer = open_writer(&self.output_path(), &self.fmt, fps)?;
        if !self.scene.is_rendered() {
            self.scene.render(&RenderOptions::offscreen())?;
        }
        for index in 0..n_frames {
            match self.make_frame.as_mut() {
                Some(make_frame) => make_frame(&mut self.scene, index)?,
                None => rotate_camera(&mut self.scene, step)?,
            }
            self.scene.render(&RenderOptions::offscreen())?;
            writer.add_frame(&self.scene.grab_frame()?)?;
        }
        let path = writer.finish()?;
        log::info!("saved {n_frames} frame video to {}", path.display());
        Ok(path)
    }
}

fn open_writer(
    path: &Path,
    fmt: &str,
    fps: u32,
) -> Result<Box<dyn brainrender_render::VideoWriter>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(open_video_writer(path, fmt, fps)?)
}

fn rotate_camera(scene: &mut Scene, step: CameraStep) -> Result<()> {
    if step == CameraStep::default() {
        return Ok(());
    }
    let Some(camera) = scene.camera() else {
        return Ok(());
    };
    scene.set_camera(camera.elevation(step.elevation).azimuth(step.azimuth).roll(step.roll))?;
    Ok(())
}

/// A camera state at a point in time, with an optional action.
pub struct Keyframe {
    pub time: f64,
    pub camera: Option<CameraParams>,
    pub zoom: Option<f64>,
    pub callback: Option<FrameCallback>,
}

impl std::fmt::Debug for Keyframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keyframe")
            .field("time", &self.time)
            .field("camera", &self.camera)
            .field("zoom", &self.zoom)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// What one video frame shows.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameParams {
    pub index: usize,
    /// Time of the frame in seconds.
    pub time: f64,
    /// Interpolated camera, `None` when no keyframe sets one.
    pub camera: Option<CameraParams>,
    pub zoom: Option<f64>,
    /// Indices of the keyframes whose callbacks run before this frame.
    pub callbacks: Vec<usize>,
}

#[derive(Debug, Clone, Copy)]
struct KeyState {
    time: f64,
    camera: Option<CameraParams>,
    zoom: Option<f64>,
}

/// Lazy sequence of [`FrameParams`] for an animation.
///
/// Frame `i` of `n` is sampled at `i * duration / (n - 1)`, so the first and
/// last frames show the first keyframe and the state at `duration`.
#[derive(Debug, Clone)]
pub struct Frames {
    keys: Vec<KeyState>,
    duration: f64,
    n_frames: usize,
    next: usize,
}

impl Frames {
    fn time_of(&self, index: usize) -> f64 {
        if self.n_frames <= 1 {
            0.0
        } else {
            index as f64 * self.duration / (self.n_frames - 1) as f64
        }
    }

    fn bracket(&self, t: f64) -> Option<(KeyState, KeyState)> {
        let first = *self.keys.first()?;
        let last = *self.keys.last()?;
        if t <= first.time {
            return Some((first, first));
        }
        if t >= last.time {
            return Some((last, last));
        }
        self.keys
            .windows(2)
            .find(|w| w[0].time <= t && t < w[1].time)
            .map(|w| (w[0], w[1]))
    }

    fn interpolate(&self, t: f64) -> (Option<CameraParams>, Option<f64>) {
        let Some((k0, k1)) = self.bracket(t) else {
            return (None, None);
        };
        let span = k1.time - k0.time;
        let u = if span > 0.0 { (t - k0.time) / span } else { 0.0 };
        let camera = match (k0.camera, k1.camera) {
            (Some(c0), Some(c1)) => Some(c0.lerp(&c1, u)),
            (c0, c1) => c0.or(c1),
        };
        let zoom = match (k0.zoom, k1.zoom) {
            (Some(z0), Some(z1)) => Some(z0 * (1.0 - u) + z1 * u),
            (z0, z1) => z0.or(z1),
        };
        (camera, zoom)
    }
}

impl Iterator for Frames {
    type Item = FrameParams;

    fn next(&mut self) -> Option<FrameParams> {
        if self.next >= self.n_frames {
            return None;
        }
        let index = self.next;
        self.next += 1;
        let time = self.time_of(index);
        let until = (index + 1 < self.n_frames).then(|| self.time_of(index + 1));
        let callbacks = self
            .keys
            .iter()
            .enumerate()
            .filter(|(_, k)| k.time >= time && until.map_or(true, |end| k.time < end))
            .map(|(i, _)| i)
            .collect();
        let (camera, zoom) = self.interpolate(time);
        Some(FrameParams {
            index,
            time,
            camera,
            zoom,
            callbacks,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.n_frames - self.next;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Frames {}

/// A video driven by keyframes: the camera and zoom are interpolated
/// linearly between consecutive keyframes.
#[derive(Debug)]
pub struct Animation {
    maker: VideoMaker,
    keyframes: Vec<Keyframe>,
}

impl Animation {
    pub fn new(scene: Scene, save_fld: impl Into<PathBuf>, save_name: impl Into<String>) -> Self {
        Self {
            maker: VideoMaker::new(scene, save_fld, save_name),
            keyframes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_format(mut self, fmt: impl Into<String>) -> Self {
        self.maker = self.maker.with_format(fmt);
        self
    }

    pub fn scene(&self) -> &Scene {
        self.maker.scene()
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        self.maker.scene_mut()
    }

    pub fn into_scene(self) -> Scene {
        self.maker.into_scene()
    }

    /// Keyframes ordered by time.
    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    /// Adds a keyframe, replacing any keyframe at the same time.
    ///
    /// A default camera argument leaves the camera to the neighbouring
    /// keyframes.
    pub fn add_keyframe(
        &mut self,
        time: f64,
        camera: impl Into<CameraArg>,
        zoom: Option<f64>,
        callback: Option<FrameCallback>,
    ) -> Result<()> {
        if !(time.is_finite() && time >= 0.0) {
            return Err(BrainrenderError::invalid(format!("keyframe time must be >= 0, got {time}")));
        }
        if let Some(z) = zoom.filter(|z| !(z.is_finite() && *z > 0.0)) {
            return Err(BrainrenderError::invalid(format!("zoom must be positive, got {z}")));
        }
        let camera = match camera.into() {
            CameraArg::Default => None,
            arg => Some(resolve_camera(&arg, &self.scene().config().default_camera)?),
        };
        let keyframe = Keyframe {
            time,
            camera,
            zoom,
            callback,
        };
        match self.keyframes.iter().position(|k| k.time >= time) {
            Some(i) if self.keyframes[i].time == time => self.keyframes[i] = keyframe,
            Some(i) => self.keyframes.insert(i, keyframe),
            None => self.keyframes.push(keyframe),
        }
        Ok(())
    }

    /// The frames of a `duration` second video at `fps`. Keyframes after
    /// `duration` count as being at `duration`.
    pub fn frames(&self, duration: f64, fps: u32) -> Result<Frames> {
        let n_frames = frame_count(duration, fps)?;
        let keys = self
            .keyframes
            .iter()
            .map(|k| KeyState {
                time: k.time.min(duration),
                camera: k.camera,
                zoom: k.zoom,
            })
            .collect();
        Ok(Frames {
            keys,
            duration,
            n_frames,
            next: 0,
        })
    }

    /// Renders and encodes the animation. Returns the video path.
    pub fn make_video(&mut self, duration: f64, fps: u32) -> Result<PathBuf> {
        if self.keyframes.is_empty() {
            return Err(BrainrenderError::invalid("an animation needs at least one keyframe"));
        }
        let frames = self.frames(duration, fps)?;
        let n_frames = frames.len();
        let mut writer = open_writer(&self.maker.output_path(), &self.maker.fmt, fps)?;
        let scene = &mut self.maker.scene;
        if !scene.is_rendered() {
            scene.render(&RenderOptions::offscreen())?;
        }
        // frames without a camera or zoom keep the last one applied
        let mut camera = scene.camera();
        let mut zoom = 1.0;

        for frame in frames {
            camera = frame.camera.or(camera);
            zoom = frame.zoom.unwrap_or(zoom);
            if let Some(camera) = camera {
                scene.set_camera(camera.zoomed(zoom))?;
            }
            for &k in &frame.callbacks {
                if let Some(callback) = self.keyframes[k].callback.as_mut() {
                    callback(scene, frame.index)?;
                }
            }
            scene.render(&RenderOptions::offscreen())?;
            writer.add_frame(&scene.grab_frame()?)?;
        }
        let path = writer.finish()?;
        log::info!("saved {n_frames} frame animation to {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brainrender_render::named_camera;

    fn frames(keys: Vec<(f64, Option<CameraParams>, Option<f64>)>, duration: f64, fps: u32) -> Vec<FrameParams> {
        let n_frames = frame_count(duration, fps).expect("frames");
        Frames {
            keys: keys
                .into_iter()
                .map(|(time, camera, zoom)| KeyState { time, camera, zoom })
                .collect(),
            duration,
            n_frames,
            next: 0,
        }
        .collect()
    }

    #[test]
    fn test_frame_count() {
        assert_eq!(frame_count(1.0, 15).expect("count"), 15);
        assert_eq!(frame_count(2.5, 30).expect("count"), 75);
        assert!(frame_count(0.0, 30).is_err());
        assert!(frame_count(1.0, 0).is_err());
        assert!(frame_count(0.01, 10).is_err());
    }

    #[test]
    fn test_midpoint_interpolation() {
        let top = named_camera("top").expect("top");
        let sagittal = named_camera("sagittal").expect("sagittal");
        let all = frames(vec![(0.0, Some(top), Some(1.3)), (1.0, Some(sagittal), Some(2.1))], 1.0, 15);
        assert_eq!(all.len(), 15);
        assert_eq!(all[0].camera, Some(top));
        assert_eq!(all[14].camera, Some(sagittal));
        let mid = &all[7];
        assert!((mid.time - 0.5).abs() < 1e-12);
        let camera = mid.camera.expect("camera");
        assert!((camera.position - (top.position + sagittal.position) * 0.5).abs().max_element() < 1e-6);
        assert!((camera.distance - (top.distance + sagittal.distance) * 0.5).abs() < 1e-6);
        assert!((mid.zoom.expect("zoom") - 1.7).abs() < 1e-9);
    }

    #[test]
    fn test_outside_keyframes_hold() {
        let top = named_camera("top").expect("top");
        let all = frames(vec![(0.5, Some(top), None), (0.75, None, Some(2.0))], 1.0, 5);
        assert_eq!(all[0].camera, Some(top));
        assert_eq!(all[0].zoom, None);
        assert_eq!(all[2].camera, Some(top));
        assert_eq!(all[4].camera, None);
        assert_eq!(all[4].zoom, Some(2.0));
    }

    #[test]
    fn test_callbacks_fire_once() {
        let all = frames(vec![(0.0, None, None), (0.3, None, None), (1.0, None, None)], 1.0, 4);
        let fired: Vec<usize> = all.iter().flat_map(|f| f.callbacks.clone()).collect();
        assert_eq!(fired, vec![0, 1, 2]);
        assert_eq!(all[0].callbacks, vec![0, 1]);
        assert_eq!(all[3].callbacks, vec![2]);
    }
}
