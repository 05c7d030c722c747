//! Process-wide configuration.
//!
//! Settings are read once, when a scene is constructed: the scene keeps its own
//! snapshot, so later changes only affect scenes created afterwards.

use std::path::Path;
use std::sync::{OnceLock, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Global settings singleton.
static SETTINGS: OnceLock<RwLock<Settings>> = OnceLock::new();

/// Surface shading style applied to every actor at render time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ShaderStyle {
    /// Flat colours with strong ambient light.
    #[default]
    Cartoon,
    /// Bright specular highlights.
    Metallic,
    /// Moderate specular, matte diffuse.
    Plastic,
    /// Sharp highlights.
    Shiny,
    /// Soft broad highlights.
    Glossy,
}

impl ShaderStyle {
    /// Returns `(ambient, diffuse, specular, shininess)` lighting coefficients.
    pub fn lighting(self) -> (f32, f32, f32, f32) {
        match self {
            ShaderStyle::Cartoon => (0.55, 0.45, 0.0, 1.0),
            ShaderStyle::Metallic => (0.2, 0.6, 0.8, 40.0),
            ShaderStyle::Plastic => (0.25, 0.7, 0.3, 16.0),
            ShaderStyle::Shiny => (0.2, 0.6, 0.6, 64.0),
            ShaderStyle::Glossy => (0.25, 0.65, 0.45, 24.0),
        }
    }

    /// Returns the lowercase style name.
    pub fn name(self) -> &'static str {
        match self {
            ShaderStyle::Cartoon => "cartoon",
            ShaderStyle::Metallic => "metallic",
            ShaderStyle::Plastic => "plastic",
            ShaderStyle::Shiny => "shiny",
            ShaderStyle::Glossy => "glossy",
        }
    }
}

/// Global configuration options for brainrender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Background color (rgb in `[0, 1]`).
    pub background_color: [f32; 3],

    /// Atlas used when a scene does not name one.
    pub default_atlas: String,

    /// Camera used when neither the scene nor the atlas specify one.
    pub default_camera: String,

    /// Shading style applied to all actors.
    pub shader_style: ShaderStyle,

    /// Whether to draw the axes of the root bounding box.
    pub show_axes: bool,

    /// Whether the window should fill the screen.
    pub whole_screen: bool,

    /// Window size in pixels when not whole screen.
    pub window_size: [u32; 2],

    /// Opacity of the root (whole brain) actor.
    pub root_alpha: f32,

    /// Colour of the root actor.
    pub root_color: [f32; 3],

    /// Colour for actors created without an explicit colour.
    pub default_mesh_color: [f32; 3],

    /// Resolution multiplier for screenshots.
    pub screenshot_scale: u32,

    /// Whether rendering should hand control to an interactive loop.
    pub interactive: bool,

    /// Whether rendering should happen without a window.
    pub offscreen: bool,

    /// Verbose logging.
    pub debug: bool,

    /// Optional HTTP mirror used to fetch atlas files missing from the cache.
    pub atlas_mirror_url: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            background_color: [1.0, 1.0, 1.0],
            default_atlas: "allen_mouse_25um".to_string(),
            default_camera: "three_quarters".to_string(),
            shader_style: ShaderStyle::Cartoon,
            show_axes: false,
            whole_screen: false,
            window_size: [1280, 800],
            root_alpha: 0.2,
            root_color: [0.8, 0.8, 0.8],
            default_mesh_color: [0.85, 0.85, 0.85],
            screenshot_scale: 1,
            interactive: true,
            offscreen: false,
            debug: false,
            atlas_mirror_url: None,
        }
    }
}

impl Settings {
    /// Reads settings from a JSON file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Window size used for rendering, honouring `whole_screen`.
    pub fn render_size(&self) -> (u32, u32) {
        if self.whole_screen {
            (1920, 1080)
        } else {
            (self.window_size[0].max(1), self.window_size[1].max(1))
        }
    }
}

fn global() -> &'static RwLock<Settings> {
    SETTINGS.get_or_init(|| RwLock::new(Settings::default()))
}

/// Returns a snapshot of the current process-wide settings.
pub fn settings() -> Settings {
    match global().read() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// Mutates the process-wide settings.
///
/// Scenes that already exist are not affected.
pub fn update_settings<F, R>(f: F) -> R
where
    F: FnOnce(&mut Settings) -> R,
{
    let mut guard = match global().write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    f(&mut guard)
}

/// Replaces the process-wide settings with the content of a JSON file.
pub fn load_settings(path: impl AsRef<Path>) -> Result<()> {
    let loaded = Settings::from_file(path)?;
    update_settings(|s| *s = loaded);
    Ok(())
}
