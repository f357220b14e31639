//! # Viewer Settings
//!
//! Loaded once at startup from a TOML file. Every key is optional; a
//! missing file means defaults, a malformed one is an error.
//!
//! ```toml
//! [settings]
//! screenshot_output_dir = "output"
//! direction_count = 8
//! background_color = [0, 0, 255, 255]
//!
//! [colors]
//! Default = [252, 0, 0]
//! Gold = [255, 210, 0]
//! ```

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use vxlview_formats::{Color, Vec3, DEFAULT_LIGHT_DIRECTION};
use vxlview_rendering::{RendererConfig, SubmitMode};

use crate::error::{AppError, AppResult};

/// Settings file looked up when none is given.
pub const DEFAULT_SETTINGS_FILE: &str = "settings.toml";

/// Name of the remap color that always exists.
pub const DEFAULT_COLOR_NAME: &str = "Default";

/// Remap color used when the settings do not override it.
pub const DEFAULT_COLOR: [i32; 3] = [252, 0, 0];

/// `[settings]` table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShotSettings {
    /// Where screenshots are written.
    pub screenshot_output_dir: PathBuf,
    /// Views per screenshot sequence.
    pub direction_count: u32,
    /// Image placed under the in-game preview.
    pub background_file_name: PathBuf,
    /// Horizontal preview spacing in cells; sign is ignored.
    pub cell_offset_x: i32,
    /// Vertical preview spacing in cells; sign is ignored.
    pub cell_offset_y: i32,
    /// Canvas background, 0..=255 per channel.
    pub background_color: [i32; 4],
    /// Also write the in-game composite preview.
    pub generate_ingame_views: bool,
    /// Batch grouping for per-limb work.
    pub submit_mode: SubmitMode,
    /// Bound on each fence wait.
    pub wait_timeout_ms: u64,
    /// Primary light direction.
    pub light_direction: [f32; 3],
}

impl Default for ShotSettings {
    fn default() -> Self {
        Self {
            screenshot_output_dir: PathBuf::from("output"),
            direction_count: 8,
            background_file_name: PathBuf::from("background.png"),
            cell_offset_x: 6,
            cell_offset_y: 6,
            background_color: [0, 0, 255, 255],
            generate_ingame_views: false,
            submit_mode: SubmitMode::default(),
            wait_timeout_ms: u64::from(u32::MAX),
            light_direction: DEFAULT_LIGHT_DIRECTION.to_array(),
        }
    }
}

impl ShotSettings {
    /// Preview cell spacing with the sign dropped.
    #[must_use]
    pub const fn cell_offsets(&self) -> (u32, u32) {
        (self.cell_offset_x.unsigned_abs(), self.cell_offset_y.unsigned_abs())
    }

    /// Background as normalized RGBA.
    #[must_use]
    pub fn background_rgba(&self) -> [f32; 4] {
        self.background_color.map(|c| f32::from(clamp_channel(c)) / 255.0)
    }

    /// Renderer construction parameters.
    #[must_use]
    pub fn renderer_config(&self) -> RendererConfig {
        RendererConfig {
            submit_mode: self.submit_mode,
            wait_timeout: Duration::from_millis(self.wait_timeout_ms),
            light_direction: Vec3::from_array(self.light_direction),
            ..RendererConfig::default()
        }
    }
}

/// Whole settings file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// `[settings]`
    pub settings: ShotSettings,
    /// `[colors]`: named remap colors.
    pub colors: BTreeMap<String, [i32; 3]>,
}

impl Default for Settings {
    fn default() -> Self {
        let mut colors = BTreeMap::new();
        colors.insert(DEFAULT_COLOR_NAME.to_owned(), DEFAULT_COLOR);
        Self {
            settings: ShotSettings::default(),
            colors,
        }
    }
}

fn clamp_channel(value: i32) -> u8 {
    u8::try_from(value.clamp(0, 255)).unwrap_or(u8::MAX)
}

impl Settings {
    /// Reads a settings file. A missing file yields defaults.
    ///
    /// # Errors
    ///
    /// [`AppError::Io`] when the file exists but cannot be read, and
    /// [`AppError::Config`] when it does not parse.
    pub fn load<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path = path.as_ref();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(AppError::io(path, &e)),
        };
        let settings = Self::parse(&text).map_err(|reason| AppError::Config {
            path: path.display().to_string(),
            reason,
        })?;
        info!(path = %path.display(), colors = settings.colors.len(), "settings loaded");
        Ok(settings)
    }

    /// Parses settings text.
    ///
    /// # Errors
    ///
    /// The parser message when the text is not valid settings TOML.
    pub fn parse(text: &str) -> Result<Self, String> {
        let mut settings: Self = toml::from_str(text).map_err(|e| e.to_string())?;
        settings
            .colors
            .entry(DEFAULT_COLOR_NAME.to_owned())
            .or_insert(DEFAULT_COLOR);
        Ok(settings)
    }

    /// Looks up a remap color by name, channels clamped to 0..=255.
    #[must_use]
    pub fn color(&self, name: &str) -> Option<Color> {
        self.colors
            .get(name)
            .map(|&[r, g, b]| Color::new(clamp_channel(r), clamp_channel(g), clamp_channel(b)))
    }

    /// Like [`Settings::color`], failing for unknown names.
    ///
    /// # Errors
    ///
    /// [`AppError::UnknownColor`]
    pub fn require_color(&self, name: &str) -> AppResult<Color> {
        self.color(name).ok_or_else(|| AppError::UnknownColor(name.to_owned()))
    }

    /// Color names in sorted order.
    pub fn color_names(&self) -> impl Iterator<Item = &str> {
        self.colors.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_original_tool() {
        let settings = Settings::default();
        assert_eq!(settings.settings.direction_count, 8);
        assert_eq!(settings.settings.cell_offsets(), (6, 6));
        assert_eq!(settings.settings.background_rgba(), [0.0, 0.0, 1.0, 1.0]);
        assert_eq!(settings.color(DEFAULT_COLOR_NAME), Some(Color::new(252, 0, 0)));
        assert!(!settings.settings.generate_ingame_views);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let settings = Settings::parse(
            "[settings]\ndirection_count = 16\ncell_offset_x = -3\nsubmit_mode = \"pipelined\"\n",
        )
        .unwrap();
        assert_eq!(settings.settings.direction_count, 16);
        assert_eq!(settings.settings.cell_offsets(), (3, 6));
        assert_eq!(settings.settings.submit_mode, SubmitMode::Pipelined);
        assert_eq!(settings.settings.screenshot_output_dir, PathBuf::from("output"));
        assert!(settings.color(DEFAULT_COLOR_NAME).is_some());
    }

    #[test]
    fn test_colors_clamp_and_default_override() {
        let settings = Settings::parse("[colors]\nDefault = [1, 2, 3]\nHot = [300, -5, 128]\n").unwrap();
        assert_eq!(settings.color("Default"), Some(Color::new(1, 2, 3)));
        assert_eq!(settings.color("Hot"), Some(Color::new(255, 0, 128)));
        assert_eq!(settings.color_names().collect::<Vec<_>>(), vec!["Default", "Hot"]);
        assert!(matches!(settings.require_color("Cold"), Err(AppError::UnknownColor(_))));
    }

    #[test]
    fn test_background_channels_clamped() {
        let settings = Settings::parse("[settings]\nbackground_color = [-1, 510, 51, 0]\n").unwrap();
        assert_eq!(settings.settings.background_rgba(), [0.0, 1.0, 0.2, 0.0]);
    }

    #[test]
    fn test_malformed_text_rejected() {
        assert!(Settings::parse("[settings\ndirection_count = 8").is_err());
        assert!(Settings::parse("[settings]\ndirection_count = \"eight\"").is_err());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let path = std::env::temp_dir().join(format!("vxlview_missing_{}.toml", std::process::id()));
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_renderer_config_carries_timeout_and_light() {
        let settings = Settings::parse("[settings]\nwait_timeout_ms = 250\nlight_direction = [0.0, 0.0, -1.0]\n").unwrap();
        let config = settings.settings.renderer_config();
        assert_eq!(config.wait_timeout, Duration::from_millis(250));
        assert_eq!(config.light_direction, Vec3::new(0.0, 0.0, -1.0));
        assert_eq!((config.width, config.height), (256, 256));
    }
}
