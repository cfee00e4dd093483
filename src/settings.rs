use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::audio::{ChannelMode, DEFAULT_BUFFER_SIZE};
use crate::config::RecorderConfig;
use crate::recorder::Recorder;

/// Returns the path to the settings file: `~/.config/recordmic/settings.json`
pub fn settings_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("recordmic");
    path.push("settings.json");
    path
}

/// Persisted recorder settings.
///
/// Serialized as JSON to the platform config directory.
/// Fields use `#[serde(default)]` so that adding new settings
/// won't break existing config files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderSettings {
    pub volume: f32,
    pub buffer_size: usize,

    /// `"stereo"`, `"left"`, `"right"`, or a boolean (`true` = right)
    #[serde(alias = "mono")]
    pub channel_mode: ChannelMode,

    pub device: Option<String>,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            volume: 1.0,
            buffer_size: DEFAULT_BUFFER_SIZE,
            channel_mode: ChannelMode::Stereo,
            device: None,
        }
    }
}

impl RecorderSettings {
    /// Load settings from disk, falling back to defaults on any error.
    pub fn load() -> Self {
        Self::load_from(&settings_path())
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(settings) => {
                    log::info!("Loaded settings from {}", path.display());
                    settings
                }
                Err(e) => {
                    log::warn!("Failed to parse settings ({}), using defaults", e);
                    Self::default()
                }
            },
            Err(e) => {
                log::info!("No settings file found ({}), using defaults", e);
                Self::default()
            }
        }
    }

    /// Save settings to disk as pretty JSON.
    pub fn save(&self) {
        let path = settings_path();
        match self.save_to(&path) {
            Ok(()) => log::info!("Saved settings to {}", path.display()),
            Err(e) => log::warn!("Failed to write settings: {}", e),
        }
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }

    /// Extract current settings from an open recorder.
    pub fn from_recorder(recorder: &Recorder) -> Self {
        Self {
            volume: recorder.volume(),
            buffer_size: recorder.buffer_size(),
            channel_mode: recorder.channel_mode(),
            device: recorder.device().map(str::to_string),
        }
    }

    /// Recorder options for these settings, without a sample tap.
    pub fn to_config(&self) -> RecorderConfig {
        let config = RecorderConfig::default()
            .volume(self.volume)
            .buffer_size(self.buffer_size)
            .channel_mode(self.channel_mode);

        match &self.device {
            Some(device) => config.device(device.clone()),
            None => config,
        }
    }
}
