//! # Configuration Management Module
//!
//! Persistent engine settings stored in platform-appropriate locations.
//! Handles loading, saving, and providing defaults for configuration options.
//!
//! ## Settings
//! - `time_window_minutes`: Width of the sliding chart/export window
//! - `auto_capture` / `auto_export`: Periodic chart image and CSV saving
//! - `theme`: Light or dark chart palette
//! - `max_points`: Per-channel history capacity
//! - `render_interval_ms`: Period of the render tick
//! - `auto_interval_minutes`: Period of the auto-capture/auto-export timers
//! - `log_dir`: Primary save directory (download fallback when unset)
//!
//! ## Storage Location
//! - macOS: ~/Library/Application Support/otgw-graph/config.toml
//! - Linux: ~/.config/otgw-graph/config.toml
//! - Windows: %APPDATA%\otgw-graph\config.toml

use crate::chart::Theme;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 24 hours of history at 10 records per second
pub const DEFAULT_MAX_POINTS: usize = 864_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub time_window_minutes: u32,
    pub auto_capture: bool,
    pub auto_export: bool,
    pub theme: Theme,
    pub max_points: usize,
    pub render_interval_ms: u64,
    pub auto_interval_minutes: u64,
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            time_window_minutes: 60,
            auto_capture: false,
            auto_export: false,
            theme: Theme::Light,
            max_points: DEFAULT_MAX_POINTS,
            render_interval_ms: 2000,
            auto_interval_minutes: 15,
            log_dir: None,
        }
    }
}

impl Config {
    /// Get the path to the config file
    fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("otgw-graph")
            .join("config.toml")
    }

    /// Load config from file, or create default if it doesn't exist
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load config from an explicit path, writing defaults when missing
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let config = toml::from_str(&contents).map_err(ConfigError::ParseFailed)?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.save_to(path)?;
                Ok(config)
            }
            Err(e) => Err(ConfigError::ReadFailed(e)),
        }
    }

    /// Save config to an explicit path
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ConfigError::WriteFailed)?;
        }

        let toml_string = toml::to_string_pretty(self).map_err(ConfigError::SerializeFailed)?;
        fs::write(path, toml_string).map_err(ConfigError::WriteFailed)?;

        Ok(())
    }

    /// Sliding window as a chrono duration; a zero width falls back to the
    /// default
    pub fn time_window(&self) -> chrono::Duration {
        let minutes = match self.time_window_minutes {
            0 => Self::default().time_window_minutes,
            minutes => minutes,
        };
        chrono::Duration::minutes(i64::from(minutes))
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.render_interval_ms.max(1))
    }

    pub fn auto_interval(&self) -> Duration {
        Duration::from_secs(self.auto_interval_minutes.max(1) * 60)
    }
}
