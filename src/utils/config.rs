//! Configuration management for h2md-player
//!
//! This module handles loading and managing player configuration from
//! config files and environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::native::ImageFormat;
use crate::utils::error::{IntoPlayerError, PlayerError, Result};

/// Main player configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Decoder configuration
    pub decoder: DecoderConfig,

    /// Playback loop configuration
    pub playback: PlaybackConfig,

    /// General application settings
    pub general: GeneralConfig,
}

/// Decoder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Explicit path of the `h2md_dec` shared library
    pub library_path: Option<PathBuf>,

    /// Pixel layout requested from the engine
    pub image_format: ImageFormat,

    /// Engine decoding threads (0 = automatic)
    pub threads: u32,

    /// Decode on a background worker
    pub async_decode: bool,

    /// Shutdown drain warning interval in milliseconds
    pub drain_warn_ms: u64,
}

/// Playback loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Restart from frame 0 after the last frame
    pub loop_playback: bool,

    /// Driver ticks per second
    pub tick_rate: f64,

    /// Stop after this many seconds
    pub max_duration_secs: Option<f64>,
}

/// General application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            library_path: None,
            image_format: ImageFormat::Rgba,
            threads: 0, // 0 = auto-detect
            async_decode: false,
            drain_warn_ms: 250,
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            loop_playback: true,
            tick_rate: 60.0,
            max_duration_secs: None,
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Load configuration from various sources
    ///
    /// Configuration is loaded in the following order (later sources override earlier):
    /// 1. Default values
    /// 2. System config file (/etc/h2md-player/config.toml on Linux)
    /// 3. User config file (~/.config/h2md-player/config.toml on Linux)
    /// 4. Environment variables (H2MD_* prefix)
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(system_path) = Self::system_config_path() {
            if system_path.exists() {
                config.merge_from_file(&system_path)?;
            }
        }

        if let Some(user_path) = Self::user_config_path() {
            if user_path.exists() {
                config.merge_from_file(&user_path)?;
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Load a single explicit config file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut config = Self::default();
        config.merge_from_file(path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the user config file
    pub fn save(&self) -> Result<()> {
        let path = Self::user_config_path()
            .ok_or_else(|| PlayerError::Config("Cannot determine user config path".to_string()))?;
        self.save_to(&path)
    }

    /// Save configuration to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).config_err("Failed to create config directory")?;
        }

        let toml = toml::to_string_pretty(self).config_err("Failed to serialize config")?;
        std::fs::write(path, toml).config_err("Failed to write config file")?;

        Ok(())
    }

    /// Merge configuration from a TOML file
    ///
    /// Keys present in the file replace the current values; everything the
    /// file leaves out keeps what earlier sources set.
    fn merge_from_file(&mut self, path: &Path) -> Result<()> {
        let contents = std::fs::read_to_string(path).config_err("Failed to read config file")?;
        let overlay: toml::Table = toml::from_str(&contents).config_err("Failed to parse config file")?;

        let mut merged = toml::Value::try_from(&*self).config_err("Failed to serialize config")?;
        if let toml::Value::Table(base) = &mut merged {
            merge_tables(base, overlay);
        }
        *self = merged.try_into().config_err("Failed to parse config file")?;
        Ok(())
    }

    /// Apply `H2MD_*` overrides looked up through `var`
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(path) = var("H2MD_LIBRARY") {
            self.decoder.library_path = Some(PathBuf::from(path));
        }

        if let Some(value) = var("H2MD_ASYNC") {
            self.decoder.async_decode = parse_bool(&value)
                .ok_or_else(|| PlayerError::Config(format!("Invalid H2MD_ASYNC '{}'", value)))?;
        }

        if let Some(threads) = var("H2MD_THREADS") {
            self.decoder.threads = threads.parse().config_err("Invalid H2MD_THREADS")?;
        }

        if let Some(log_level) = var("H2MD_LOG_LEVEL") {
            self.general.log_level = log_level;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !(self.playback.tick_rate.is_finite() && self.playback.tick_rate > 0.0) {
            return Err(PlayerError::Config("Tick rate must be positive".to_string()));
        }

        if let Some(max) = self.playback.max_duration_secs {
            if !(max.is_finite() && max >= 0.0) {
                return Err(PlayerError::Config("Maximum duration must not be negative".to_string()));
            }
        }

        if !VALID_LOG_LEVELS.contains(&self.general.log_level.as_str()) {
            return Err(PlayerError::Config(format!(
                "Invalid log level '{}', must be one of: {:?}",
                self.general.log_level, VALID_LOG_LEVELS
            )));
        }

        Ok(())
    }

    /// Get system config file path
    fn system_config_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        return Some(PathBuf::from("/etc/h2md-player/config.toml"));

        #[cfg(target_os = "windows")]
        return std::env::var("PROGRAMDATA")
            .ok()
            .map(|p| PathBuf::from(p).join("H2mdPlayer").join("config.toml"));

        #[cfg(target_os = "macos")]
        return Some(PathBuf::from("/Library/Application Support/H2mdPlayer/config.toml"));

        #[allow(unreachable_code)]
        None
    }

    /// Get user config file path
    pub fn user_config_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        return dirs::config_dir().map(|p| p.join("h2md-player").join("config.toml"));

        #[cfg(any(target_os = "windows", target_os = "macos"))]
        return dirs::config_dir().map(|p| p.join("H2mdPlayer").join("config.toml"));

        #[allow(unreachable_code)]
        None
    }
}

/// Deep-merge `overlay` into `base`; nested tables merge key by key.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match value {
            toml::Value::Table(incoming) => {
                if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                    merge_tables(existing, incoming);
                } else {
                    base.insert(key, toml::Value::Table(incoming));
                }
            }
            value => {
                base.insert(key, value);
            }
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
