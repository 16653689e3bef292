//! Utility module for h2md-player
//!
//! This module provides common utilities used throughout the player:
//! - Error handling with custom error types
//! - Configuration management
//! - Common helper functions

pub mod config;
pub mod error;

// Re-export commonly used items
pub use config::{Config, DecoderConfig, GeneralConfig, PlaybackConfig};
pub use error::{PlayerError, Result};

/// Initialize the player configuration
///
/// Loads configuration from:
/// 1. Default values
/// 2. System configuration file
/// 3. User configuration file
/// 4. Environment variables
pub fn load_config() -> Result<Config> {
    Config::load()
}

/// Format a duration for display
///
/// Formatted as "HH:MM:SS", or "MM:SS" for durations under an hour
pub fn format_duration(duration: std::time::Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// Movie length in seconds for a frame count and frame rate
pub fn movie_duration(total_frames: u32, frame_rate: f32) -> std::time::Duration {
    if frame_rate <= 0.0 {
        return std::time::Duration::ZERO;
    }
    std::time::Duration::from_secs_f64(total_frames as f64 / frame_rate as f64)
}
