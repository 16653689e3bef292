//! Controller state and statistics for h2md-player

use serde::Serialize;
use std::fmt;

/// How `decode`/`get_image` reach the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeMode {
    /// Blocking calls on the caller's thread
    #[default]
    Sync,
    /// Requests go through the background decode worker
    Async,
}

impl DecodeMode {
    pub fn from_async(enabled: bool) -> Self {
        if enabled {
            DecodeMode::Async
        } else {
            DecodeMode::Sync
        }
    }
}

/// Lifecycle of a movie controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MovieState {
    /// No movie has been opened yet, or the last open failed
    #[default]
    Unopened,
    /// An open is in progress
    Opening,
    /// A movie is open and decodable
    Ready(DecodeMode),
    /// The movie was disposed; a new open is allowed
    Disposed,
}

impl MovieState {
    pub fn is_ready(&self) -> bool {
        matches!(self, MovieState::Ready(_))
    }
}

impl fmt::Display for MovieState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MovieState::Unopened => write!(f, "unopened"),
            MovieState::Opening => write!(f, "opening"),
            MovieState::Ready(DecodeMode::Sync) => write!(f, "ready (sync)"),
            MovieState::Ready(DecodeMode::Async) => write!(f, "ready (async)"),
            MovieState::Disposed => write!(f, "disposed"),
        }
    }
}

/// Playback statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlaybackStats {
    /// Decode requests issued (sync calls plus accepted async submissions)
    pub decodes_requested: u64,

    /// Async submissions discarded because one was still pending
    pub submissions_dropped: u64,

    /// Decodes that completed successfully
    pub decodes_completed: u64,

    /// Decodes or fetches that reported a failure status
    pub decodes_failed: u64,

    /// Frames copied onto the display surface
    pub images_transferred: u64,
}

impl PlaybackStats {
    /// Share of requested frames that reached the surface.
    pub fn delivery_ratio(&self) -> f64 {
        if self.decodes_requested == 0 {
            return 0.0;
        }
        self.images_transferred as f64 / self.decodes_requested as f64
    }
}
