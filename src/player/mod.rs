//! Movie playback for h2md-player
//!
//! [`MovieController`] owns one movie: the native handle, its metadata, the
//! display surface and, in async mode, the decode worker. [`PlaybackDriver`]
//! maps elapsed time onto frame indices and calls the controller each tick.

mod controller;
mod driver;
mod state;

pub use controller::{ControllerOptions, MovieController};
pub use driver::{ClockTick, PlaybackClock, PlaybackDriver, TickReport};
pub use state::{DecodeMode, MovieState, PlaybackStats};
