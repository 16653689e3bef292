//! h2md-player: playback core for H2MD movies
//!
//! Frames are decoded by a synchronous native engine, reached through the
//! [`native::NativeDecoder`] call surface, and presented through a
//! [`renderer::DisplaySurface`]. [`player::MovieController`] ties the two
//! together and can move decoding onto a background worker
//! ([`decoder::AsyncDecoder`]) so playback ticks never block on it.

pub mod decoder;
pub mod native;
pub mod player;
pub mod renderer;
pub mod utils;

pub use native::{ImageFormat, MovieInfo, NativeDecoder, Status, ThreadCount};
pub use player::{ControllerOptions, MovieController, PlaybackDriver};
pub use utils::error::{PlayerError, Result};
