//! Pixel hand-off for h2md-player
//!
//! Decoded frames land in a [`FrameBuffer`] and are then transferred onto
//! the [`DisplaySurface`] that the rendering side reads. Actual drawing is
//! left to whoever holds the surface.

mod frame_buffer;
mod surface;

pub use frame_buffer::{FrameBuffer, Pixel};
pub use surface::{DisplaySurface, SharedSurface};
