//! Decoder module for h2md-player
//!
//! The native engine decodes synchronously. This module moves that work
//! onto a background worker so playback ticks never block on it.

mod coordinator;

pub use coordinator::{
    AsyncDecoder, CoordinatorState, CoordinatorStats, DecodePoll, Submission, DEFAULT_DRAIN_WARN,
};

use crate::native::Status;
use crate::renderer::FrameBuffer;

/// What the worker hands back for one requested frame.
#[derive(Debug)]
pub struct DecodedFrame {
    /// Status of the decode, or of the fetch if the decode succeeded
    pub status: Status,

    /// The fetched pixels, present only when `status` is a success
    pub pixels: Option<FrameBuffer>,
}

impl DecodedFrame {
    pub fn failed(status: Status) -> Self {
        Self { status, pixels: None }
    }
}
