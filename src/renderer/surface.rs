//! Display surface handed to the renderer
//!
//! The controller returns a [`SharedSurface`] from `open`; the renderer
//! reads it between ticks while the controller writes decoded frames into it.

use std::sync::Arc;

use parking_lot::RwLock;

use super::FrameBuffer;
use crate::native::{ImageFormat, BYTES_PER_PIXEL};
use crate::utils::error::{PlayerError, Result};

/// Surface shared between the controller and the render hand-off.
pub type SharedSurface = Arc<RwLock<DisplaySurface>>;

/// Movie-sized pixel target.
#[derive(Debug, Clone)]
pub struct DisplaySurface {
    /// Pixels per line
    width: u32,

    /// Line count
    height: u32,

    /// Byte order of every pixel
    format: ImageFormat,

    /// Tightly packed pixel data, `width * height * 4` bytes
    pixels: Vec<u8>,

    /// Bumped on every transfer so readers can skip unchanged frames
    revision: u64,

    /// Frame index currently shown
    frame: Option<i32>,
}

impl DisplaySurface {
    /// Create a cleared surface.
    pub fn new(width: u32, height: u32, format: ImageFormat) -> Self {
        Self {
            width,
            height,
            format,
            pixels: vec![0; width as usize * height as usize * BYTES_PER_PIXEL],
            revision: 0,
            frame: None,
        }
    }

    /// Create a surface wrapped for sharing.
    pub fn shared(width: u32, height: u32, format: ImageFormat) -> SharedSurface {
        Arc::new(RwLock::new(Self::new(width, height, format)))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn stride(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// One pixel in surface byte order.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = y as usize * self.stride() + x as usize * BYTES_PER_PIXEL;
        let mut pixel = [0u8; 4];
        pixel.copy_from_slice(&self.pixels[offset..offset + BYTES_PER_PIXEL]);
        Some(pixel)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn frame(&self) -> Option<i32> {
        self.frame
    }

    /// Copy a fetched frame onto the surface.
    ///
    /// The source must be allocated and match the surface layout.
    pub fn transfer(&mut self, frame: Option<i32>, source: &FrameBuffer) -> Result<()> {
        if source.width() != self.width || source.height() != self.height {
            return Err(PlayerError::InvalidArgument);
        }
        let bytes = source.as_bytes().ok_or(PlayerError::InvalidState)?;

        self.pixels.copy_from_slice(bytes);
        self.revision += 1;
        self.frame = frame;
        Ok(())
    }
}
