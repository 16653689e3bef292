//! Frame buffer bridge
//!
//! Owns the pixel buffer the decoding engine writes into. The buffer is
//! allocated lazily on first use, keeps its address for as long as it is
//! borrowed, and is recreated when the stream dimensions change.

use bytemuck::{Pod, Zeroable};
use log::trace;

use crate::native::BYTES_PER_PIXEL;

/// One 32-bit pixel in the handle's [`ImageFormat`](crate::native::ImageFormat).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Pixel(pub [u8; 4]);

/// Decode target sized to the movie.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    /// Pixels per line
    width: u32,

    /// Line count
    height: u32,

    /// Boxed slice: never grows in place, so the address only changes on
    /// reallocation
    pixels: Option<Box<[Pixel]>>,
}

impl FrameBuffer {
    /// Create an empty buffer with no layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer with a layout; memory is still allocated lazily.
    pub fn with_layout(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: None,
        }
    }

    /// Adopt the layout reported by the stream.
    ///
    /// Returns `true` when the layout changed, in which case any existing
    /// allocation is dropped and recreated on the next acquire.
    pub fn ensure_layout(&mut self, width: u32, height: u32) -> bool {
        if self.width == width && self.height == height {
            return false;
        }

        trace!("Frame buffer layout {}x{} -> {}x{}", self.width, self.height, width, height);
        self.width = width;
        self.height = height;
        self.pixels = None;
        true
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per line.
    pub fn stride(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    /// Total bytes of one frame.
    pub fn byte_len(&self) -> usize {
        self.stride() * self.height as usize
    }

    pub fn is_allocated(&self) -> bool {
        self.pixels.is_some()
    }

    /// Borrow the buffer for a native fetch, allocating it on first use.
    ///
    /// The returned slice keeps its address for the whole borrow; the
    /// exclusive borrow also rules out a concurrent release or relayout.
    pub fn acquire_stable_buffer(&mut self) -> &mut [u8] {
        let len = self.width as usize * self.height as usize;
        let pixels = self.pixels.get_or_insert_with(|| {
            trace!("Allocating {} pixel frame buffer", len);
            vec![Pixel::zeroed(); len].into_boxed_slice()
        });
        bytemuck::cast_slice_mut(&mut pixels[..])
    }

    /// Contents of the last fetch, if allocated.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        self.pixels.as_deref().map(bytemuck::cast_slice)
    }

    pub fn pixels(&self) -> Option<&[Pixel]> {
        self.pixels.as_deref()
    }

    /// Free the allocation. Safe to call repeatedly.
    pub fn release(&mut self) {
        if self.pixels.take().is_some() {
            trace!("Released {}x{} frame buffer", self.width, self.height);
        }
    }
}
