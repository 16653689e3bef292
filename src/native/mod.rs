//! Native decoder surface
//!
//! The H2MD decoding engine is a synchronous, blocking library reached
//! through a small fixed call surface. [`NativeDecoder`] is that surface
//! expressed as a trait so the real shared library ([`NativeLibrary`]) and
//! the in-process test-pattern engine ([`SyntheticDecoder`]) can be swapped
//! behind the movie controller.
//!
//! Exactly one call on a given handle may be in flight at any instant.
//! The trait does not enforce this; [`DecoderHandle`] owners do.

mod handle;
mod library;
mod synthetic;

pub use handle::DecoderHandle;
pub use library::NativeLibrary;
pub use synthetic::{SyntheticDecoder, SyntheticMovie, SyntheticProbe};

use serde::{Deserialize, Serialize};
use std::ffi::c_void;
use std::fmt;
use std::path::Path;
use std::ptr::NonNull;

use crate::utils::error::Result;

/// Version of the [`MovieInfo`] layout this crate understands.
pub const MOVIE_INFO_VERSION: i32 = 1;

/// Bytes per decoded pixel for both supported image formats.
pub const BYTES_PER_PIXEL: usize = 4;

/// Status code returned by every native call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(i32);

impl Status {
    pub const SUCCESS: Status = Status(0);
    pub const INVALID_ARGUMENT: Status = Status(1);
    pub const INVALID_STATE: Status = Status(2);
    pub const INVALID_VERSION: Status = Status(3);
    pub const FILE_API_FAILURE: Status = Status(4);
    // 5 is reserved by the engine
    pub const BROKEN_DATA: Status = Status(6);
    pub const OUT_OF_MEMORY: Status = Status(7);
    pub const OTHER: Status = Status(128);

    /// Wrap a raw code as returned by the engine.
    pub const fn from_raw(code: i32) -> Self {
        Status(code)
    }

    /// The raw code.
    pub const fn code(self) -> i32 {
        self.0
    }

    pub fn is_success(self) -> bool {
        self == Status::SUCCESS
    }

    /// Turn a status into a `Result`, mapping failures onto [`PlayerError`](crate::PlayerError).
    pub fn check(self) -> Result<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(self.into())
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Status::SUCCESS => "SUCCESS",
            Status::INVALID_ARGUMENT => "INVALID_ARGUMENT",
            Status::INVALID_STATE => "INVALID_STATE",
            Status::INVALID_VERSION => "INVALID_VERSION",
            Status::FILE_API_FAILURE => "FILE_API_FAILURE",
            Status::BROKEN_DATA => "BROKEN_DATA",
            Status::OUT_OF_MEMORY => "OUT_OF_MEMORY",
            Status::OTHER => "OTHER",
            _ => return write!(f, "UNKNOWN({})", self.0),
        };
        f.write_str(name)
    }
}

/// Pixel layout the engine writes into fetched images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// 32 bits per pixel, B, G, R, A order
    Bgra,
    /// 32 bits per pixel, R, G, B, A order
    #[default]
    Rgba,
}

impl ImageFormat {
    /// Raw value passed to `create`.
    pub fn code(self) -> i32 {
        match self {
            ImageFormat::Bgra => 0,
            ImageFormat::Rgba => 1,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(ImageFormat::Bgra),
            1 => Some(ImageFormat::Rgba),
            _ => None,
        }
    }
}

/// Worker thread selection for the engine's internal decoding threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThreadCount {
    /// Let the engine pick
    #[default]
    Auto,
    /// Explicit, positive thread count
    Fixed(u32),
}

impl ThreadCount {
    /// `0` means automatic, anything else is an explicit count.
    pub fn from_config(threads: u32) -> Self {
        if threads == 0 {
            ThreadCount::Auto
        } else {
            ThreadCount::Fixed(threads)
        }
    }

    pub fn code(self) -> i32 {
        match self {
            ThreadCount::Auto => 0,
            ThreadCount::Fixed(n) => n.min(i32::MAX as u32) as i32,
        }
    }
}

/// Stream-type flag bits reported in [`MovieInfo::flags`].
pub struct StreamType;

impl StreamType {
    /// RGB-only stream
    pub const RGB: u32 = 0x00;
    /// Mask selecting the image kind
    pub const IMAGE_MASK: u32 = 0x0f;
    /// Set when the stream carries an alpha channel
    pub const ALPHA_MASK: u32 = 0x10;
}

/// Stream metadata, fetched once after opening.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MovieInfo {
    /// Horizontal pixel count
    pub width: u32,
    /// Line count
    pub height: u32,
    /// Stream image format
    pub image_format: u32,
    /// Number of frames in the movie
    pub total_frames: u32,
    /// Frame rate numerator (frames per second)
    pub fps_numerator: u32,
    /// Frame rate denominator
    pub fps_denominator: u32,
    /// OR of [`StreamType`] flags
    pub flags: u32,
}

impl MovieInfo {
    /// Frames per second; `1.0` when the denominator is zero.
    pub fn frame_rate(&self) -> f32 {
        if self.fps_denominator == 0 {
            return 1.0;
        }
        self.fps_numerator as f32 / self.fps_denominator as f32
    }

    /// Image kind bits of [`flags`](Self::flags).
    pub fn image_kind(&self) -> u32 {
        self.flags & StreamType::IMAGE_MASK
    }

    pub fn has_alpha(&self) -> bool {
        self.flags & StreamType::ALPHA_MASK != 0
    }

    /// Bytes per line of a fetched image.
    pub fn stride(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }
}

/// Opaque reference to native decoder state.
///
/// Absence is modelled as `Option<RawHandle>` / `Option<DecoderHandle>`;
/// a null pointer is never a valid `RawHandle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawHandle(NonNull<c_void>);

// SAFETY: the handle is an opaque token. Serialising calls on it is the
// responsibility of `DecoderHandle` owners, not of the pointer value.
unsafe impl Send for RawHandle {}
unsafe impl Sync for RawHandle {}

impl RawHandle {
    /// Wrap a pointer returned by the engine; `None` for null.
    pub fn from_ptr(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(RawHandle)
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.0.as_ptr()
    }

    /// Pointer-sized identity, for engines that key state by handle.
    pub fn addr(self) -> usize {
        self.0.as_ptr() as usize
    }
}

/// The fixed call surface of the decoding engine.
///
/// All calls are synchronous and block for the duration of the work.
pub trait NativeDecoder: Send + Sync {
    /// Create a decoder instance writing images in `format`.
    fn create(&self, format: ImageFormat, threads: ThreadCount) -> std::result::Result<RawHandle, Status>;

    /// Open a movie from a named file.
    fn open_file(&self, handle: RawHandle, path: &Path) -> Status;

    /// Open a movie from memory.
    ///
    /// # Contract
    ///
    /// The engine keeps reading from `data` after this call returns; the
    /// bytes must stay alive at the same address until [`destroy`](Self::destroy).
    /// [`DecoderHandle`] upholds this by owning the source.
    fn open_memory(&self, handle: RawHandle, data: &[u8]) -> Status;

    /// Decode frame `index` into the engine's internal buffer.
    fn decode(&self, handle: RawHandle, index: i32) -> Status;

    /// Copy the last decoded frame into `image`, `stride` bytes per line.
    fn fetch_image(&self, handle: RawHandle, image: &mut [u8], stride: usize) -> Status;

    /// Fetch stream metadata. `version` must be [`MOVIE_INFO_VERSION`].
    fn movie_info(&self, handle: RawHandle, version: i32) -> std::result::Result<MovieInfo, Status>;

    /// Release the decoder instance. The handle is invalid afterwards.
    fn destroy(&self, handle: RawHandle);
}
