//! RAII ownership of a native decoder instance.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use log::{debug, trace};

use super::{ImageFormat, MovieInfo, NativeDecoder, RawHandle, Status, ThreadCount, MOVIE_INFO_VERSION};
use crate::utils::error::{PlayerError, Result};

/// A live decoder instance.
///
/// Dropping the handle destroys the native instance and only then frees the
/// in-memory source it may have been opened from, so the engine never sees
/// the source bytes move or disappear while it can still read them.
///
/// `DecoderHandle` is `Send` but calls take `&self`; callers that share it
/// between threads must serialise access (the movie controller keeps it
/// behind a mutex).
pub struct DecoderHandle {
    engine: Arc<dyn NativeDecoder>,
    raw: RawHandle,
    format: ImageFormat,
    /// Boxed so its address is independent of where the handle lives.
    source: Option<Box<[u8]>>,
}

impl DecoderHandle {
    /// Create a new native instance.
    pub fn create(engine: Arc<dyn NativeDecoder>, format: ImageFormat, threads: ThreadCount) -> Result<Self> {
        let raw = engine.create(format, threads).map_err(PlayerError::from)?;
        debug!("Created decoder instance {:#x} ({:?}, {:?})", raw.addr(), format, threads);

        Ok(Self {
            engine,
            raw,
            format,
            source: None,
        })
    }

    /// Open a movie from a named file.
    pub fn open_file(&mut self, path: &Path) -> Result<()> {
        self.engine.open_file(self.raw, path).check()
    }

    /// Open a movie from memory. The handle takes ownership of the bytes and
    /// keeps them pinned until it is dropped.
    pub fn open_memory(&mut self, data: impl Into<Box<[u8]>>) -> Result<()> {
        if self.source.is_some() {
            return Err(PlayerError::InvalidState);
        }

        let source = self.source.insert(data.into());
        trace!("Opening {} byte in-memory movie at {:p}", source.len(), source.as_ptr());
        self.engine.open_memory(self.raw, source).check()
    }

    /// Decode one frame. The status is returned verbatim so it can be carried
    /// across threads.
    pub fn decode(&self, index: i32) -> Status {
        self.engine.decode(self.raw, index)
    }

    /// Copy the last decoded frame into `image`.
    pub fn fetch_image(&self, image: &mut [u8], stride: usize) -> Status {
        self.engine.fetch_image(self.raw, image, stride)
    }

    /// Fetch stream metadata at the layout version this crate understands.
    pub fn movie_info(&self) -> Result<MovieInfo> {
        self.engine
            .movie_info(self.raw, MOVIE_INFO_VERSION)
            .map_err(PlayerError::from)
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn raw(&self) -> RawHandle {
        self.raw
    }
}

impl fmt::Debug for DecoderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoderHandle")
            .field("raw", &format_args!("{:#x}", self.raw.addr()))
            .field("format", &self.format)
            .field("source_len", &self.source.as_ref().map(|s| s.len()))
            .finish()
    }
}

impl Drop for DecoderHandle {
    fn drop(&mut self) {
        debug!("Destroying decoder instance {:#x}", self.raw.addr());
        self.engine.destroy(self.raw);
        // `source` is dropped after this body returns
    }
}
