//! In-process test-pattern engine.
//!
//! Reads a tiny synthetic stream (a fixed 32-byte header, no payload) and
//! "decodes" frames into a deterministic pattern: the pixel at `(x, y)` of
//! frame `f` has red = `f`, green = `x`, blue = `y` (low bytes) and alpha 255.
//! It follows the same status rules as the real engine, which makes it the
//! fixture for the controller tests and the `--synthetic` mode of the CLI.
//!
//! [`SyntheticProbe`] exposes what the engine observed: the order of decode
//! requests, how many calls overlapped, and whether an instance was destroyed
//! while a call was still running.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use byteorder::{ByteOrder, LittleEndian};
use log::trace;
use parking_lot::Mutex;

use super::{ImageFormat, MovieInfo, NativeDecoder, RawHandle, Status, ThreadCount, BYTES_PER_PIXEL, MOVIE_INFO_VERSION};

const MAGIC: &[u8; 4] = b"H2SY";
const HEADER_LEN: usize = 32;

/// Description of a synthetic stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntheticMovie {
    pub version: u32,
    pub width: u32,
    pub height: u32,
    pub total_frames: u32,
    pub fps_numerator: u32,
    pub fps_denominator: u32,
    pub flags: u32,
}

impl SyntheticMovie {
    /// A 30 fps RGB stream.
    pub fn new(width: u32, height: u32, total_frames: u32) -> Self {
        Self {
            version: MOVIE_INFO_VERSION as u32,
            width,
            height,
            total_frames,
            fps_numerator: 30,
            fps_denominator: 1,
            flags: super::StreamType::RGB,
        }
    }

    pub fn with_frame_rate(mut self, numerator: u32, denominator: u32) -> Self {
        self.fps_numerator = numerator;
        self.fps_denominator = denominator;
        self
    }

    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Serialise into the on-disk stream format.
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; HEADER_LEN];
        bytes[..4].copy_from_slice(MAGIC);
        let fields = [
            self.version,
            self.width,
            self.height,
            self.total_frames,
            self.fps_numerator,
            self.fps_denominator,
            self.flags,
        ];
        LittleEndian::write_u32_into(&fields, &mut bytes[4..]);
        bytes
    }

    /// Parse a stream header.
    pub fn parse(data: &[u8]) -> Result<Self, Status> {
        if data.len() < HEADER_LEN || &data[..4] != MAGIC {
            return Err(Status::BROKEN_DATA);
        }

        let mut fields = [0u32; 7];
        LittleEndian::read_u32_into(&data[4..HEADER_LEN], &mut fields);
        let [version, width, height, total_frames, fps_numerator, fps_denominator, flags] = fields;

        if version != MOVIE_INFO_VERSION as u32 {
            return Err(Status::INVALID_VERSION);
        }
        if width == 0 || height == 0 {
            return Err(Status::BROKEN_DATA);
        }

        Ok(Self {
            version,
            width,
            height,
            total_frames,
            fps_numerator,
            fps_denominator,
            flags,
        })
    }

    pub fn info(&self) -> MovieInfo {
        MovieInfo {
            width: self.width,
            height: self.height,
            image_format: self.flags & super::StreamType::IMAGE_MASK,
            total_frames: self.total_frames,
            fps_numerator: self.fps_numerator,
            fps_denominator: self.fps_denominator,
            flags: self.flags,
        }
    }

    /// The pixel the engine produces for `frame` at `(x, y)`.
    pub fn pixel(frame: i32, x: u32, y: u32, format: ImageFormat) -> [u8; 4] {
        let (r, g, b) = (frame as u8, x as u8, y as u8);
        match format {
            ImageFormat::Rgba => [r, g, b, 0xff],
            ImageFormat::Bgra => [b, g, r, 0xff],
        }
    }

    /// The full tightly packed image for `frame`.
    pub fn expected_image(&self, frame: i32, format: ImageFormat) -> Vec<u8> {
        let mut image = Vec::with_capacity(self.width as usize * self.height as usize * BYTES_PER_PIXEL);
        for y in 0..self.height {
            for x in 0..self.width {
                image.extend_from_slice(&Self::pixel(frame, x, y, format));
            }
        }
        image
    }
}

/// Observations made by a [`SyntheticDecoder`].
#[derive(Debug, Default)]
pub struct SyntheticProbe {
    decode_log: Mutex<Vec<i32>>,
    decode_delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    overlapping_calls: AtomicUsize,
    finished_decodes: AtomicUsize,
    live_handles: AtomicUsize,
    destroyed_while_busy: AtomicUsize,
}

impl SyntheticProbe {
    /// Frame indices passed to `decode`, in call order.
    pub fn decode_log(&self) -> Vec<i32> {
        self.decode_log.lock().clone()
    }

    /// Make every subsequent decode block for `delay`.
    pub fn set_decode_delay(&self, delay: Duration) {
        *self.decode_delay.lock() = delay;
    }

    /// Calls currently executing inside the engine.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Number of calls that started while another call was running.
    pub fn overlapping_calls(&self) -> usize {
        self.overlapping_calls.load(Ordering::SeqCst)
    }

    /// Decode calls that have returned, successful or not.
    pub fn finished_decodes(&self) -> usize {
        self.finished_decodes.load(Ordering::SeqCst)
    }

    pub fn live_handles(&self) -> usize {
        self.live_handles.load(Ordering::SeqCst)
    }

    /// Number of `destroy` calls issued while another call was running.
    pub fn destroyed_while_busy(&self) -> usize {
        self.destroyed_while_busy.load(Ordering::SeqCst)
    }

    fn enter(&self) -> CallGuard<'_> {
        if self.in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlapping_calls.fetch_add(1, Ordering::SeqCst);
        }
        CallGuard(self)
    }
}

struct CallGuard<'a>(&'a SyntheticProbe);

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug)]
struct Instance {
    format: ImageFormat,
    movie: Option<SyntheticMovie>,
    decoded: Option<i32>,
}

/// Test-pattern implementation of [`NativeDecoder`].
#[derive(Debug)]
pub struct SyntheticDecoder {
    instances: Mutex<HashMap<usize, Instance>>,
    next_id: AtomicUsize,
    probe: Arc<SyntheticProbe>,
}

impl Default for SyntheticDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntheticDecoder {
    pub fn new() -> Self {
        Self {
            instances: Mutex::new(HashMap::new()),
            next_id: AtomicUsize::new(1),
            probe: Arc::new(SyntheticProbe::default()),
        }
    }

    pub fn probe(&self) -> Arc<SyntheticProbe> {
        Arc::clone(&self.probe)
    }

    fn open_with(&self, handle: RawHandle, parsed: Result<SyntheticMovie, Status>) -> Status {
        let mut instances = self.instances.lock();
        let Some(instance) = instances.get_mut(&handle.addr()) else {
            return Status::INVALID_ARGUMENT;
        };
        if instance.movie.is_some() {
            return Status::INVALID_STATE;
        }
        match parsed {
            Ok(movie) => {
                trace!("Synthetic stream opened: {}x{}, {} frames", movie.width, movie.height, movie.total_frames);
                instance.movie = Some(movie);
                Status::SUCCESS
            }
            Err(status) => status,
        }
    }
}

impl NativeDecoder for SyntheticDecoder {
    fn create(&self, format: ImageFormat, _threads: ThreadCount) -> Result<RawHandle, Status> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let handle = RawHandle::from_ptr(id as *mut std::ffi::c_void).ok_or(Status::OTHER)?;

        self.instances.lock().insert(
            handle.addr(),
            Instance {
                format,
                movie: None,
                decoded: None,
            },
        );
        self.probe.live_handles.fetch_add(1, Ordering::SeqCst);
        Ok(handle)
    }

    fn open_file(&self, handle: RawHandle, path: &Path) -> Status {
        let _call = self.probe.enter();
        let parsed = match std::fs::read(path) {
            Ok(bytes) => SyntheticMovie::parse(&bytes),
            Err(_) => Err(Status::FILE_API_FAILURE),
        };
        self.open_with(handle, parsed)
    }

    fn open_memory(&self, handle: RawHandle, data: &[u8]) -> Status {
        let _call = self.probe.enter();
        self.open_with(handle, SyntheticMovie::parse(data))
    }

    fn decode(&self, handle: RawHandle, index: i32) -> Status {
        let _call = self.probe.enter();
        self.probe.decode_log.lock().push(index);

        let total_frames = {
            let instances = self.instances.lock();
            match instances.get(&handle.addr()) {
                None => return Status::INVALID_ARGUMENT,
                Some(Instance { movie: None, .. }) => return Status::INVALID_STATE,
                Some(Instance { movie: Some(movie), .. }) => movie.total_frames,
            }
        };

        let delay = *self.probe.decode_delay.lock();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        let status = if index < 0 || index as u32 >= total_frames {
            Status::INVALID_ARGUMENT
        } else if let Some(instance) = self.instances.lock().get_mut(&handle.addr()) {
            instance.decoded = Some(index);
            Status::SUCCESS
        } else {
            Status::INVALID_STATE
        };

        self.probe.finished_decodes.fetch_add(1, Ordering::SeqCst);
        status
    }

    fn fetch_image(&self, handle: RawHandle, image: &mut [u8], stride: usize) -> Status {
        let _call = self.probe.enter();
        let instances = self.instances.lock();
        let Some(instance) = instances.get(&handle.addr()) else {
            return Status::INVALID_ARGUMENT;
        };
        let (Some(movie), Some(frame)) = (instance.movie, instance.decoded) else {
            return Status::INVALID_STATE;
        };

        let row_bytes = movie.width as usize * BYTES_PER_PIXEL;
        let needed = stride * (movie.height as usize - 1) + row_bytes;
        if stride < row_bytes || image.len() < needed {
            return Status::INVALID_ARGUMENT;
        }

        for y in 0..movie.height {
            let row = &mut image[y as usize * stride..][..row_bytes];
            for (x, pixel) in row.chunks_exact_mut(BYTES_PER_PIXEL).enumerate() {
                pixel.copy_from_slice(&SyntheticMovie::pixel(frame, x as u32, y, instance.format));
            }
        }
        Status::SUCCESS
    }

    fn movie_info(&self, handle: RawHandle, version: i32) -> Result<MovieInfo, Status> {
        let _call = self.probe.enter();
        if version != MOVIE_INFO_VERSION {
            return Err(Status::INVALID_VERSION);
        }
        let instances = self.instances.lock();
        match instances.get(&handle.addr()) {
            None => Err(Status::INVALID_ARGUMENT),
            Some(Instance { movie: None, .. }) => Err(Status::INVALID_STATE),
            Some(Instance { movie: Some(movie), .. }) => Ok(movie.info()),
        }
    }

    fn destroy(&self, handle: RawHandle) {
        if self.probe.in_flight() > 0 {
            self.probe.destroyed_while_busy.fetch_add(1, Ordering::SeqCst);
        }
        if self.instances.lock().remove(&handle.addr()).is_some() {
            self.probe.live_handles.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
