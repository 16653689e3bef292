//! Movie controller for h2md-player
//!
//! [`MovieController`] is the only type callers drive directly. It owns the
//! native decoder handle, the frame buffer and the display surface, and
//! switches between blocking decodes on the caller's thread and requests
//! routed through the background [`AsyncDecoder`].
//!
//! The handle lives behind a mutex shared with the worker. In sync mode
//! only the caller's thread uses it; in async mode only the worker calls
//! into the engine, and it decodes and fetches the pixels of a frame in one
//! critical section so a result always carries the pixels of its own frame.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use log::{debug, info, trace, warn};
use parking_lot::Mutex;

use crate::decoder::{AsyncDecoder, DecodePoll, DecodedFrame, Submission, DEFAULT_DRAIN_WARN};
use crate::native::{DecoderHandle, ImageFormat, MovieInfo, NativeDecoder, ThreadCount};
use crate::player::{DecodeMode, MovieState, PlaybackStats};
use crate::renderer::{DisplaySurface, FrameBuffer, SharedSurface};
use crate::utils::config::DecoderConfig;
use crate::utils::error::{PlayerError, Result};

/// Recycled staging buffers kept between async frames
const STAGING_POOL_SIZE: usize = 2;

/// Settings fixed at controller construction.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerOptions {
    /// Pixel layout requested from the engine
    pub image_format: ImageFormat,

    /// Engine-internal decoding threads
    pub threads: ThreadCount,

    /// Initial decode mode
    pub async_decode: bool,

    /// Interval after which a slow shutdown drain is logged
    pub drain_warn: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            image_format: ImageFormat::Rgba,
            threads: ThreadCount::Auto,
            async_decode: false,
            drain_warn: DEFAULT_DRAIN_WARN,
        }
    }
}

impl From<&DecoderConfig> for ControllerOptions {
    fn from(config: &DecoderConfig) -> Self {
        Self {
            image_format: config.image_format,
            threads: ThreadCount::from_config(config.threads),
            async_decode: config.async_decode,
            drain_warn: Duration::from_millis(config.drain_warn_ms),
        }
    }
}

/// Plays one movie at a time through a native decoder.
pub struct MovieController {
    engine: Arc<dyn NativeDecoder>,
    options: ControllerOptions,
    state: MovieState,
    mode: DecodeMode,

    /// Shared with the decode worker while it runs
    handle: Option<Arc<Mutex<DecoderHandle>>>,
    info: Option<MovieInfo>,

    /// Sync-mode fetch target
    frame_buffer: FrameBuffer,
    surface: Option<SharedSurface>,
    /// Last frame decoded successfully in sync mode
    last_decoded: Option<i32>,

    coordinator: AsyncDecoder<DecodedFrame>,
    staging_tx: Sender<FrameBuffer>,
    staging_rx: Receiver<FrameBuffer>,

    stats: PlaybackStats,
}

impl MovieController {
    pub fn new(engine: Arc<dyn NativeDecoder>) -> Self {
        Self::with_options(engine, ControllerOptions::default())
    }

    pub fn with_options(engine: Arc<dyn NativeDecoder>, options: ControllerOptions) -> Self {
        let (staging_tx, staging_rx) = crossbeam_channel::bounded(STAGING_POOL_SIZE);
        Self {
            engine,
            mode: DecodeMode::from_async(options.async_decode),
            coordinator: AsyncDecoder::with_drain_warning(options.drain_warn),
            options,
            state: MovieState::Unopened,
            handle: None,
            info: None,
            frame_buffer: FrameBuffer::new(),
            surface: None,
            last_decoded: None,
            staging_tx,
            staging_rx,
            stats: PlaybackStats::default(),
        }
    }

    /// Open a movie file. Returns the display surface, or `None` on any
    /// failure (the cause is logged).
    pub fn open(&mut self, path: &Path) -> Option<SharedSurface> {
        self.try_open(path)
            .map_err(|e| warn!("Failed to open {}: {}", path.display(), e))
            .ok()
    }

    /// Open a movie held in memory. The controller keeps the bytes alive and
    /// unmoved until the movie is disposed.
    pub fn open_from_memory(&mut self, data: impl Into<Box<[u8]>>) -> Option<SharedSurface> {
        self.try_open_from_memory(data)
            .map_err(|e| warn!("Failed to open in-memory movie: {}", e))
            .ok()
    }

    /// Like [`open`](Self::open) but reports why opening failed.
    pub fn try_open(&mut self, path: &Path) -> Result<SharedSurface> {
        info!("Opening movie {}", path.display());
        self.open_with(|handle| handle.open_file(path))
    }

    /// Like [`open_from_memory`](Self::open_from_memory) but reports why
    /// opening failed.
    pub fn try_open_from_memory(&mut self, data: impl Into<Box<[u8]>>) -> Result<SharedSurface> {
        let data = data.into();
        info!("Opening {} byte in-memory movie", data.len());
        self.open_with(move |handle| handle.open_memory(data))
    }

    fn open_with(&mut self, open: impl FnOnce(&mut DecoderHandle) -> Result<()>) -> Result<SharedSurface> {
        self.dispose();
        self.state = MovieState::Opening;

        let opened = DecoderHandle::create(Arc::clone(&self.engine), self.options.image_format, self.options.threads)
            .and_then(|mut handle| {
                open(&mut handle)?;
                let info = handle.movie_info()?;
                Ok((handle, info))
            });

        // a failed step drops the half-opened handle here
        let (handle, info) = match opened {
            Ok(opened) => opened,
            Err(e) => {
                self.state = MovieState::Unopened;
                return Err(e);
            }
        };

        self.frame_buffer.ensure_layout(info.width, info.height);
        let surface = DisplaySurface::shared(info.width, info.height, self.options.image_format);

        info!(
            "Movie ready: {}x{}, {} frames at {:.2} fps{}",
            info.width,
            info.height,
            info.total_frames,
            info.frame_rate(),
            if info.has_alpha() { ", alpha" } else { "" }
        );

        self.handle = Some(Arc::new(Mutex::new(handle)));
        self.info = Some(info);
        self.surface = Some(Arc::clone(&surface));
        self.state = MovieState::Ready(self.mode);
        Ok(surface)
    }

    /// Choose the decode mode used from the next `decode` on.
    ///
    /// Switching is refused with `InvalidState` once async decoding has
    /// started for the current movie.
    pub fn set_async_mode(&mut self, enabled: bool) -> Result<()> {
        let mode = DecodeMode::from_async(enabled);
        if mode == self.mode {
            return Ok(());
        }
        if self.coordinator.is_running() {
            warn!("Cannot switch decode mode while the decode worker is running");
            return Err(PlayerError::InvalidState);
        }

        debug!("Decode mode {:?} -> {:?}", self.mode, mode);
        self.mode = mode;
        if self.state.is_ready() {
            self.state = MovieState::Ready(mode);
        }
        Ok(())
    }

    /// Decode frame `frame`.
    ///
    /// In sync mode this blocks for the native call and returns its status.
    /// In async mode it only offers the frame to the worker and returns
    /// immediately; a frame offered while another is pending is dropped.
    pub fn decode(&mut self, frame: i32) -> Result<()> {
        let Some(handle) = self.handle.as_ref() else {
            return Err(PlayerError::InvalidState);
        };

        match self.mode {
            DecodeMode::Sync => {
                self.stats.decodes_requested += 1;
                let status = handle.lock().decode(frame);
                if status.is_success() {
                    self.stats.decodes_completed += 1;
                    self.last_decoded = Some(frame);
                } else {
                    self.stats.decodes_failed += 1;
                    debug!("Decoding frame {} failed: {}", frame, status);
                }
                status.check()
            }
            DecodeMode::Async => {
                if !self.coordinator.is_running() {
                    self.start_worker()?;
                }
                match self.coordinator.submit(frame)? {
                    Submission::Accepted => self.stats.decodes_requested += 1,
                    Submission::Dropped => self.stats.submissions_dropped += 1,
                }
                Ok(())
            }
        }
    }

    fn start_worker(&mut self) -> Result<()> {
        let (Some(handle), Some(info)) = (self.handle.as_ref(), self.info) else {
            return Err(PlayerError::InvalidState);
        };
        let handle = Arc::clone(handle);
        let staging = self.staging_rx.clone();

        self.coordinator.start(move |frame| {
            let handle = handle.lock();
            let status = handle.decode(frame);
            if !status.is_success() {
                return DecodedFrame::failed(status);
            }

            let mut buffer = staging.try_recv().unwrap_or_default();
            buffer.ensure_layout(info.width, info.height);
            let stride = buffer.stride();
            let status = handle.fetch_image(buffer.acquire_stable_buffer(), stride);
            if !status.is_success() {
                return DecodedFrame::failed(status);
            }

            DecodedFrame {
                status,
                pixels: Some(buffer),
            }
        })
    }

    /// Bring the display surface up to date.
    ///
    /// Sync mode fetches the last decoded frame and transfers it. Async mode
    /// polls the worker: no result yet is a successful no-op, a failed
    /// result returns its status and leaves the surface untouched.
    pub fn get_image(&mut self) -> Result<()> {
        let (Some(handle), Some(surface)) = (self.handle.as_ref(), self.surface.as_ref()) else {
            return Err(PlayerError::InvalidState);
        };

        match self.mode {
            DecodeMode::Sync => {
                let stride = self.frame_buffer.stride();
                let status = handle.lock().fetch_image(self.frame_buffer.acquire_stable_buffer(), stride);
                if !status.is_success() {
                    debug!("Fetching image failed: {}", status);
                    return status.check();
                }

                surface.write().transfer(self.last_decoded, &self.frame_buffer)?;
                self.stats.images_transferred += 1;
                Ok(())
            }
            DecodeMode::Async => match self.coordinator.poll() {
                DecodePoll::NotRunning => Err(PlayerError::InvalidState),
                DecodePoll::Pending => Ok(()),
                DecodePoll::Ready { frame, output } => {
                    let Some(pixels) = output.pixels else {
                        self.stats.decodes_failed += 1;
                        debug!("Async decode of frame {} failed: {}", frame, output.status);
                        return output.status.check();
                    };

                    self.stats.decodes_completed += 1;
                    surface.write().transfer(Some(frame), &pixels)?;
                    self.stats.images_transferred += 1;
                    trace!("Frame {} transferred", frame);

                    // pool full means the buffer is simply freed
                    let _ = self.staging_tx.try_send(pixels);
                    Ok(())
                }
            },
        }
    }

    /// Whether `get_image` would have something to show: always in sync
    /// mode, only with a waiting result in async mode.
    pub fn is_ready_get_image(&self) -> bool {
        if self.handle.is_none() {
            return false;
        }
        match self.mode {
            DecodeMode::Sync => true,
            DecodeMode::Async => self.coordinator.has_result(),
        }
    }

    /// Frame count of the open movie, 0 when none is open.
    pub fn total_frames(&self) -> u32 {
        self.info.map_or(0, |info| info.total_frames)
    }

    /// Frames per second of the open movie; `1.0` when unknown.
    pub fn frame_rate(&self) -> f32 {
        self.info.unwrap_or_default().frame_rate()
    }

    pub fn movie_info(&self) -> Option<MovieInfo> {
        self.info
    }

    pub fn surface(&self) -> Option<SharedSurface> {
        self.surface.clone()
    }

    pub fn state(&self) -> MovieState {
        self.state
    }

    pub fn decode_mode(&self) -> DecodeMode {
        self.mode
    }

    pub fn stats(&self) -> PlaybackStats {
        self.stats
    }

    /// Release the movie.
    ///
    /// Drains the decode worker first, so no native call is in flight when
    /// the handle is destroyed. Idempotent.
    pub fn dispose(&mut self) {
        self.coordinator.stop();

        if let Some(handle) = self.handle.take() {
            // the worker's clone went away when it was joined
            debug_assert_eq!(Arc::strong_count(&handle), 1);
            drop(handle);
            self.state = MovieState::Disposed;
            info!("Movie disposed");
        }

        while self.staging_rx.try_recv().is_ok() {}
        self.frame_buffer.release();
        self.surface = None;
        self.info = None;
        self.last_decoded = None;
    }
}

impl Drop for MovieController {
    fn drop(&mut self) {
        self.dispose();
    }
}
