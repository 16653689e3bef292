//! Integration test utilities for h2md-player
//!
//! This module provides common utilities for integration testing including:
//! - Synthetic movie files written to a temporary directory
//! - A mock of the native decoder call surface
//! - Helpers for waiting on async results and checking surface contents

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

use h2md_player::native::{SyntheticDecoder, SyntheticMovie, SyntheticProbe};
use h2md_player::renderer::SharedSurface;
use h2md_player::{ControllerOptions, ImageFormat, MovieController};

/// Test fixture for integration tests
pub struct TestFixture {
    pub temp_dir: TempDir,
    pub movies: MovieFiles,
}

/// Collection of movie files on disk
pub struct MovieFiles {
    /// 4x3, two frames at 30 fps
    pub two_frames: PathBuf,
    /// 16x8, 60 frames at 30000/1001 fps with alpha
    pub long_alpha: PathBuf,
    /// Garbage bytes
    pub broken: PathBuf,
    /// Valid header with an unknown stream version
    pub future_version: PathBuf,
}

impl TestFixture {
    /// Create a new fixture with generated movie files
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let movies = MovieFiles::generate(temp_dir.path())?;

        Ok(Self { temp_dir, movies })
    }

    /// Get the path to the temporary directory
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }
}

impl MovieFiles {
    fn generate(dir: &Path) -> Result<Self> {
        let two_frames = write(dir, "two_frames.h2md", &two_frame_movie().encode())?;
        let long_alpha = write(dir, "long_alpha.h2md", &long_alpha_movie().encode())?;
        let broken = write(dir, "broken.h2md", b"not an h2md stream")?;
        let future_version = write(
            dir,
            "future.h2md",
            &SyntheticMovie::new(4, 4, 1).with_version(2).encode(),
        )?;

        Ok(Self {
            two_frames,
            long_alpha,
            broken,
            future_version,
        })
    }
}

fn write(dir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, bytes)?;
    Ok(path)
}

pub fn two_frame_movie() -> SyntheticMovie {
    SyntheticMovie::new(4, 3, 2)
}

pub fn long_alpha_movie() -> SyntheticMovie {
    SyntheticMovie::new(16, 8, 60).with_frame_rate(30000, 1001).with_flags(0x10)
}

/// A controller backed by a fresh synthetic engine, plus its probe
pub fn synthetic_controller(options: ControllerOptions) -> (MovieController, Arc<SyntheticProbe>) {
    let engine = Arc::new(SyntheticDecoder::new());
    let probe = engine.probe();
    (MovieController::with_options(engine, options), probe)
}

pub fn async_options() -> ControllerOptions {
    ControllerOptions {
        async_decode: true,
        drain_warn: Duration::from_millis(20),
        ..Default::default()
    }
}

/// Spin until `condition` holds, failing after `timeout`
pub fn wait_until(timeout: Duration, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + timeout;
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached within {:?}", timeout);
        thread::sleep(Duration::from_millis(1));
    }
}

/// Wait for the async result, then run `get_image`
pub fn wait_for_image(controller: &mut MovieController) -> h2md_player::Result<()> {
    wait_until(Duration::from_secs(5), || controller.is_ready_get_image());
    controller.get_image()
}

/// Assert that `surface` shows `frame` of `movie`
pub fn assert_shows_frame(surface: &SharedSurface, movie: &SyntheticMovie, frame: i32, format: ImageFormat) {
    let surface = surface.read();
    assert_eq!((surface.width(), surface.height()), (movie.width, movie.height));
    assert!(
        surface.pixels() == &movie.expected_image(frame, format)[..],
        "surface does not show frame {} (shows {:?})",
        frame,
        surface.frame()
    );
}

/// Mock of the native decoder call surface
pub mod mock_engine {
    use h2md_player::native::RawHandle;
    use h2md_player::{ImageFormat, MovieInfo, NativeDecoder, Status, ThreadCount};
    use mockall::mock;
    use std::path::Path;

    mock! {
        pub Engine {}

        impl NativeDecoder for Engine {
            fn create(&self, format: ImageFormat, threads: ThreadCount) -> Result<RawHandle, Status>;
            fn open_file(&self, handle: RawHandle, path: &Path) -> Status;
            fn open_memory(&self, handle: RawHandle, data: &[u8]) -> Status;
            fn decode(&self, handle: RawHandle, index: i32) -> Status;
            fn fetch_image(&self, handle: RawHandle, image: &mut [u8], stride: usize) -> Status;
            fn movie_info(&self, handle: RawHandle, version: i32) -> Result<MovieInfo, Status>;
            fn destroy(&self, handle: RawHandle);
        }
    }

    /// A fake non-null handle value
    pub fn fake_handle() -> RawHandle {
        RawHandle::from_ptr(0x1000 as *mut std::ffi::c_void).expect("non-null")
    }

    /// Metadata of a small 30 fps movie
    pub fn small_info(total_frames: u32) -> MovieInfo {
        MovieInfo {
            width: 2,
            height: 2,
            image_format: 0,
            total_frames,
            fps_numerator: 30,
            fps_denominator: 1,
            flags: 0,
        }
    }

    /// An engine where create/open/movie_info succeed and destroy is
    /// expected exactly once
    pub fn opening_engine(total_frames: u32) -> MockEngine {
        let mut engine = MockEngine::new();
        engine.expect_create().times(1).returning(|_, _| Ok(fake_handle()));
        engine.expect_open_memory().returning(|_, _| Status::SUCCESS);
        engine
            .expect_movie_info()
            .returning(move |_, _| Ok(small_info(total_frames)));
        engine.expect_destroy().times(1).return_const(());
        engine
    }
}
