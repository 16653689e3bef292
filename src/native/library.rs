//! Runtime bindings for the `h2md_dec` shared library.
//!
//! The engine is loaded dynamically with `libloading`, so the player builds
//! and tests without the proprietary binary present.

use std::ffi::{c_char, c_void, CString};
use std::fmt;
use std::path::Path;

use libloading::Library;
use log::{debug, info, warn};

use super::{ImageFormat, MovieInfo, NativeDecoder, RawHandle, Status, ThreadCount};
use crate::utils::error::{IntoPlayerError, Result};

type CreateFn = unsafe extern "C" fn(decoder: *mut *mut c_void, image_type: i32, num_thread: i32) -> i32;
type DestroyFn = unsafe extern "C" fn(decoder: *mut c_void);
type OpenFileFn = unsafe extern "C" fn(decoder: *mut c_void, strm_filename: *const c_char) -> i32;
type OpenMemFn = unsafe extern "C" fn(decoder: *mut c_void, code: *const c_void, code_size: i32) -> i32;
type DecodeFn = unsafe extern "C" fn(decoder: *mut c_void, index: i32) -> i32;
type GetImageFn = unsafe extern "C" fn(decoder: *mut c_void, image: *mut c_void, buf_size: i32, image_stride: i32) -> i32;
type GetMovieInfoFn = unsafe extern "C" fn(decoder: *mut c_void, info: *mut MovieInfo, version: i32) -> i32;

/// Function table of the loaded engine.
pub struct NativeLibrary {
    /// Keeps the shared library mapped for as long as the pointers live
    _lib: Library,

    h2md_create: CreateFn,
    h2md_destroy: DestroyFn,
    h2md_open_stream_file: OpenFileFn,
    h2md_open_stream_mem: OpenMemFn,
    h2md_decode: DecodeFn,
    h2md_get_image: GetImageFn,
    h2md_get_movie_info: GetMovieInfoFn,
}

impl fmt::Debug for NativeLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeLibrary").finish_non_exhaustive()
    }
}

impl NativeLibrary {
    /// Platform file name of the engine.
    pub fn library_name() -> String {
        libloading::library_filename("h2md_dec").to_string_lossy().into_owned()
    }

    /// Load the engine from the default search path.
    pub fn load() -> Result<Self> {
        let name = Self::library_name();
        // SAFETY: loading runs the library's initialisers; the H2MD engine
        // has none with observable side effects.
        let lib = unsafe { Library::new(&name) }.library_err(&format!("Failed to load {}", name))?;
        info!("Loaded decoder library {}", name);
        Self::bind(lib)
    }

    /// Load the engine from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        // SAFETY: see `load`.
        let lib = unsafe { Library::new(path) }.library_err(&format!("Failed to load {}", path.display()))?;
        info!("Loaded decoder library {}", path.display());
        Self::bind(lib)
    }

    /// Load from `path` when given, from the default search path otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => Self::load(),
        }
    }

    fn bind(lib: Library) -> Result<Self> {
        // SAFETY: the signatures below match the engine's C header. The
        // copied function pointers stay valid because `_lib` is stored
        // alongside them and unloaded only when `Self` is dropped.
        unsafe {
            let h2md_create = *lib.get::<CreateFn>(b"h2mdCreate\0")?;
            let h2md_destroy = *lib.get::<DestroyFn>(b"h2mdDestroy\0")?;
            let h2md_open_stream_file = *lib.get::<OpenFileFn>(b"h2mdOpenStreamFileA\0")?;
            let h2md_open_stream_mem = *lib.get::<OpenMemFn>(b"h2mdOpenStreamMem\0")?;
            let h2md_decode = *lib.get::<DecodeFn>(b"h2mdDecode\0")?;
            let h2md_get_image = *lib.get::<GetImageFn>(b"h2mdGetImage\0")?;
            let h2md_get_movie_info = *lib.get::<GetMovieInfoFn>(b"h2mdGetMovieInfo\0")?;

            debug!("Resolved all h2md entry points");

            Ok(Self {
                _lib: lib,
                h2md_create,
                h2md_destroy,
                h2md_open_stream_file,
                h2md_open_stream_mem,
                h2md_decode,
                h2md_get_image,
                h2md_get_movie_info,
            })
        }
    }
}

/// Sizes cross the boundary as `i32`.
fn to_c_size(len: usize) -> Option<i32> {
    i32::try_from(len).ok()
}

impl NativeDecoder for NativeLibrary {
    fn create(&self, format: ImageFormat, threads: ThreadCount) -> std::result::Result<RawHandle, Status> {
        let mut decoder: *mut c_void = std::ptr::null_mut();
        // SAFETY: `decoder` is a valid out-pointer for the duration of the call.
        let status = Status::from_raw(unsafe { (self.h2md_create)(&mut decoder, format.code(), threads.code()) });
        if !status.is_success() {
            return Err(status);
        }
        RawHandle::from_ptr(decoder).ok_or(Status::OTHER)
    }

    fn open_file(&self, handle: RawHandle, path: &Path) -> Status {
        let Ok(path) = CString::new(path.to_string_lossy().into_owned()) else {
            warn!("Movie path contains an interior NUL byte");
            return Status::INVALID_ARGUMENT;
        };
        // SAFETY: `handle` came from `create` and `path` is NUL terminated.
        Status::from_raw(unsafe { (self.h2md_open_stream_file)(handle.as_ptr(), path.as_ptr()) })
    }

    fn open_memory(&self, handle: RawHandle, data: &[u8]) -> Status {
        let Some(len) = to_c_size(data.len()) else {
            return Status::INVALID_ARGUMENT;
        };
        // SAFETY: the pointer/length pair describes `data`; keeping it alive
        // afterwards is part of the trait contract.
        Status::from_raw(unsafe { (self.h2md_open_stream_mem)(handle.as_ptr(), data.as_ptr().cast(), len) })
    }

    fn decode(&self, handle: RawHandle, index: i32) -> Status {
        // SAFETY: `handle` came from `create`.
        Status::from_raw(unsafe { (self.h2md_decode)(handle.as_ptr(), index) })
    }

    fn fetch_image(&self, handle: RawHandle, image: &mut [u8], stride: usize) -> Status {
        let (Some(len), Some(stride)) = (to_c_size(image.len()), to_c_size(stride)) else {
            return Status::INVALID_ARGUMENT;
        };
        // SAFETY: `image` is exclusively borrowed for the whole call, so its
        // address is stable and nothing else reads or writes it meanwhile.
        Status::from_raw(unsafe { (self.h2md_get_image)(handle.as_ptr(), image.as_mut_ptr().cast(), len, stride) })
    }

    fn movie_info(&self, handle: RawHandle, version: i32) -> std::result::Result<MovieInfo, Status> {
        let mut info = MovieInfo::default();
        // SAFETY: `MovieInfo` is `repr(C)` with the engine's field layout.
        let status = Status::from_raw(unsafe { (self.h2md_get_movie_info)(handle.as_ptr(), &mut info, version) });
        if status.is_success() {
            Ok(info)
        } else {
            Err(status)
        }
    }

    fn destroy(&self, handle: RawHandle) {
        // SAFETY: `handle` came from `create` and is not used after this call.
        unsafe { (self.h2md_destroy)(handle.as_ptr()) }
    }
}
