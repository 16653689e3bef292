//! Error types for h2md-player
//!
//! Native status codes from the decoding engine map one-to-one onto
//! [`PlayerError`] variants so they can travel through `?` and come back
//! out unchanged via [`PlayerError::status`].

use crate::native::Status;
use thiserror::Error;

/// Main error type for h2md-player
#[derive(Error, Debug)]
pub enum PlayerError {
    /// An argument was rejected (bad frame index, undersized buffer)
    #[error("Invalid argument")]
    InvalidArgument,

    /// The operation is not valid in the current lifecycle phase
    #[error("Invalid state")]
    InvalidState,

    /// The stream or the movie info structure has an unsupported version
    #[error("Unsupported version")]
    InvalidVersion,

    /// The movie source could not be read
    #[error("File API failure")]
    FileApi,

    /// The stream is malformed
    #[error("Broken movie data")]
    BrokenData,

    /// The decoding engine ran out of memory
    #[error("Out of memory")]
    OutOfMemory,

    /// Any other status reported by the decoding engine
    #[error("Decoder error (status {0})")]
    Other(i32),

    /// The native decoder library could not be loaded
    #[error("Library error: {0}")]
    Library(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File error: {0}")]
    FileIO(#[from] std::io::Error),
}

impl PlayerError {
    /// The native status code this error corresponds to.
    ///
    /// Errors that did not originate in the decoding engine report
    /// [`Status::OTHER`].
    pub fn status(&self) -> Status {
        match self {
            PlayerError::InvalidArgument => Status::INVALID_ARGUMENT,
            PlayerError::InvalidState => Status::INVALID_STATE,
            PlayerError::InvalidVersion => Status::INVALID_VERSION,
            PlayerError::FileApi => Status::FILE_API_FAILURE,
            PlayerError::BrokenData => Status::BROKEN_DATA,
            PlayerError::OutOfMemory => Status::OUT_OF_MEMORY,
            PlayerError::Other(code) => Status::from_raw(*code),
            PlayerError::Library(_) | PlayerError::Config(_) | PlayerError::FileIO(_) => Status::OTHER,
        }
    }
}

impl From<Status> for PlayerError {
    /// Convert a failing status into an error.
    ///
    /// `Status::SUCCESS` has no error counterpart and ends up as `Other(0)`;
    /// use [`Status::check`] when the status may be a success.
    fn from(status: Status) -> Self {
        match status {
            Status::INVALID_ARGUMENT => PlayerError::InvalidArgument,
            Status::INVALID_STATE => PlayerError::InvalidState,
            Status::INVALID_VERSION => PlayerError::InvalidVersion,
            Status::FILE_API_FAILURE => PlayerError::FileApi,
            Status::BROKEN_DATA => PlayerError::BrokenData,
            Status::OUT_OF_MEMORY => PlayerError::OutOfMemory,
            other => PlayerError::Other(other.code()),
        }
    }
}

impl From<libloading::Error> for PlayerError {
    fn from(err: libloading::Error) -> Self {
        PlayerError::Library(err.to_string())
    }
}

/// Convenience type alias for Results in h2md-player
pub type Result<T> = std::result::Result<T, PlayerError>;

/// Extension trait for converting other errors to PlayerError
pub trait IntoPlayerError<T> {
    /// Convert this error into a configuration error with the given context
    fn config_err(self, context: &str) -> Result<T>;

    /// Convert this error into a library error with the given context
    fn library_err(self, context: &str) -> Result<T>;
}

impl<T, E: std::fmt::Display> IntoPlayerError<T> for std::result::Result<T, E> {
    fn config_err(self, context: &str) -> Result<T> {
        self.map_err(|e| PlayerError::Config(format!("{}: {}", context, e)))
    }

    fn library_err(self, context: &str) -> Result<T> {
        self.map_err(|e| PlayerError::Library(format!("{}: {}", context, e)))
    }
}
