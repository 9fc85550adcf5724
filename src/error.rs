//! Error types for IQX operations.
//!
//! This module provides the [`Error`] enum covering all possible failure modes
//! when working with IQX files, along with a convenient [`Result`] type alias.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for IQX operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during IQX operations.
///
/// I/O errors and format-corruption errors are fatal to the operation in
/// progress and are never retried internally. Capacity limits on the
/// cue/trigger/overrun tables are deliberately *not* errors; exceeding them
/// silently stops recording further entries.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error from the underlying file system.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The path does not refer to a regular file.
    #[error("not a regular file: {path}")]
    NotRegularFile {
        /// The offending path.
        path: PathBuf,
    },

    /// The file is not a valid IQX file or has corrupted contents.
    #[error("invalid IQX file format: {reason}")]
    InvalidFormat {
        /// Description of the format error.
        reason: String,
    },

    /// A frame of one type was expected but another was found.
    #[error("wrong frame type: expected {expected}, found {found}")]
    WrongFrameType {
        /// Expected raw frame-type tag.
        expected: u32,
        /// Frame-type tag actually present in the preamble.
        found: u32,
    },

    /// A frame or header ended before its declared size.
    #[error("{what} incomplete")]
    Incomplete {
        /// What was being read when the file ran out.
        what: &'static str,
    },

    /// A frame declares a size beyond the format maximum.
    #[error("frame size too large: {size} bytes")]
    FrameTooLarge {
        /// The declared size.
        size: u64,
    },

    /// Operation performed in the wrong state (e.g. writing after close,
    /// editing a file opened read-only).
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of the state error.
        message: &'static str,
    },

    /// No stream is registered under the given name.
    #[error("unknown stream: '{name}'")]
    UnknownStream {
        /// The name that was looked up.
        name: String,
    },

    /// A stream index is out of range for this file.
    #[error("no stream with index {index}")]
    InvalidStreamIndex {
        /// The offending index.
        index: usize,
    },

    /// No cue entry exists at or before the requested timestamp.
    #[error("no matching cue entry found at given timestamp")]
    CueNotFound,

    /// A sample window extends beyond the recorded data of a stream.
    #[error("read beyond end of stream {stream}")]
    ReadBeyondEnd {
        /// The stream that was being read.
        stream: usize,
    },

    /// A byte count is not a whole number of bit-packing units.
    #[error("size {size} is not a multiple of {unit} bytes")]
    SizeNotAligned {
        /// The offending byte count.
        size: usize,
        /// The required unit.
        unit: usize,
    },
}

impl Error {
    /// Create an InvalidFormat error with the given reason.
    pub fn invalid_format(reason: impl Into<String>) -> Self {
        Self::InvalidFormat {
            reason: reason.into(),
        }
    }

    /// Create an InvalidState error.
    pub const fn invalid_state(message: &'static str) -> Self {
        Self::InvalidState { message }
    }

    /// Create an Incomplete error.
    pub const fn incomplete(what: &'static str) -> Self {
        Self::Incomplete { what }
    }

    /// Create an UnknownStream error.
    pub fn unknown_stream(name: impl Into<String>) -> Self {
        Self::UnknownStream { name: name.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::invalid_format("wrong frame magic number");
        assert!(err.to_string().contains("wrong frame magic number"));

        let err = Error::invalid_state("writer has been closed");
        assert!(err.to_string().contains("writer has been closed"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
