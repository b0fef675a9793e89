//! Error types for the projector-core library.
//!
//! Every failure a build or extraction can hit maps to one variant here, so
//! callers can tell a missing input apart from a corrupt trailer.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for projector operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all projector operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Failed to read an input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to write an output file
    #[error("failed to write file '{path}': {source}")]
    FileWrite {
        /// Path to the file that failed to write
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Output exists and overwriting was disabled
    #[error("output file '{path}' already exists")]
    OutputExists {
        /// The existing output path
        path: PathBuf,
    },

    /// Payload length does not fit in the trailer's length field
    #[error("payload of {len} bytes exceeds the {max} byte limit of the length field")]
    PayloadTooLarge {
        /// Actual payload length
        len: u64,
        /// Largest length the field can carry
        max: u64,
    },

    /// No trailer could be found in the image
    #[error("no projector trailer found in image")]
    TrailerNotFound,

    /// Trailer declares more payload than the image holds
    #[error("trailer declares {declared} payload bytes but only {available} are available")]
    LengthMismatch {
        /// Length stored in the trailer
        declared: u64,
        /// Bytes actually present
        available: u64,
    },

    /// Payload does not start with an SWF signature
    #[error("payload is not an SWF movie (found signature {found:02X?})")]
    NotSwf {
        /// The leading bytes that were found instead
        found: Vec<u8>,
    },
}

impl Error {
    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new file write error
    pub fn file_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileWrite {
            path: path.into(),
            source,
        }
    }

    /// Creates a new output-exists error
    pub fn output_exists(path: impl Into<PathBuf>) -> Self {
        Self::OutputExists { path: path.into() }
    }

    /// Creates a new payload size error
    pub fn payload_too_large(len: usize, max: u64) -> Self {
        Self::PayloadTooLarge {
            len: len as u64,
            max,
        }
    }

    /// Creates a new length mismatch error
    pub fn length_mismatch(declared: u64, available: usize) -> Self {
        Self::LengthMismatch {
            declared,
            available: available as u64,
        }
    }

    /// Returns true if the error means the image has no usable trailer,
    /// as opposed to an I/O failure
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::TrailerNotFound | Self::LengthMismatch { .. } | Self::NotSwf { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::payload_too_large(5_000_000_000, u32::MAX as u64);
        let msg = err.to_string();
        assert!(msg.contains("5000000000"));
        assert!(msg.contains("4294967295"));

        let err = Error::file_read("/missing/runtime.exe", std::io::ErrorKind::NotFound.into());
        assert!(err.to_string().contains("/missing/runtime.exe"));
    }

    #[test]
    fn test_is_format_error() {
        assert!(Error::TrailerNotFound.is_format_error());
        assert!(Error::length_mismatch(10, 4).is_format_error());
        assert!(!Error::output_exists("/tmp/out.exe").is_format_error());
    }
}
