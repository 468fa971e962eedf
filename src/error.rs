//! Centralized error types for mimetree.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mimetree library.
///
/// Only the variants below ever escape the decoder. Malformed encodings,
/// unknown headers and broken boundaries are resolved locally with a
/// best-effort value instead.
#[derive(Error, Debug)]
pub enum MimeError {
    /// The input bytes are neither valid UTF-8 nor ASCII.
    #[error("Message is not valid UTF-8 or ASCII (first invalid byte at offset {offset})")]
    Decode { offset: usize },

    /// The input has no multi-line structure and cannot hold a header block.
    #[error("Message has too few lines to be a MIME document ({lines} found)")]
    TooFewLines { lines: usize },

    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file does not exist.
    #[error("Message file not found: {0}")]
    FileNotFound(PathBuf),

    /// The input is larger than the configured decoding limit.
    #[error("Message is {size} bytes, larger than the {limit} byte limit")]
    MessageTooLarge { size: usize, limit: usize },

    /// No part carries the requested content identifier.
    #[error("No part with Content-ID '{0}'")]
    PartNotFound(String),

    /// An export operation failed.
    #[error("Export error: {0}")]
    ExportError(String),
}

/// Convenience alias for `Result<T, MimeError>`.
pub type Result<T> = std::result::Result<T, MimeError>;

impl MimeError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// `true` for the two failures that abort message construction.
    pub fn is_fatal_decode(&self) -> bool {
        matches!(self, Self::Decode { .. } | Self::TooFewLines { .. })
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (rare, prefer `MimeError::io`).
impl From<std::io::Error> for MimeError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
