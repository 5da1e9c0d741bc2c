//! Centralized error types for listindex.
//!
//! Malformed messages never surface here: they degrade to empty fields and a
//! log line. What remains are failures that end either the current archive
//! file or the whole run, distinguished by [`IndexError::severity`].

use std::path::PathBuf;
use thiserror::Error;

/// How far an error propagates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Abandon the current archive file and continue with the next one.
    File,
    /// Abort the whole run.
    Fatal,
}

/// All errors produced by the listindex library.
#[derive(Error, Debug)]
pub enum IndexError {
    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The archive file does not exist.
    #[error("Archive file not found: {0}")]
    FileNotFound(PathBuf),

    /// The archive file name does not follow `<list>-<YYYY>[MM]`.
    #[error("Cannot derive list and period from archive name '{0}'")]
    InvalidArchiveName(String),

    /// The MIME parser stopped advancing inside an archive file.
    #[error("Parser stuck at offset {offset} in '{path}'")]
    ParserStuck { path: PathBuf, offset: u64 },

    /// The storage engine reported a failure.
    #[error("Storage error: {0}")]
    Storage(#[from] tantivy::TantivyError),

    /// A segment directory could not be opened.
    #[error("Cannot open segment '{path}': {reason}")]
    Segment { path: PathBuf, reason: String },

    /// A write was attempted with no segment selected.
    #[error("No active segment for '{0}'")]
    NoActiveSegment(String),

    /// The configuration is unusable.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience alias for `Result<T, IndexError>`.
pub type Result<T> = std::result::Result<T, IndexError>;

impl IndexError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Classify the error for the controller's recovery policy.
    pub fn severity(&self) -> Severity {
        match self {
            Self::Io { .. }
            | Self::FileNotFound(_)
            | Self::InvalidArchiveName(_)
            | Self::ParserStuck { .. } => Severity::File,
            Self::Storage(_) | Self::Segment { .. } | Self::NoActiveSegment(_) | Self::Config(_) => {
                Severity::Fatal
            }
        }
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (rare; prefer `IndexError::io`).
impl From<std::io::Error> for IndexError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
