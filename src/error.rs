//! Error type shared by the byte source, the decoders and both reader kinds.
//!
//! Every failure carries the path of the file that triggered it. Nothing is
//! retried or downgraded to an empty result: the operation that caused the I/O
//! or decode returns the error, and lazy sequences yield it as their final item.

use crate::plan::ChunkRange;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a [`ReaderError`], handy for `match`es in callers
/// that only care about the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Io,
    Format,
    Decode,
    Closed,
    InvalidOptions,
    Close,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Io => "io",
            Self::Format => "format",
            Self::Decode => "decode",
            Self::Closed => "closed",
            Self::InvalidOptions => "invalid-options",
            Self::Close => "close",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum ReaderError {
    /// Opening, stat-ing or reading the file failed.
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Metadata or row data does not match the expected layout.
    #[error("format error in '{}': {message}", path.display())]
    Format { path: PathBuf, message: String },

    /// A column or page inside a row range could not be decoded.
    #[error("decode error in '{}' rows {range}: {message}", path.display())]
    Decode {
        path: PathBuf,
        range: ChunkRange,
        message: String,
    },

    /// The reader (or the byte source behind an iterator) was already closed.
    #[error("reader for '{}' is closed", path.display())]
    Closed { path: PathBuf },

    #[error("invalid options: {message}")]
    InvalidOptions { message: String },

    #[error("no files found matching pattern: {pattern}")]
    NoFiles { pattern: String },

    /// One or more member readers failed to close; every member was still attempted.
    #[error("{} reader(s) failed to close: {}", failures.len(), join_messages(failures))]
    Close { failures: Vec<ReaderError> },
}

pub type Result<T> = std::result::Result<T, ReaderError>;

fn join_messages(failures: &[ReaderError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ReaderError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn format(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Format {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn decode(path: impl Into<PathBuf>, range: ChunkRange, message: impl Into<String>) -> Self {
        Self::Decode {
            path: path.into(),
            range,
            message: message.into(),
        }
    }

    pub fn closed(path: impl Into<PathBuf>) -> Self {
        Self::Closed { path: path.into() }
    }

    pub fn invalid_options(message: impl Into<String>) -> Self {
        Self::InvalidOptions {
            message: message.into(),
        }
    }

    /// Collapse the outcome of closing several resources into one result.
    ///
    /// Returns `Ok(())` when every close succeeded, otherwise a single
    /// [`ReaderError::Close`] holding all failures in the order they occurred.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::Close`] if any of `results` is an error.
    pub fn aggregate_close(results: impl IntoIterator<Item = Result<()>>) -> Result<()> {
        let failures: Vec<ReaderError> = results.into_iter().filter_map(Result::err).collect();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(Self::Close { failures })
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } | Self::NoFiles { .. } => ErrorKind::Io,
            Self::Format { .. } => ErrorKind::Format,
            Self::Decode { .. } => ErrorKind::Decode,
            Self::Closed { .. } => ErrorKind::Closed,
            Self::InvalidOptions { .. } => ErrorKind::InvalidOptions,
            Self::Close { .. } => ErrorKind::Close,
        }
    }
}
