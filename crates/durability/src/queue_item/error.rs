//! Queue item error types

use crate::cache::{CacheConfigError, CacheError};
use commitq_core::{MetadataError, RecordError};
use std::io;
use thiserror::Error;

/// Errors that can occur while encoding or decoding a queue item
///
/// Every variant falls in one of three categories, see
/// [`is_format_error`](Self::is_format_error),
/// [`is_io_error`](Self::is_io_error) and
/// [`is_use_after_release`](Self::is_use_after_release).
#[derive(Debug, Error)]
pub enum QueueItemError {
    /// Required entry missing from the archive
    #[error("Missing required entry in queue item: {0}")]
    MissingEntry(String),

    /// Entry present more than once
    #[error("Duplicate entry in queue item: {0}")]
    DuplicateEntry(String),

    /// Entry present but its content is unusable
    #[error("Invalid entry '{entry}' in queue item: {reason}")]
    InvalidEntry {
        /// Entry name
        entry: String,
        /// Description of the problem
        reason: String,
    },

    /// Metadata entry could not be parsed
    #[error("Invalid metadata entry: {0}")]
    Metadata(#[source] MetadataError),

    /// Decoded fields do not form a valid record
    #[error("Invalid request record: {0}")]
    Record(#[from] RecordError),

    /// Container structure is corrupt or not an archive at all
    #[error("Archive error: {0}")]
    Archive(String),

    /// Content stream accessed after release
    #[error("Content stream used after release")]
    Released,

    /// Cache configuration rejected
    #[error("Cache configuration error: {0}")]
    Config(#[from] CacheConfigError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl QueueItemError {
    /// Create a missing entry error
    pub fn missing_entry(name: impl Into<String>) -> Self {
        Self::MissingEntry(name.into())
    }

    /// Create a duplicate entry error
    pub fn duplicate_entry(name: impl Into<String>) -> Self {
        Self::DuplicateEntry(name.into())
    }

    /// Create an invalid entry error
    pub fn invalid_entry(entry: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEntry {
            entry: entry.into(),
            reason: reason.into(),
        }
    }

    /// Create an archive error
    pub fn archive(msg: impl Into<String>) -> Self {
        Self::Archive(msg.into())
    }

    /// Classify an I/O error raised while walking the container
    ///
    /// Errors carrying an OS error code come from storage and stay I/O errors.
    /// Everything else was produced by the zstd or tar layers and means the
    /// bytes on disk are not a valid archive.
    pub(crate) fn from_read(err: io::Error) -> Self {
        if err.raw_os_error().is_some() {
            Self::Io(err)
        } else {
            Self::Archive(err.to_string())
        }
    }

    /// Missing or malformed entry, or unparsable container
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::MissingEntry(_)
                | Self::DuplicateEntry(_)
                | Self::InvalidEntry { .. }
                | Self::Metadata(_)
                | Self::Record(_)
                | Self::Archive(_)
        )
    }

    /// Underlying storage read or write failure
    pub fn is_io_error(&self) -> bool {
        matches!(self, Self::Io(_))
    }

    /// Content stream accessed after disposal
    pub fn is_use_after_release(&self) -> bool {
        matches!(self, Self::Released)
    }
}

impl From<MetadataError> for QueueItemError {
    fn from(err: MetadataError) -> Self {
        match err {
            MetadataError::Io(e) => Self::from_read(e),
            other => Self::Metadata(other),
        }
    }
}

impl From<CacheError> for QueueItemError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Released => Self::Released,
            CacheError::Io(e) => Self::Io(e),
        }
    }
}

/// Result type for queue item operations
pub type QueueItemResult<T> = Result<T, QueueItemError>;
