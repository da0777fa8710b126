//! Error types for commit request records
//!
//! This module defines the errors raised while building request records and
//! while decoding the metadata text format.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use std::io;
use thiserror::Error;

/// Errors raised when constructing a request record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// The reference identifying the content item is empty
    #[error("Request reference must not be empty")]
    EmptyReference,
}

/// Result type alias for record construction
pub type RecordResult<T> = std::result::Result<T, RecordError>;

/// Errors raised while decoding the metadata text format
///
/// Every variant except `Io` denotes malformed input. Line numbers are 1-based.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// The encoded bytes are not valid UTF-8
    #[error("Metadata is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// The last line is missing its `\n` terminator
    #[error("Unterminated metadata line {line}")]
    UnterminatedLine {
        /// Line number of the unterminated line
        line: usize,
    },

    /// A raw control character appears where an escape is required
    #[error("Unescaped control character U+{code:04X} on metadata line {line}")]
    ControlCharacter {
        /// Line number
        line: usize,
        /// Code point of the offending character
        code: u32,
    },

    /// A backslash is followed by an unknown escape sequence
    #[error("Invalid escape sequence '{sequence}' on metadata line {line}")]
    InvalidEscape {
        /// Line number
        line: usize,
        /// The sequence as found in the input
        sequence: String,
    },

    /// A backslash ends the line
    #[error("Dangling escape at end of metadata line {line}")]
    DanglingEscape {
        /// Line number
        line: usize,
    },

    /// Reading the encoded bytes failed
    #[error("I/O error reading metadata: {0}")]
    Io(#[from] io::Error),
}

impl MetadataError {
    /// Create an invalid escape error
    pub fn invalid_escape(line: usize, sequence: impl Into<String>) -> Self {
        Self::InvalidEscape {
            line,
            sequence: sequence.into(),
        }
    }

    /// Whether the error denotes malformed input rather than a read failure
    pub fn is_format_error(&self) -> bool {
        !matches!(self, MetadataError::Io(_))
    }
}

/// Result type alias for metadata decoding
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_error_display() {
        let err = RecordError::EmptyReference;
        assert!(err.to_string().contains("must not be empty"));
    }

    #[test]
    fn test_metadata_error_display() {
        let err = MetadataError::UnterminatedLine { line: 3 };
        assert!(err.to_string().contains("line 3"));

        let err = MetadataError::ControlCharacter { line: 1, code: 0x07 };
        assert!(err.to_string().contains("U+0007"));

        let err = MetadataError::invalid_escape(2, "\\q");
        let msg = err.to_string();
        assert!(msg.contains("\\q"));
        assert!(msg.contains("line 2"));
    }

    #[test]
    fn test_metadata_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err: MetadataError = io_err.into();
        assert!(matches!(err, MetadataError::Io(_)));
        assert!(!err.is_format_error());
    }

    #[test]
    fn test_metadata_error_from_utf8() {
        let utf8_err = String::from_utf8(vec![0xFF, 0xFE]).unwrap_err();
        let err: MetadataError = utf8_err.into();
        assert!(matches!(err, MetadataError::InvalidUtf8(_)));
        assert!(err.is_format_error());
    }
}
