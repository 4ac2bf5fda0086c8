//! Errors from encoding or decoding a [`crate::Cell`].

use thiserror::Error;
use veil_error::{ErrorKind, HasKind};

/// An error raised by the cell codec.
///
/// Every variant here is fatal to the connection the offending bytes
/// arrived on: the codec never attempts to resynchronize after a
/// malformed record, it only reports why the record was rejected.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum CellError {
    /// The tag byte did not match any known [`crate::CellType`].
    #[error("unknown cell type tag {tag}")]
    UnknownCellType {
        /// The tag byte that was read.
        tag: u8,
    },
    /// A length-prefixed field declared a length that exceeds the
    /// configured maximum for that field.
    #[error("{field} length {declared} exceeds maximum {max}")]
    FieldTooLarge {
        /// Name of the oversized field.
        field: &'static str,
        /// The length the record declared.
        declared: usize,
        /// The maximum this decoder allows.
        max: usize,
    },
    /// The buffer ended before a required field could be read.
    #[error("truncated cell: {0}")]
    Truncated(String),
    /// There were leftover bytes after decoding a complete cell.
    #[error("{0} trailing bytes after cell")]
    TrailingBytes(usize),
    /// A cell of the wrong type was encountered where a specific type
    /// was required by the protocol state machine.
    #[error("expected cell type {expected}, got {actual}")]
    UnexpectedCellType {
        /// The type the caller required.
        expected: &'static str,
        /// The type that was actually present.
        actual: &'static str,
    },
}

impl HasKind for CellError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::TorProtocolViolation
    }
}

impl From<veil_bytes::Error> for CellError {
    fn from(e: veil_bytes::Error) -> Self {
        CellError::Truncated(e.to_string())
    }
}

impl From<std::io::Error> for CellError {
    fn from(e: std::io::Error) -> Self {
        CellError::Truncated(e.to_string())
    }
}

/// Result type for cell encoding and decoding.
pub type Result<T> = std::result::Result<T, CellError>;
