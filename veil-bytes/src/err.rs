//! Define error types for the veil-bytes crate.
use thiserror::Error;
use veil_error::{ErrorKind, HasKind};

/// An error encountered while decoding a byte slice.
#[derive(Error, Clone, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The input ran out before we could extract everything we needed.
    #[error("Ran out of bytes while parsing {parsed}")]
    Truncated {
        /// What we were trying to parse.
        parsed: &'static str,
    },
    /// The input had more bytes left over than we expected.
    #[error("Extra bytes found at the end of input while parsing {parsed}")]
    ExtraneousBytes {
        /// What we were trying to parse.
        parsed: &'static str,
    },
    /// A length field declared a size larger than we're willing to allocate for.
    #[error("Declared length {declared} for {parsed} exceeds maximum of {max}")]
    LengthExceedsMaximum {
        /// What we were trying to parse.
        parsed: &'static str,
        /// The length that was declared on the wire.
        declared: usize,
        /// The maximum length we allow.
        max: usize,
    },
    /// The bytes we parsed were not a well-formed instance of what we expected.
    #[error("Invalid value while parsing {parsed}: {reason}")]
    BadValue {
        /// What we were trying to parse.
        parsed: &'static str,
        /// Why the value was bad.
        reason: &'static str,
    },
}

impl HasKind for Error {
    fn kind(&self) -> ErrorKind {
        ErrorKind::TorProtocolViolation
    }
}

/// An error encountered while encoding an object.
///
/// This should basically never happen in practice: it indicates a bug in
/// the encoder, not a problem with untrusted input.
#[derive(Error, Clone, Debug)]
#[non_exhaustive]
pub enum EncodeError {
    /// The object we tried to encode couldn't fit in the space the wire
    /// format allows for it.
    #[error("Object too large to encode: {0}")]
    TooLarge(&'static str),
}

impl HasKind for EncodeError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Internal
    }
}
