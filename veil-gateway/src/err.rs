//! Errors raised while serving one gateway request.
//!
//! None of these ever reach the HTTP client directly: spec §7 collapses
//! every failure mode here into a single HTTP 404 with an empty body.
//! The variants exist so the handler has something to log.

use thiserror::Error;
use veil_error::{ErrorKind, HasKind};

/// An error encountered while serving one `GET /?url=...` request.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The request's query string had no `url` parameter.
    #[error("missing url query parameter")]
    MissingUrl,
    /// Building the circuit or making the request over it failed.
    #[error("circuit request failed: {0}")]
    Circuit(#[from] veil_client::Error),
}

impl HasKind for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingUrl => ErrorKind::BadApiUsage,
            Error::Circuit(e) => e.kind(),
        }
    }
}

/// Result type for gateway request handling.
pub type Result<T> = std::result::Result<T, Error>;
