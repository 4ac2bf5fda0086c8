//! Errors raised while handling one directory connection.
//!
//! None of these ever reach a peer: the directory's failure policy is to
//! drop the offending socket and keep serving everyone else (spec §7).
//! They exist so `handle_connection` has something to log.

use thiserror::Error;
use veil_error::{ErrorKind, HasKind};

/// An error encountered while servicing one directory connection.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The framed cell codec rejected the connection's bytes.
    #[error("malformed cell: {0}")]
    MalformedCell(#[from] veil_cell::CellError),
    /// The connection closed, or timed out, before a complete cell arrived.
    #[error("connection closed before a cell was read")]
    NoCell,
    /// A `GIVE_DIRECT` registration's proof-of-possession signature did
    /// not verify under the key it claims to own.
    #[error("registration signature did not verify")]
    BadSignature,
    /// A `GIVE_DIRECT` cell's public key PEM could not be parsed.
    #[error("invalid public key in registration: {0}")]
    BadPublicKey(#[source] veil_crypto::Error),
    /// The first cell on a connection was of a type the directory does
    /// not accept (only `GIVE_DIRECT` and `GET_DIRECT` are valid).
    #[error("unexpected cell type {0}")]
    UnexpectedCellType(&'static str),
    /// Writing a reply to the peer failed.
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

impl HasKind for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Error::MalformedCell(_) | Error::UnexpectedCellType(_) => ErrorKind::TorProtocolViolation,
            Error::NoCell => ErrorKind::RemoteNetworkTimeout,
            Error::BadSignature | Error::BadPublicKey(_) => ErrorKind::RemoteCryptoFailure,
            Error::Io(_) => ErrorKind::RemoteNetworkFailed,
        }
    }
}

/// Result type for directory connection handling.
pub type Result<T> = std::result::Result<T, Error>;
