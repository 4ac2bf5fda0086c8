//! Errors from loading or creating a relay's identity key.

use std::path::PathBuf;

use thiserror::Error;
use veil_error::{ErrorKind, HasKind};

/// An error from the relay key store.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The key file or its containing directory has permissions this
    /// system does not trust (e.g. group- or world-writable).
    #[error("key file {path:?} has untrusted permissions: {source}")]
    Permissions {
        /// The path whose permissions were rejected.
        path: PathBuf,
        /// The underlying `fs-mistrust` error.
        #[source]
        source: fs_mistrust::Error,
    },
    /// The key file exists but could not be read.
    #[error("could not read key file {path:?}: {source}")]
    Io {
        /// The path that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The key file's contents are not a valid PEM-encoded RSA private key.
    #[error("key file {path:?} is corrupted: {source}")]
    Corrupted {
        /// The path whose contents failed to parse.
        path: PathBuf,
        /// The underlying crypto error.
        #[source]
        source: veil_crypto::Error,
    },
    /// A fresh key could not be generated.
    #[error("could not generate a new relay key: {0}")]
    KeyGen(#[source] veil_crypto::Error),
}

impl HasKind for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Error::Permissions { .. } => ErrorKind::FsPermissions,
            Error::Io { .. } => ErrorKind::KeystoreAccessFailed,
            Error::Corrupted { .. } => ErrorKind::KeystoreCorrupted,
            Error::KeyGen(_) => ErrorKind::KeystoreAccessFailed,
        }
    }
}

/// Result type for the relay key store.
pub type Result<T> = std::result::Result<T, Error>;
