//! Errors encountered while servicing one upstream client connection.
//!
//! None of these ever reach the peer directly: the relay's failure policy
//! (spec §7) is to close the offending socket (or, for a failed extend,
//! report a single encrypted `FAILED` tag) and otherwise keep serving
//! every other client.

use std::error::Error as _;

use thiserror::Error;
use veil_error::{ErrorKind, HasKind};

/// An error encountered while handling one client connection.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// No handshake cell arrived within the configured deadline.
    #[error("handshake timed out")]
    HandshakeTimeout,
    /// The handshake's raw RSA-OAEP frame did not decrypt under this
    /// relay's identity key.
    #[error("handshake decryption failed: {0}")]
    BadHandshake(#[source] veil_crypto::Error),
    /// The handshake's decrypted cell was malformed or not `ADD_CON`.
    #[error("malformed handshake cell: {0}")]
    MalformedCell(#[from] veil_cell::CellError),
    /// Could not derive the ECDHE session key with a peer.
    #[error("key agreement failed: {0}")]
    KeyAgreement(#[source] veil_crypto::Error),
    /// Could not sign the handshake salt under this relay's identity key.
    #[error("signing failed: {0}")]
    Sign(#[source] veil_crypto::Error),
    /// An AES-encrypted envelope did not decrypt under the client's
    /// session key.
    #[error("envelope decryption failed: {0}")]
    Envelope(#[source] veil_crypto::Error),
    /// A cell arrived of a type this relay does not accept in an
    /// encrypted envelope.
    #[error("unexpected cell type {0}")]
    UnexpectedCellType(&'static str),
    /// Reading from or writing to the client socket failed.
    #[error("client connection failed: {0}")]
    Io(#[from] std::io::Error),
    /// The exit's outbound HTTP request to the destination server failed.
    #[error("exit request failed: {0}")]
    Exit(#[source] reqwest::Error),
}

/// True if `e`'s failure was DNS resolution finding no such host, as
/// opposed to a reachable host refusing or dropping the connection.
fn is_dns_failure(e: &reqwest::Error) -> bool {
    let mut source = e.source();
    while let Some(s) = source {
        if s.to_string().contains("dns error") {
            return true;
        }
        source = s.source();
    }
    false
}

impl HasKind for Error {
    fn kind(&self) -> ErrorKind {
        use Error as E;
        use ErrorKind as EK;
        match self {
            E::HandshakeTimeout => EK::RemoteNetworkTimeout,
            E::BadHandshake(_) | E::KeyAgreement(_) | E::Sign(_) | E::Envelope(_) => {
                EK::RemoteCryptoFailure
            }
            E::MalformedCell(_) | E::UnexpectedCellType(_) => EK::TorProtocolViolation,
            E::Io(_) => EK::RemoteNetworkFailed,
            E::Exit(e) => {
                if is_dns_failure(e) {
                    EK::RemoteHostNotFound
                } else {
                    EK::RemoteStreamError
                }
            }
        }
    }
}

/// Result type for per-connection relay handling.
pub type Result<T> = std::result::Result<T, Error>;
