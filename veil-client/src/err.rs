//! Errors raised while building a circuit or making a request over one.

use thiserror::Error;
use veil_error::{ErrorKind, HasKind};

/// An error encountered by the originator.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The directory could not be reached or returned a malformed listing.
    #[error("directory query failed: {0}")]
    Directory(#[source] std::io::Error),
    /// A cell received from a hop failed to decode: a malformed directory
    /// listing or a malformed reply.
    #[error("cell decoding error: {0}")]
    Cell(#[from] veil_cell::CellError),
    /// One of our own cells failed to encode (an oversized onion layer,
    /// not anything a hop did).
    #[error("cell encoding error: {0}")]
    Encode(veil_cell::CellError),
    /// The directory has fewer relays registered than the requested
    /// circuit length.
    #[error("not enough relays available: need {needed}, directory has {available}")]
    NotEnoughRelays {
        /// Circuit length requested.
        needed: usize,
        /// Relays the directory actually returned.
        available: usize,
    },
    /// A relay's advertised RSA public key was not valid PEM.
    #[error("bad relay public key: {0}")]
    BadRelayKey(#[source] veil_crypto::Error),
    /// Could not connect to a hop's TCP address.
    #[error("could not connect to relay: {0}")]
    Connect(#[source] std::io::Error),
    /// A handshake or onion-layer cryptographic operation failed.
    #[error("cryptographic operation failed: {0}")]
    Crypto(#[source] veil_crypto::Error),
    /// A relay's signature over the handshake salt did not verify under
    /// its directory-advertised public key.
    #[error("relay signature did not verify")]
    BadSignature,
    /// A hop reported that the circuit could not be extended.
    #[error("circuit extend refused by relay")]
    ExtendRefused,
    /// A hop's reply did not decode as the cell type the protocol state
    /// expected at that point.
    #[error("unexpected cell type: {0}")]
    UnexpectedCellType(&'static str),
    /// The exit relay reported that the destination request failed.
    #[error("exit request failed")]
    RequestFailed,
    /// A circuit hop's connection failed while a request was in flight.
    #[error("circuit connection failed: {0}")]
    Io(#[from] std::io::Error),
    /// A URL passed to `Circuit::request` was not `http://` or `https://`.
    #[error("unsupported or malformed URL: {0}")]
    BadUrl(String),
}

impl HasKind for Error {
    fn kind(&self) -> ErrorKind {
        use Error as E;
        use ErrorKind as EK;
        match self {
            E::Directory(e) | E::Connect(e) | E::Io(e) => {
                if e.kind() == std::io::ErrorKind::ConnectionRefused {
                    EK::RemoteConnectionRefused
                } else {
                    EK::RemoteNetworkFailed
                }
            }
            E::Cell(_) | E::UnexpectedCellType(_) => EK::TorProtocolViolation,
            E::Encode(_) => EK::LocalProtocolViolation,
            E::NotEnoughRelays { .. } => EK::CircuitRefused,
            E::BadRelayKey(_) | E::Crypto(_) => EK::RemoteCryptoFailure,
            E::BadSignature => EK::RelayIdMismatch,
            E::ExtendRefused | E::RequestFailed => EK::CircuitRefused,
            E::BadUrl(_) => EK::BadApiUsage,
        }
    }
}

/// Result type for originator operations.
pub type Result<T> = std::result::Result<T, Error>;
