//! The unified, type-erased error-kind taxonomy shared by every veil crate.
//!
//! Individual crates define their own `Error` enums with `thiserror`, and
//! implement [`HasKind`] on them so that callers several layers up the stack
//! (the gateway, in particular) can collapse any failure down to the single
//! outcome spec.md calls for: an HTTP 404 with an empty body.

mod internal;
mod report;

pub use internal::{InternalError, internal};
pub use report::{Report, report_and_exit};

/// Classification of an error arising from veil's onion-routing operations.
///
/// Get the kind via [`HasKind::kind`] and compare it to the expected
/// value(s) with equality or by matching. When forwarding or reporting
/// errors, use the whole error, not just the kind — the error itself
/// carries more detail and context useful to humans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// We couldn't reach a peer at all: connection refused, reset, or the
    /// TCP handshake itself failed.
    RemoteConnectionRefused,
    /// A network operation to a peer failed for a reason other than refusal
    /// (host unreachable, broken pipe, and the like).
    RemoteNetworkFailed,
    /// A network operation to a peer did not complete before its deadline.
    RemoteNetworkTimeout,
    /// A peer on the circuit violated the wire protocol: a malformed cell,
    /// a cell type mismatch, or a declared length that can't be trusted.
    TorProtocolViolation,
    /// We ourselves produced or observed something that can't be encoded
    /// or that violates our own protocol invariants; this does not reflect
    /// a hostile peer.
    LocalProtocolViolation,
    /// A peer supplied cryptographic material we could not validate: a
    /// signature check failed, or a key didn't match the identity we
    /// expected.
    RelayIdMismatch,
    /// Decryption, signature verification, or key derivation failed using
    /// otherwise well-formed inputs (rejected ciphertext, bad tag, etc).
    RemoteCryptoFailure,
    /// We could not load or parse our own long-term identity key.
    KeystoreAccessFailed,
    /// Our own long-term identity key file existed but was corrupt.
    KeystoreCorrupted,
    /// A filesystem permission check failed (world-readable key file, etc).
    FsPermissions,
    /// We could not read or write our local persistent state.
    PersistentStateAccessFailed,
    /// The exit relay's outbound HTTP request to the destination failed.
    RemoteStreamError,
    /// The exit relay's outbound HTTP request failed to resolve a hostname.
    RemoteHostNotFound,
    /// A circuit could not be built because a relay refused to extend it
    /// or closed the connection mid-handshake.
    CircuitRefused,
    /// We were asked to do something that isn't a valid use of the API.
    BadApiUsage,
    /// Internal error (a bug). A supposedly impossible condition occurred.
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::RemoteConnectionRefused => "remote connection refused",
            ErrorKind::RemoteNetworkFailed => "remote network operation failed",
            ErrorKind::RemoteNetworkTimeout => "remote network operation timed out",
            ErrorKind::TorProtocolViolation => "peer violated the circuit protocol",
            ErrorKind::LocalProtocolViolation => "local protocol invariant violated",
            ErrorKind::RelayIdMismatch => "relay identity or signature check failed",
            ErrorKind::RemoteCryptoFailure => "cryptographic operation on peer data failed",
            ErrorKind::KeystoreAccessFailed => "could not access local identity key",
            ErrorKind::KeystoreCorrupted => "local identity key file is corrupted",
            ErrorKind::FsPermissions => "problem with filesystem permissions",
            ErrorKind::PersistentStateAccessFailed => "could not read/write persistent state",
            ErrorKind::RemoteStreamError => "outbound request to destination failed",
            ErrorKind::RemoteHostNotFound => "destination host could not be resolved",
            ErrorKind::CircuitRefused => "a relay refused to extend the circuit",
            ErrorKind::BadApiUsage => "invalid use of the API",
            ErrorKind::Internal => "internal error (bug)",
        };
        f.write_str(s)
    }
}

/// Errors that can be categorized as belonging to an [`ErrorKind`].
pub trait HasKind {
    /// Return the kind of this error.
    fn kind(&self) -> ErrorKind;
}

impl HasKind for std::convert::Infallible {
    fn kind(&self) -> ErrorKind {
        unreachable!()
    }
}
