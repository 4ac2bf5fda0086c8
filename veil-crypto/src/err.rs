//! Error type for veil-crypto.

use thiserror::Error;
use veil_error::{ErrorKind, HasKind};

/// An error from a cryptographic operation.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// RSA-OAEP decryption failed: the ciphertext was not valid for this key.
    #[error("RSA decryption failed")]
    Decrypt,
    /// RSA-PSS signature verification failed.
    #[error("signature verification failed")]
    InvalidSignature,
    /// AES-CBC decryption or PKCS#7 unpadding failed.
    #[error("AES decryption failed")]
    AesDecrypt,
    /// HKDF output expansion failed (can only happen for absurd output lengths).
    #[error("key derivation failed")]
    Hkdf,
    /// A PEM-encoded key or PEM-encoded curve point could not be parsed.
    #[error("could not parse PEM-encoded key material: {0}")]
    BadKeyEncoding(String),
    /// Key generation failed (e.g. the OS RNG is unavailable).
    #[error("key generation failed: {0}")]
    KeyGen(String),
}

impl HasKind for Error {
    fn kind(&self) -> ErrorKind {
        use Error as E;
        use ErrorKind as EK;
        match self {
            E::Decrypt | E::InvalidSignature | E::AesDecrypt => EK::RemoteCryptoFailure,
            E::Hkdf => EK::Internal,
            E::BadKeyEncoding(_) => EK::KeystoreCorrupted,
            E::KeyGen(_) => EK::Internal,
        }
    }
}

/// Result type for veil-crypto.
pub type Result<T> = std::result::Result<T, Error>;
