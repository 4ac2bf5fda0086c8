//! Low-level cryptographic primitives used to build veil circuits.
//!
//! This crate wraps exactly the operations the overlay protocol needs and
//! nothing else: RSA-OAEP/PSS for the bootstrap handshake and directory
//! registration, ephemeral ECDHE on P-384 for per-hop forward-secret key
//! agreement, HKDF-SHA256 to turn a shared secret into a session key, and
//! AES-256-CBC to encrypt onion layers once a session key exists.

pub mod cipher;
pub mod err;
pub mod pk;

pub use cipher::aes::{aes_decrypt, aes_encrypt, IV_LEN};
pub use err::{Error, Result};
pub use pk::ecdhe::{EcdheKeypair, SessionKey, SESSION_KEY_LEN};
pub use pk::rsa::{
    rsa_decrypt, rsa_encrypt, rsa_generate, rsa_private_from_pem, rsa_private_to_pem,
    rsa_public_from_pem, rsa_public_to_pem, rsa_sign, rsa_verify, RSA_KEY_BITS,
};

/// The RSA private/public key types used throughout veil, re-exported so
/// downstream crates don't need a direct dependency on the `rsa` crate.
pub use rsa::{RsaPrivateKey, RsaPublicKey};
