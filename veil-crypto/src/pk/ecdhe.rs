//! Ephemeral ECDH key agreement on P-384, with HKDF-SHA256 derivation of the
//! resulting per-hop session key.

use hkdf::Hkdf;
use p384::ecdh::diffie_hellman;
use p384::pkcs8::{DecodePublicKey, EncodePublicKey};
use p384::{PublicKey, SecretKey};
use rand::rngs::OsRng;
use sha2::Sha256;

use crate::err::{Error, Result};

/// Length in bytes of the derived per-hop AES-256 session key.
pub const SESSION_KEY_LEN: usize = 32;

/// A 32-byte symmetric key shared with one hop of a circuit.
#[derive(Clone, zeroize::Zeroize, zeroize::ZeroizeOnDrop)]
pub struct SessionKey([u8; SESSION_KEY_LEN]);

impl SessionKey {
    /// Borrow the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; SESSION_KEY_LEN] {
        &self.0
    }
}

/// An ephemeral ECDHE keypair generated for a single hop of a single
/// circuit. The private half is held only long enough to derive the
/// session key and is then dropped.
pub struct EcdheKeypair {
    secret: SecretKey,
    public: PublicKey,
}

impl EcdheKeypair {
    /// Generate a fresh P-384 keypair.
    pub fn generate() -> Self {
        let secret = SecretKey::random(&mut OsRng);
        let public = secret.public_key();
        EcdheKeypair { secret, public }
    }

    /// Encode the public half as SPKI PEM, to be sent to the peer.
    pub fn public_to_pem(&self) -> Result<String> {
        self.public
            .to_public_key_pem(Default::default())
            .map_err(|e| Error::BadKeyEncoding(e.to_string()))
    }

    /// Complete the key agreement given the peer's PEM-encoded public key
    /// and a salt, producing the derived session key.
    ///
    /// The salt is whatever the handshake message carried alongside the
    /// peer's public key; it need not be secret, only unique per hop.
    pub fn derive(&self, peer_public_pem: &str, salt: &[u8]) -> Result<SessionKey> {
        let peer_public = PublicKey::from_public_key_pem(peer_public_pem)
            .map_err(|e| Error::BadKeyEncoding(e.to_string()))?;
        let shared = diffie_hellman(
            self.secret.to_nonzero_scalar(),
            peer_public.as_affine(),
        );

        let hk = Hkdf::<Sha256>::new(Some(salt), shared.raw_secret_bytes().as_slice());
        let mut okm = [0u8; SESSION_KEY_LEN];
        hk.expand(b"veil circuit hop key", &mut okm)
            .map_err(|_| Error::Hkdf)?;
        Ok(SessionKey(okm))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn both_sides_derive_the_same_key() {
        let alice = EcdheKeypair::generate();
        let bob = EcdheKeypair::generate();
        let salt = b"some-per-hop-salt";

        let alice_key = alice.derive(&bob.public_to_pem().unwrap(), salt).unwrap();
        let bob_key = bob.derive(&alice.public_to_pem().unwrap(), salt).unwrap();

        assert_eq!(alice_key.as_bytes(), bob_key.as_bytes());
    }

    #[test]
    fn different_salts_derive_different_keys() {
        let alice = EcdheKeypair::generate();
        let bob = EcdheKeypair::generate();

        let k1 = alice.derive(&bob.public_to_pem().unwrap(), b"salt-one").unwrap();
        let k2 = alice.derive(&bob.public_to_pem().unwrap(), b"salt-two").unwrap();

        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }
}
