//! RSA-OAEP encryption and RSA-PSS signatures.
//!
//! These are the two RSA operations the overlay uses: OAEP wraps the first
//! message a circuit leg sends to a hop (before any symmetric key exists),
//! and PSS lets a relay prove possession of the identity key it advertised
//! at the directory.

use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::{Oaep, Pss, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

use crate::err::{Error, Result};

/// Bits of modulus for newly generated relay/directory identity keys.
pub const RSA_KEY_BITS: usize = 3072;

/// Generate a fresh RSA keypair for use as a relay or directory identity key.
pub fn rsa_generate() -> Result<RsaPrivateKey> {
    RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS).map_err(|e| Error::KeyGen(e.to_string()))
}

/// Load a PKCS#8 PEM-encoded RSA private key.
pub fn rsa_private_from_pem(pem: &str) -> Result<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs8_pem(pem).map_err(|e| Error::BadKeyEncoding(e.to_string()))
}

/// Encode an RSA private key as PKCS#8 PEM, for writing to the key store.
pub fn rsa_private_to_pem(key: &RsaPrivateKey) -> Result<String> {
    key.to_pkcs8_pem(Default::default())
        .map(|z| z.to_string())
        .map_err(|e| Error::BadKeyEncoding(e.to_string()))
}

/// Load an SPKI PEM-encoded RSA public key, as exchanged between peers.
pub fn rsa_public_from_pem(pem: &str) -> Result<RsaPublicKey> {
    RsaPublicKey::from_public_key_pem(pem).map_err(|e| Error::BadKeyEncoding(e.to_string()))
}

/// Encode an RSA public key as SPKI PEM.
pub fn rsa_public_to_pem(key: &RsaPublicKey) -> Result<String> {
    key.to_public_key_pem(Default::default())
        .map_err(|e| Error::BadKeyEncoding(e.to_string()))
}

/// Encrypt `msg` to `pubkey` using RSA-OAEP with MGF1-SHA256 and SHA256.
///
/// `msg` must be short enough to fit in a single RSA block after padding;
/// this is only ever used to wrap a single ECDHE public key or session
/// secret, never for bulk data.
pub fn rsa_encrypt(pubkey: &RsaPublicKey, msg: &[u8]) -> Result<Vec<u8>> {
    pubkey
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), msg)
        .map_err(|_| Error::Decrypt)
}

/// Decrypt a ciphertext produced by [`rsa_encrypt`].
pub fn rsa_decrypt(privkey: &RsaPrivateKey, ciphertext: &[u8]) -> Result<Vec<u8>> {
    privkey
        .decrypt(Oaep::new::<Sha256>(), ciphertext)
        .map_err(|_| Error::Decrypt)
}

/// The maximum PSS salt length for a key of the given modulus size, signing
/// a SHA-256 digest: `modulus_len - hash_len - 2` bytes.
fn max_pss_salt_len(privkey: &RsaPrivateKey) -> usize {
    privkey.size().saturating_sub(Sha256::output_size() + 2)
}

/// Sign `msg` under `privkey` using RSA-PSS over its SHA-256 digest, with
/// the maximum salt length the modulus allows.
pub fn rsa_sign(privkey: &RsaPrivateKey, msg: &[u8]) -> Result<Vec<u8>> {
    let digest = Sha256::digest(msg);
    let salt_len = max_pss_salt_len(privkey);
    privkey
        .sign_with_rng(
            &mut OsRng,
            Pss::new_with_salt::<Sha256>(salt_len),
            &digest,
        )
        .map_err(|_| Error::InvalidSignature)
}

/// Verify a signature produced by [`rsa_sign`].
pub fn rsa_verify(pubkey: &RsaPublicKey, sig: &[u8], msg: &[u8]) -> Result<()> {
    let digest = Sha256::digest(msg);
    let salt_len = pubkey.size().saturating_sub(Sha256::output_size() + 2);
    pubkey
        .verify(Pss::new_with_salt::<Sha256>(salt_len), &digest, sig)
        .map_err(|_| Error::InvalidSignature)
}

#[cfg(test)]
mod test {
    use super::*;

    fn test_key() -> RsaPrivateKey {
        RsaPrivateKey::new(&mut OsRng, 2048).expect("keygen")
    }

    #[test]
    fn oaep_roundtrip() {
        let priv_key = test_key();
        let pub_key = RsaPublicKey::from(&priv_key);
        let msg = b"ecdhe public key goes here";
        let ct = rsa_encrypt(&pub_key, msg).unwrap();
        let pt = rsa_decrypt(&priv_key, &ct).unwrap();
        assert_eq!(pt, msg);
    }

    #[test]
    fn pss_sign_and_verify() {
        let priv_key = test_key();
        let pub_key = RsaPublicKey::from(&priv_key);
        let msg = b"registration-salt";
        let sig = rsa_sign(&priv_key, msg).unwrap();
        rsa_verify(&pub_key, &sig, msg).unwrap();
    }

    #[test]
    fn pss_rejects_tampered_message() {
        let priv_key = test_key();
        let pub_key = RsaPublicKey::from(&priv_key);
        let sig = rsa_sign(&priv_key, b"original").unwrap();
        assert!(rsa_verify(&pub_key, &sig, b"tampered").is_err());
    }

    #[test]
    fn pem_roundtrip() {
        let priv_key = test_key();
        let pem = rsa_private_to_pem(&priv_key).unwrap();
        let back = rsa_private_from_pem(&pem).unwrap();
        assert_eq!(priv_key, back);
    }
}
