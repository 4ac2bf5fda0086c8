//! AES-256-CBC with PKCS#7 padding: the per-hop symmetric cipher used to
//! wrap and unwrap onion layers once a session key has been established.

use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;

use crate::err::{Error, Result};
use crate::pk::ecdhe::SessionKey;

/// Length in bytes of an AES-CBC initialization vector.
pub const IV_LEN: usize = 16;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Encrypt `plaintext` under `key`, generating a fresh random IV.
///
/// Returns `(ciphertext, iv)`; the IV is not secret and must travel
/// alongside the ciphertext in the cell that carries it.
pub fn aes_encrypt(key: &SessionKey, plaintext: &[u8]) -> (Vec<u8>, [u8; IV_LEN]) {
    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);
    let ciphertext = Aes256CbcEnc::new(key.as_bytes().into(), &iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);
    (ciphertext, iv)
}

/// Decrypt `ciphertext` under `key` and `iv`, stripping PKCS#7 padding.
///
/// Fails if the ciphertext is not a multiple of the block size or the
/// padding is invalid, which happens if the wrong key was used or the
/// data was corrupted or tampered with in transit.
pub fn aes_decrypt(key: &SessionKey, ciphertext: &[u8], iv: &[u8; IV_LEN]) -> Result<Vec<u8>> {
    Aes256CbcDec::new(key.as_bytes().into(), iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| Error::AesDecrypt)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pk::ecdhe::EcdheKeypair;

    fn test_key() -> SessionKey {
        let a = EcdheKeypair::generate();
        let b = EcdheKeypair::generate();
        a.derive(&b.public_to_pem().unwrap(), b"test-salt").unwrap()
    }

    #[test]
    fn roundtrip() {
        let key = test_key();
        let msg = b"a relay cell payload of arbitrary length, not block-aligned";
        let (ct, iv) = aes_encrypt(&key, msg);
        let pt = aes_decrypt(&key, &ct, &iv).unwrap();
        assert_eq!(pt, msg);
    }

    #[test]
    fn roundtrip_empty_message() {
        let key = test_key();
        let (ct, iv) = aes_encrypt(&key, b"");
        let pt = aes_decrypt(&key, &ct, &iv).unwrap();
        assert!(pt.is_empty());
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let key = test_key();
        let other = test_key();
        let (ct, iv) = aes_encrypt(&key, b"secret circuit payload");
        assert!(aes_decrypt(&other, &ct, &iv).is_err());
    }
}
