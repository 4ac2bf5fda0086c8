//! The AES envelope convention used on every encrypted link in the
//! overlay: whatever an envelope cell's `payload` AES-decrypts to is
//! itself the encoding of another [`Cell`] — the next layer in, or (on
//! the reply path) the thing actually being reported.
//!
//! Wrapping this uniformly means a relay never needs to special-case
//! whether it is talking to the originator or to another relay: both
//! speak the same envelope.

use veil_cell::{Cell, CellType};
use veil_crypto::SessionKey;

use crate::err::{Error, Result};

/// Encode `inner`, AES-encrypt it under `session_key` with a fresh IV,
/// and wrap the ciphertext in a cell of type `outer_type`.
pub fn wrap(session_key: &SessionKey, outer_type: CellType, inner: &Cell) -> Result<Cell> {
    let plaintext = inner.encode()?;
    let (ciphertext, iv) = veil_crypto::aes_encrypt(session_key, &plaintext);
    let mut outer = Cell::simple(outer_type, ciphertext);
    outer.iv = Some(iv);
    Ok(outer)
}

/// Inverse of [`wrap`]: AES-decrypt `outer`'s payload under `session_key`
/// using its own `iv`, then decode the plaintext as the inner cell.
pub fn unwrap(session_key: &SessionKey, outer: &Cell) -> Result<Cell> {
    let iv = outer
        .iv
        .ok_or_else(|| Error::UnexpectedCellType(outer.cell_type.name()))?;
    let plaintext = veil_crypto::aes_decrypt(session_key, &outer.payload, &iv).map_err(Error::Envelope)?;
    Ok(Cell::decode(&plaintext)?)
}

#[cfg(test)]
mod test {
    use super::*;
    use veil_crypto::EcdheKeypair;

    fn test_key() -> SessionKey {
        let a = EcdheKeypair::generate();
        let b = EcdheKeypair::generate();
        a.derive(&b.public_to_pem().unwrap(), b"wrap-test-salt").unwrap()
    }

    #[test]
    fn wrap_then_unwrap_roundtrips() {
        let key = test_key();
        let inner = Cell::req("http://example/");
        let outer = wrap(&key, CellType::Relay, &inner).unwrap();
        assert_eq!(outer.cell_type, CellType::Relay);
        assert!(outer.iv.is_some());

        let unwrapped = unwrap(&key, &outer).unwrap();
        assert_eq!(unwrapped.cell_type, CellType::Req);
        assert_eq!(unwrapped.payload, b"http://example/");
    }

    #[test]
    fn unwrap_rejects_cell_without_iv() {
        let key = test_key();
        let outer = Cell::simple(CellType::Relay, vec![1, 2, 3]);
        assert!(unwrap(&key, &outer).is_err());
    }

    #[test]
    fn unwrap_rejects_wrong_key() {
        let key = test_key();
        let other = test_key();
        let outer = wrap(&key, CellType::Relay, &Cell::req("x")).unwrap();
        assert!(unwrap(&other, &outer).is_err());
    }
}
