//! The same AES envelope convention `veil-relay` uses on every encrypted
//! link: a cell's `payload`, AES-decrypted under the right hop's session
//! key, is itself the encoding of another [`Cell`].
//!
//! The originator peels exactly one such layer per hop between it and
//! wherever a reply originated, innermost hop last.

use veil_cell::{Cell, CellType};
use veil_crypto::SessionKey;

use crate::err::{Error, Result};

/// Encode `inner`, AES-encrypt it under `session_key` with a fresh IV,
/// and wrap the ciphertext in a cell of type `outer_type`.
pub fn wrap(session_key: &SessionKey, outer_type: CellType, inner: &Cell) -> Result<Cell> {
    let plaintext = inner.encode().map_err(Error::Encode)?;
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
    let plaintext = veil_crypto::aes_decrypt(session_key, &outer.payload, &iv).map_err(Error::Crypto)?;
    Cell::decode(&plaintext).map_err(Error::Cell)
}

/// Peel one layer per key in `keys`, outermost (closest hop) first.
pub fn unwrap_layers(keys: &[SessionKey], outer: &Cell) -> Result<Cell> {
    let mut current = outer.clone();
    for key in keys {
        current = unwrap(key, &current)?;
    }
    Ok(current)
}

/// Wrap `inner` under `keys`, innermost (farthest hop) key first, ending
/// with `outer_type` on the outermost layer and `Relay` on every layer
/// between it and the innermost.
pub fn wrap_layers(keys: &[SessionKey], innermost_type: CellType, inner: &Cell) -> Result<Cell> {
    let mut iter = keys.iter().rev();
    let innermost_key = iter.next().expect("at least one hop");
    let mut current = wrap(innermost_key, innermost_type, inner)?;
    for key in iter {
        let as_relay = Cell::relay(current.encode().map_err(Error::Encode)?);
        current = wrap(key, CellType::Relay, &as_relay)?;
    }
    Ok(current)
}

#[cfg(test)]
mod test {
    use super::*;
    use veil_crypto::EcdheKeypair;

    fn derive_pair() -> (SessionKey, SessionKey) {
        let a = EcdheKeypair::generate();
        let b = EcdheKeypair::generate();
        let ka = a.derive(&b.public_to_pem().unwrap(), b"salt").unwrap();
        let kb = b.derive(&a.public_to_pem().unwrap(), b"salt").unwrap();
        (ka, kb)
    }

    #[test]
    fn single_layer_roundtrips() {
        let (key, _) = derive_pair();
        let inner = Cell::req("http://example/");
        let wrapped = wrap_layers(&[key.clone()], CellType::Req, &inner).unwrap();
        let unwrapped = unwrap_layers(&[key], &wrapped).unwrap();
        assert_eq!(unwrapped.payload, b"http://example/");
    }

    #[test]
    fn three_layers_roundtrip_in_order() {
        let (k0, _) = derive_pair();
        let (k1, _) = derive_pair();
        let (k2, _) = derive_pair();
        let keys = vec![k0, k1, k2];

        let inner = Cell::req("http://example/deep");
        let wrapped = wrap_layers(&keys, CellType::Req, &inner).unwrap();
        assert_eq!(wrapped.cell_type, CellType::Relay);

        let unwrapped = unwrap_layers(&keys, &wrapped).unwrap();
        assert_eq!(unwrapped.cell_type, CellType::Req);
        assert_eq!(unwrapped.payload, b"http://example/deep");
    }
}
