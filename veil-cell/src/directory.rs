//! Wire encoding for the directory's relay listing.
//!
//! A `GET_DIRECT` reply cell's `payload` is this module's encoding of the
//! directory's `registered` sequence: a count followed by that many
//! `(ip_addr, port, rsa_public_key_pem)` entries.

use std::net::Ipv4Addr;

use veil_bytes::{Reader, Writer};

use crate::err::{CellError, Result};

/// Maximum number of entries a single listing may carry, and the maximum
/// length of one entry's PEM-encoded key, bounding memory the same way
/// [`crate::cell::MAX_CELL_PAYLOAD`] bounds a whole cell.
const MAX_ENTRIES: usize = u16::MAX as usize;
const MAX_KEY_PEM_LEN: usize = 8192;

/// One relay known to the directory: its address and its advertised
/// long-term RSA public key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// The relay's address, taken from its TCP source address at
    /// registration time.
    pub ip_addr: Ipv4Addr,
    /// The relay's advertised listening port.
    pub port: u16,
    /// The relay's long-term RSA public key, PEM-encoded.
    pub rsa_public_key_pem: String,
}

/// Serialize a directory listing for a `GET_DIRECT` reply's payload.
pub fn encode_entries(entries: &[DirectoryEntry]) -> Result<Vec<u8>> {
    if entries.len() > MAX_ENTRIES {
        return Err(CellError::FieldTooLarge {
            field: "directory entries",
            declared: entries.len(),
            max: MAX_ENTRIES,
        });
    }
    let mut out = Vec::new();
    out.write_u16(entries.len() as u16);
    for entry in entries {
        if entry.rsa_public_key_pem.len() > MAX_KEY_PEM_LEN {
            return Err(CellError::FieldTooLarge {
                field: "rsa_public_key_pem",
                declared: entry.rsa_public_key_pem.len(),
                max: MAX_KEY_PEM_LEN,
            });
        }
        out.write_all(&entry.ip_addr.octets());
        out.write_u16(entry.port);
        out.write_u16(entry.rsa_public_key_pem.len() as u16);
        out.write_all(entry.rsa_public_key_pem.as_bytes());
    }
    Ok(out)
}

/// Parse a directory listing out of a `GET_DIRECT` reply's payload.
pub fn decode_entries(bytes: &[u8]) -> Result<Vec<DirectoryEntry>> {
    let mut r = Reader::from_slice(bytes);
    let count = r.take_u16()? as usize;
    if count > MAX_ENTRIES {
        return Err(CellError::FieldTooLarge {
            field: "directory entries",
            declared: count,
            max: MAX_ENTRIES,
        });
    }
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let octets = r.take(4)?;
        let ip_addr = Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]);
        let port = r.take_u16()?;
        let pem_len = r.take_u16()? as usize;
        if pem_len > MAX_KEY_PEM_LEN {
            return Err(CellError::FieldTooLarge {
                field: "rsa_public_key_pem",
                declared: pem_len,
                max: MAX_KEY_PEM_LEN,
            });
        }
        let pem_bytes = r.take(pem_len)?;
        let rsa_public_key_pem = String::from_utf8(pem_bytes.to_vec())
            .map_err(|_| CellError::Truncated("non-utf8 key PEM".into()))?;
        entries.push(DirectoryEntry {
            ip_addr,
            port,
            rsa_public_key_pem,
        });
    }
    r.should_be_exhausted()
        .map_err(|_| CellError::TrailingBytes(r.remaining()))?;
    Ok(entries)
}
