//! The tagged binary [`Cell`] record: the universal wire message exchanged
//! between every pair of nodes in the overlay (gateway/originator, relay
//! to relay, relay to directory).

use std::net::Ipv4Addr;

use bitflags::bitflags;
use veil_bytes::{Reader, Writer};

use crate::err::{CellError, Result};

/// Upper bound on a cell's `payload` length, enforced by the decoder.
pub const MAX_CELL_PAYLOAD: usize = 1 << 20;

/// Upper bound on a cell's `salt` length, enforced by the decoder.
pub const MAX_SALT_LEN: usize = 256;

/// Length in bytes of the fixed-width `iv` field.
pub const IV_LEN: usize = 16;

/// The kind of message a [`Cell`] carries, and hence which of its optional
/// fields are meaningful.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum CellType {
    /// Bootstrap handshake: originator to relay, carries an ephemeral
    /// ECDHE public key.
    AddCon,
    /// Reply to `AddCon`: relay to originator, carries the relay's
    /// ephemeral ECDHE public key, a salt, and a signature over that salt.
    ConnectResp,
    /// Extend the circuit one hop further.
    RelayConnect,
    /// Forward opaque bytes to the already-extended next hop.
    Relay,
    /// Exit-side HTTP request: payload is a URL.
    Req,
    /// One chunk of a multi-chunk reply; more chunks follow.
    Continue,
    /// The last chunk of a reply.
    Finished,
    /// The operation failed; payload is a short tag describing why.
    Failed,
    /// A relay registering itself with the directory.
    GiveDirect,
    /// A client requesting the directory's relay listing.
    GetDirect,
}

impl CellType {
    fn to_tag(self) -> u8 {
        match self {
            CellType::AddCon => 0,
            CellType::ConnectResp => 1,
            CellType::RelayConnect => 2,
            CellType::Relay => 3,
            CellType::Req => 4,
            CellType::Continue => 5,
            CellType::Finished => 6,
            CellType::Failed => 7,
            CellType::GiveDirect => 8,
            CellType::GetDirect => 9,
        }
    }

    fn from_tag(tag: u8) -> Result<Self> {
        Ok(match tag {
            0 => CellType::AddCon,
            1 => CellType::ConnectResp,
            2 => CellType::RelayConnect,
            3 => CellType::Relay,
            4 => CellType::Req,
            5 => CellType::Continue,
            6 => CellType::Finished,
            7 => CellType::Failed,
            8 => CellType::GiveDirect,
            9 => CellType::GetDirect,
            tag => return Err(CellError::UnknownCellType { tag }),
        })
    }

    /// A short name for this cell type, for error messages and logging.
    pub fn name(self) -> &'static str {
        match self {
            CellType::AddCon => "ADD_CON",
            CellType::ConnectResp => "CONNECT_RESP",
            CellType::RelayConnect => "RELAY_CONNECT",
            CellType::Relay => "RELAY",
            CellType::Req => "REQ",
            CellType::Continue => "CONTINUE",
            CellType::Finished => "FINISHED",
            CellType::Failed => "FAILED",
            CellType::GiveDirect => "GIVE_DIRECT",
            CellType::GetDirect => "GET_DIRECT",
        }
    }
}

bitflags! {
    /// Which of a [`Cell`]'s optional fields are present on the wire.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    struct CellFlags: u8 {
        const HAS_IV = 0b0001;
        const HAS_SALT = 0b0010;
        const HAS_SIGNATURE = 0b0100;
        const HAS_ADDR = 0b1000;
    }
}

/// The universal wire record.
///
/// Exactly the fields demanded by `cell_type` are expected to be
/// populated; the others are left `None` and are absent from the wire
/// encoding entirely (not merely zeroed).
#[derive(Clone, Debug)]
pub struct Cell {
    /// What kind of message this is.
    pub cell_type: CellType,
    /// Opaque payload: may be ciphertext, a PEM-encoded key, a URL, or a
    /// nested encoded `Cell`, depending on `cell_type`.
    pub payload: Vec<u8>,
    /// AES-CBC initialization vector, when `payload` is AES-encrypted.
    ///
    /// `GiveDirect` cells repurpose this fixed 16-byte field to carry a
    /// relay's listening port in its first two bytes (see
    /// [`Cell::give_direct`]); this mirrors the wire layout of every other
    /// cell type rather than growing a separate port field.
    pub iv: Option<[u8; IV_LEN]>,
    /// Random bytes used as an HKDF salt and/or as the blob signed during
    /// authenticated key exchange.
    pub salt: Option<Vec<u8>>,
    /// RSA-PSS signature over `salt`.
    pub signature: Option<Vec<u8>>,
    /// Next-hop routing hint carried in `RelayConnect` cells.
    pub addr: Option<(Ipv4Addr, u16)>,
}

impl Cell {
    /// Build a cell with only a payload set; all optional fields absent.
    pub fn simple(cell_type: CellType, payload: Vec<u8>) -> Self {
        Cell {
            cell_type,
            payload,
            iv: None,
            salt: None,
            signature: None,
            addr: None,
        }
    }

    /// Build an `ADD_CON` cell: payload is the initiator's ephemeral
    /// ECDHE public key, PEM-encoded.
    pub fn add_con(ecdhe_pub_pem: impl Into<Vec<u8>>) -> Self {
        Cell::simple(CellType::AddCon, ecdhe_pub_pem.into())
    }

    /// Build a `CONNECT_RESP` cell: payload is the relay's ephemeral
    /// ECDHE public key, `salt` is the handshake salt, `signature` is the
    /// RSA-PSS signature of `salt` under the relay's long-term key.
    pub fn connect_resp(ecdhe_pub_pem: impl Into<Vec<u8>>, salt: Vec<u8>, signature: Vec<u8>) -> Self {
        Cell {
            cell_type: CellType::ConnectResp,
            payload: ecdhe_pub_pem.into(),
            iv: None,
            salt: Some(salt),
            signature: Some(signature),
            addr: None,
        }
    }

    /// Build a `RELAY_CONNECT` cell routed at `(ip, port)`, carrying
    /// `payload` as the opaque blob to forward.
    pub fn relay_connect(ip: Ipv4Addr, port: u16, payload: Vec<u8>) -> Self {
        Cell {
            cell_type: CellType::RelayConnect,
            payload,
            iv: None,
            salt: None,
            signature: None,
            addr: Some((ip, port)),
        }
    }

    /// Build a `RELAY` cell carrying opaque bytes to forward verbatim.
    pub fn relay(payload: Vec<u8>) -> Self {
        Cell::simple(CellType::Relay, payload)
    }

    /// Build a `REQ` cell: payload is a UTF-8 URL.
    pub fn req(url: impl Into<Vec<u8>>) -> Self {
        Cell::simple(CellType::Req, url.into())
    }

    /// Build a `CONTINUE` cell carrying one chunk of a streamed reply.
    pub fn continue_chunk(payload: Vec<u8>) -> Self {
        Cell::simple(CellType::Continue, payload)
    }

    /// Build a `FINISHED` cell carrying the final chunk of a reply.
    pub fn finished(payload: Vec<u8>) -> Self {
        Cell::simple(CellType::Finished, payload)
    }

    /// Build a `FAILED` cell carrying a short failure tag (may be empty).
    pub fn failed(tag: impl Into<Vec<u8>>) -> Self {
        Cell::simple(CellType::Failed, tag.into())
    }

    /// Build a `GIVE_DIRECT` registration cell.
    ///
    /// `listen_port` is packed into the fixed-width `iv` field's first two
    /// bytes, big-endian, with the rest zero-padded.
    pub fn give_direct(pubkey_pem: impl Into<Vec<u8>>, listen_port: u16, nonce: Vec<u8>, signature: Vec<u8>) -> Self {
        let mut iv = [0u8; IV_LEN];
        iv[..2].copy_from_slice(&listen_port.to_be_bytes());
        Cell {
            cell_type: CellType::GiveDirect,
            payload: pubkey_pem.into(),
            iv: Some(iv),
            salt: Some(nonce),
            signature: Some(signature),
            addr: None,
        }
    }

    /// Extract the listening port packed into a `GIVE_DIRECT` cell's `iv`
    /// field by [`Cell::give_direct`].
    pub fn give_direct_port(&self) -> Option<u16> {
        self.iv.map(|iv| u16::from_be_bytes([iv[0], iv[1]]))
    }

    /// Build a `GET_DIRECT` query cell (no fields beyond an empty payload).
    pub fn get_direct_query() -> Self {
        Cell::simple(CellType::GetDirect, Vec::new())
    }

    /// Build a `GET_DIRECT` reply cell whose payload is an
    /// already-serialized directory listing (see
    /// [`crate::directory::encode_entries`]).
    pub fn get_direct_reply(encoded_entries: Vec<u8>) -> Self {
        Cell::simple(CellType::GetDirect, encoded_entries)
    }

    /// Return an error unless this cell is of the expected type.
    pub fn expect_type(&self, expected: CellType) -> Result<()> {
        if self.cell_type != expected {
            return Err(CellError::UnexpectedCellType {
                expected: expected.name(),
                actual: self.cell_type.name(),
            });
        }
        Ok(())
    }

    fn flags(&self) -> CellFlags {
        let mut flags = CellFlags::empty();
        flags.set(CellFlags::HAS_IV, self.iv.is_some());
        flags.set(CellFlags::HAS_SALT, self.salt.is_some());
        flags.set(CellFlags::HAS_SIGNATURE, self.signature.is_some());
        flags.set(CellFlags::HAS_ADDR, self.addr.is_some());
        flags
    }

    /// Encode this cell to its tagged binary wire form.
    pub fn encode(&self) -> Result<Vec<u8>> {
        if self.payload.len() > MAX_CELL_PAYLOAD {
            return Err(CellError::FieldTooLarge {
                field: "payload",
                declared: self.payload.len(),
                max: MAX_CELL_PAYLOAD,
            });
        }
        if let Some(salt) = &self.salt {
            if salt.len() > MAX_SALT_LEN {
                return Err(CellError::FieldTooLarge {
                    field: "salt",
                    declared: salt.len(),
                    max: MAX_SALT_LEN,
                });
            }
        }
        if let Some(sig) = &self.signature {
            if sig.len() > u16::MAX as usize {
                return Err(CellError::FieldTooLarge {
                    field: "signature",
                    declared: sig.len(),
                    max: u16::MAX as usize,
                });
            }
        }

        let mut out = Vec::new();
        out.write_u8(self.cell_type.to_tag());
        out.write_u8(self.flags().bits());
        out.write_u16(self.payload.len() as u16);
        out.write_all(&self.payload);
        if let Some(iv) = &self.iv {
            out.write_all(iv);
        }
        if let Some(salt) = &self.salt {
            out.write_u8(salt.len() as u8);
            out.write_all(salt);
        }
        if let Some(sig) = &self.signature {
            out.write_u16(sig.len() as u16);
            out.write_all(sig);
        }
        if let Some((ip, port)) = &self.addr {
            out.write_all(&ip.octets());
            out.write_u16(*port);
        }
        Ok(out)
    }

    /// Decode a single cell from `bytes`, rejecting trailing bytes.
    ///
    /// Any malformed input (unknown tag, truncated field, oversized
    /// length) is reported as a [`CellError`]; callers MUST treat this as
    /// fatal to the connection the bytes arrived on.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::from_slice(bytes);
        let tag = r.take_u8()?;
        let cell_type = CellType::from_tag(tag)?;
        let flags = CellFlags::from_bits_truncate(r.take_u8()?);

        let payload_len = r.take_u16()? as usize;
        if payload_len > MAX_CELL_PAYLOAD {
            return Err(CellError::FieldTooLarge {
                field: "payload",
                declared: payload_len,
                max: MAX_CELL_PAYLOAD,
            });
        }
        let payload = r.take(payload_len)?.to_vec();

        let iv = if flags.contains(CellFlags::HAS_IV) {
            let raw = r.take(IV_LEN)?;
            let mut iv = [0u8; IV_LEN];
            iv.copy_from_slice(raw);
            Some(iv)
        } else {
            None
        };

        let salt = if flags.contains(CellFlags::HAS_SALT) {
            let len = r.take_u8()? as usize;
            if len > MAX_SALT_LEN {
                return Err(CellError::FieldTooLarge {
                    field: "salt",
                    declared: len,
                    max: MAX_SALT_LEN,
                });
            }
            Some(r.take(len)?.to_vec())
        } else {
            None
        };

        let signature = if flags.contains(CellFlags::HAS_SIGNATURE) {
            let len = r.take_u16()? as usize;
            Some(r.take(len)?.to_vec())
        } else {
            None
        };

        let addr = if flags.contains(CellFlags::HAS_ADDR) {
            let octets = r.take(4)?;
            let ip = Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]);
            let port = r.take_u16()?;
            Some((ip, port))
        } else {
            None
        };

        r.should_be_exhausted()
            .map_err(|_| CellError::TrailingBytes(r.remaining()))?;

        Ok(Cell {
            cell_type,
            payload,
            iv,
            salt,
            signature,
            addr,
        })
    }
}
