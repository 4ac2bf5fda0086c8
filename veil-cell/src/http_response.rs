//! Wire encoding for the exit relay's HTTP response record.
//!
//! The reference implementation pickles an entire `requests.Response`
//! object across the wire; this is the minimal record this system
//! actually needs — status, headers, and body, per the exit's serialized
//! response — encoded the same explicit, length-prefixed way as every
//! other cell payload.

use veil_bytes::{Reader, Writer};

use crate::err::{CellError, Result};

/// Upper bound on a response body, matching [`crate::MAX_CELL_PAYLOAD`]'s
/// role of bounding how much a single exchange can allocate.
const MAX_BODY_LEN: usize = 64 << 20;

/// Maximum number of header fields one response may carry, and the
/// maximum length of one header's name or value, bounding memory the
/// same way [`crate::directory::decode_entries`] bounds a listing.
const MAX_HEADERS: usize = u16::MAX as usize;
const MAX_HEADER_FIELD_LEN: usize = u16::MAX as usize;

/// The exit relay's record of one HTTP response, reassembled by the
/// originator from a `CONTINUE`/`FINISHED` chunk stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    /// The destination server's HTTP status code.
    pub status: u16,
    /// The response headers, in the order the destination server sent
    /// them. A header repeated across multiple lines appears as
    /// multiple entries with the same name.
    pub headers: Vec<(String, String)>,
    /// The response body, exactly as received.
    pub body: Vec<u8>,
}

fn write_field(out: &mut Vec<u8>, field: &'static str, s: &str) -> Result<()> {
    if s.len() > MAX_HEADER_FIELD_LEN {
        return Err(CellError::FieldTooLarge {
            field,
            declared: s.len(),
            max: MAX_HEADER_FIELD_LEN,
        });
    }
    out.write_u16(s.len() as u16);
    out.write_all(s.as_bytes());
    Ok(())
}

fn take_field(r: &mut Reader<'_>) -> Result<String> {
    let len = r.take_u16()? as usize;
    let bytes = r.take(len)?;
    String::from_utf8(bytes.to_vec()).map_err(|_| CellError::Truncated("non-UTF-8 header field".into()))
}

impl HttpResponse {
    /// Serialize this response for chunking into `CONTINUE`/`FINISHED` cells.
    pub fn encode(&self) -> Result<Vec<u8>> {
        if self.headers.len() > MAX_HEADERS {
            return Err(CellError::FieldTooLarge {
                field: "headers",
                declared: self.headers.len(),
                max: MAX_HEADERS,
            });
        }
        let mut out = Vec::with_capacity(8 + self.body.len());
        out.write_u16(self.status);
        out.write_u16(self.headers.len() as u16);
        for (name, value) in &self.headers {
            write_field(&mut out, "header name", name)?;
            write_field(&mut out, "header value", value)?;
        }
        out.write_u32(self.body.len() as u32);
        out.write_all(&self.body);
        Ok(out)
    }

    /// Parse a response previously produced by [`HttpResponse::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::from_slice(bytes);
        let status = r.take_u16()?;

        let header_count = r.take_u16()? as usize;
        if header_count > MAX_HEADERS {
            return Err(CellError::FieldTooLarge {
                field: "headers",
                declared: header_count,
                max: MAX_HEADERS,
            });
        }
        let mut headers = Vec::with_capacity(header_count);
        for _ in 0..header_count {
            let name = take_field(&mut r)?;
            let value = take_field(&mut r)?;
            headers.push((name, value));
        }

        let body_len = r.take_u32()? as usize;
        if body_len > MAX_BODY_LEN {
            return Err(CellError::FieldTooLarge {
                field: "http response body",
                declared: body_len,
                max: MAX_BODY_LEN,
            });
        }
        let body = r.take(body_len)?.to_vec();
        r.should_be_exhausted()
            .map_err(|_| CellError::TrailingBytes(r.remaining()))?;
        Ok(HttpResponse { status, headers, body })
    }
}
