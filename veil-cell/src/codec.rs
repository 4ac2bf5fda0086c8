//! Length-prefixed framing for [`Cell`] on a byte stream.
//!
//! The reference implementation this protocol was distilled from reads
//! fixed-size chunks (4096, 8192, 32768 bytes) off the wire and hopes a
//! whole pickled object landed inside one `recv()`; a TCP stream gives no
//! such guarantee. `CellCodec` instead prefixes every cell with its
//! encoded length, the same way the channel-cell codec this is modeled on
//! frames its cells, so a `Cell` can always be read back whole regardless
//! of how the underlying reads happen to be chunked.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::cell::{Cell, MAX_CELL_PAYLOAD};
use crate::err::CellError;

/// Upper bound on an entire encoded, length-prefixed frame. Generous
/// headroom over [`MAX_CELL_PAYLOAD`] for the cell's fixed-width and
/// length-prefixed header fields.
const MAX_FRAME_LEN: usize = MAX_CELL_PAYLOAD + 4096;

/// A `tokio_util::codec` [`Decoder`]/[`Encoder`] pair for [`Cell`], framed
/// as a big-endian `u32` byte length followed by that many bytes of
/// [`Cell::encode`] output.
#[derive(Default, Debug, Clone, Copy)]
pub struct CellCodec;

impl Encoder<Cell> for CellCodec {
    type Error = CellError;

    fn encode(&mut self, cell: Cell, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let body = cell.encode()?;
        if body.len() > MAX_FRAME_LEN {
            return Err(CellError::FieldTooLarge {
                field: "encoded cell",
                declared: body.len(),
                max: MAX_FRAME_LEN,
            });
        }
        dst.reserve(4 + body.len());
        dst.put_u32(body.len() as u32);
        dst.put_slice(&body);
        Ok(())
    }
}

impl Decoder for CellCodec {
    type Item = Cell;
    type Error = CellError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < 4 {
            return Ok(None);
        }
        let len = u32::from_be_bytes(src[..4].try_into().expect("checked len")) as usize;
        if len > MAX_FRAME_LEN {
            return Err(CellError::FieldTooLarge {
                field: "encoded cell",
                declared: len,
                max: MAX_FRAME_LEN,
            });
        }
        if src.len() < 4 + len {
            src.reserve(4 + len - src.len());
            return Ok(None);
        }
        src.advance(4);
        let body = src.split_to(len);
        Ok(Some(Cell::decode(&body)?))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cell::CellType;

    #[test]
    fn encodes_then_decodes_across_partial_reads() {
        let mut codec = CellCodec;
        let mut buf = BytesMut::new();
        codec.encode(Cell::req("http://example/"), &mut buf).unwrap();

        // Split the buffer to simulate a partial read: decode must return
        // `None` rather than erroring when the frame isn't fully buffered.
        let tail = buf.split_off(buf.len() - 2);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.unsplit(tail);
        let cell = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(cell.cell_type, CellType::Req);
        assert!(buf.is_empty());
    }

    #[test]
    fn oversized_frame_length_is_rejected() {
        let mut codec = CellCodec;
        let mut buf = BytesMut::new();
        buf.put_u32((MAX_FRAME_LEN + 1) as u32);
        assert!(codec.decode(&mut buf).is_err());
    }
}
