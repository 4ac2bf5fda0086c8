//! Helpers for encoding and decoding the length-prefixed, tagged binary
//! records ("cells") that veil sends over the wire.
//!
//! This is deliberately a minimal, explicit-framing byte codec rather than
//! an object-graph serializer: every field has a known length before it is
//! read, and a truncated or oversized input is always a recoverable
//! [`Error`], never undefined behavior.

mod err;
mod impls;
mod reader;
mod writer;

pub use err::{EncodeError, Error};
pub use reader::Reader;
pub use writer::Writer;

/// Result type for [`Reader`]-related methods.
pub type Result<T> = std::result::Result<T, Error>;
/// Result type for [`Writer`]-related methods.
pub type EncodeResult<T> = std::result::Result<T, EncodeError>;

/// An object that can be encoded onto a [`Writer`].
pub trait Writeable {
    /// Encode this object into the writer `b`.
    fn write_onto<B: Writer + ?Sized>(&self, b: &mut B) -> EncodeResult<()>;
}

/// An object that can be extracted from a [`Reader`].
pub trait Readable: Sized {
    /// Try to extract an object of this type from a reader.
    fn take_from(b: &mut Reader<'_>) -> Result<Self>;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn writer_basics() {
        let mut v: Vec<u8> = Vec::new();
        v.write_u8(0x57);
        v.write_u16(0x6520);
        v.write_u32(0x68617665);
        v.write_all(b"a machine");
        v.write_zeros(2);
        assert_eq!(&v[..], &b"We have a machine\0\0"[..]);
    }

    #[test]
    fn reader_roundtrips_writer() {
        let mut v: Vec<u8> = Vec::new();
        v.write_u8(7);
        v.write_u16(300);
        v.write_u32(70_000);
        v.write_all(b"tail");

        let mut r = Reader::from_slice(&v);
        assert_eq!(r.take_u8().unwrap(), 7);
        assert_eq!(r.take_u16().unwrap(), 300);
        assert_eq!(r.take_u32().unwrap(), 70_000);
        assert_eq!(r.take(4).unwrap(), b"tail");
        r.should_be_exhausted().unwrap();
    }

    #[test]
    fn reader_rejects_truncation() {
        let v = vec![0u8; 1];
        let mut r = Reader::from_slice(&v);
        assert!(r.take_u16().is_err());
    }
}
