//! `Readable`/`Writeable` implementations for a few basic types.

use crate::{EncodeResult, Readable, Reader, Result, Writeable, Writer};

impl Writeable for [u8] {
    fn write_onto<B: Writer + ?Sized>(&self, b: &mut B) -> EncodeResult<()> {
        b.write_all(self);
        Ok(())
    }
}

impl Writeable for Vec<u8> {
    fn write_onto<B: Writer + ?Sized>(&self, b: &mut B) -> EncodeResult<()> {
        b.write_all(&self[..]);
        Ok(())
    }
}

impl Readable for u8 {
    fn take_from(b: &mut Reader<'_>) -> Result<Self> {
        b.take_u8()
    }
}

impl Readable for u16 {
    fn take_from(b: &mut Reader<'_>) -> Result<Self> {
        b.take_u16()
    }
}

impl Readable for u32 {
    fn take_from(b: &mut Reader<'_>) -> Result<Self> {
        b.take_u32()
    }
}
