use bytemuck::Pod;

use crate::error::{Error, Result};

/// One independently allocated, zero-initialized byte block.
///
/// Regions back every piece of segment storage: the slot slab, the
/// per-segment scratch buffer, and each overflow block. Freeing a block
/// is dropping its `Region`.
pub struct Region {
    bytes: Box<[u8]>,
}

impl Region {
    pub fn alloc(size: usize) -> Self {
        Self {
            bytes: vec![0u8; size].into_boxed_slice(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Cursor for reading `len` bytes starting at `offset`.
    pub fn reader(&self, offset: usize, len: usize) -> Result<ByteReader<'_>> {
        self.check_window(offset, len)?;
        Ok(ByteReader::new(&self.bytes[offset..offset + len]))
    }

    /// Cursor for writing `len` bytes starting at `offset`.
    pub fn writer(&mut self, offset: usize, len: usize) -> Result<ByteWriter<'_>> {
        self.check_window(offset, len)?;
        Ok(ByteWriter::new(&mut self.bytes[offset..offset + len]))
    }

    fn check_window(&self, offset: usize, len: usize) -> Result<()> {
        let in_bounds = offset
            .checked_add(len)
            .is_some_and(|end| end <= self.bytes.len());
        if in_bounds {
            Ok(())
        } else {
            Err(Error::OutOfBounds {
                requested: len,
                remaining: self.bytes.len().saturating_sub(offset),
            })
        }
    }
}

impl AsRef<[u8]> for Region {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl AsMut<[u8]> for Region {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

/// Bounds-checked read cursor over a byte range.
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(Error::OutOfBounds {
                requested: len,
                remaining: self.remaining(),
            });
        }
        let out = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Fixed-width read of any Pod type, unaligned.
    pub fn read_pod<T: Pod>(&mut self) -> Result<T> {
        let bytes = self.take(std::mem::size_of::<T>())?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.take(len)
    }

    /// Stop-bit varint: 7 data bits per byte, high bit set means continue.
    pub fn read_stop_bit(&mut self) -> Result<u64> {
        let mut value = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = self.read_u8()?;
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
            if shift >= 64 {
                return Err(Error::Decode("stop-bit varint too long".into()));
            }
        }
    }

    /// Length-prefixed UTF-8 text: stop-bit byte length, then the bytes.
    pub fn read_str(&mut self) -> Result<&'a str> {
        let len = self.read_stop_bit()? as usize;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes).map_err(|e| Error::Decode(e.to_string()))
    }
}

/// Bounds-checked write cursor over a byte range.
pub struct ByteWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> ByteWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn write_u8(&mut self, byte: u8) -> Result<()> {
        self.write_bytes(&[byte])
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() > self.remaining() {
            return Err(Error::OutOfBounds {
                requested: bytes.len(),
                remaining: self.remaining(),
            });
        }
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
        Ok(())
    }

    /// Fixed-width write of any Pod type.
    pub fn write_pod<T: Pod>(&mut self, value: &T) -> Result<()> {
        self.write_bytes(bytemuck::bytes_of(value))
    }

    pub fn write_stop_bit(&mut self, mut value: u64) -> Result<()> {
        while value >= 0x80 {
            self.write_u8((value as u8) | 0x80)?;
            value >>= 7;
        }
        self.write_u8(value as u8)
    }

    pub fn write_str(&mut self, text: &str) -> Result<()> {
        self.write_stop_bit(text.len() as u64)?;
        self.write_bytes(text.as_bytes())
    }
}
