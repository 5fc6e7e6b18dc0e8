//! Little-endian cursor over a byte slice

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{MetadataError, Result};

/// Bounds-checked little-endian reader
#[derive(Debug, Clone)]
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn at(data: &'a [u8], pos: usize) -> Result<Self> {
        if pos > data.len() {
            return Err(MetadataError::UnexpectedEof {
                offset: pos,
                needed: 0,
            });
        }
        Ok(Self { data, pos })
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub(crate) fn read_slice(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(MetadataError::UnexpectedEof {
                offset: self.pos,
                needed: len,
            })?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub(crate) fn skip(&mut self, len: usize) -> Result<()> {
        self.read_slice(len).map(|_| ())
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_slice(1)?[0])
    }

    pub(crate) fn peek_u8(&self) -> Result<u8> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or(MetadataError::UnexpectedEof {
                offset: self.pos,
                needed: 1,
            })
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.read_slice(2)?))
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.read_slice(4)?))
    }

    pub(crate) fn read_u64(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.read_slice(8)?))
    }

    /// Read a 2- or 4-byte index
    pub(crate) fn read_index(&mut self, width: usize) -> Result<u32> {
        match width {
            2 => self.read_u16().map(u32::from),
            _ => self.read_u32(),
        }
    }

    /// Read an ECMA-335 compressed unsigned integer (II.23.2)
    pub(crate) fn read_compressed(&mut self) -> Result<u32> {
        let start = self.pos;
        let b0 = u32::from(self.read_u8()?);
        if b0 & 0x80 == 0 {
            Ok(b0)
        } else if b0 & 0xC0 == 0x80 {
            let b1 = u32::from(self.read_u8()?);
            Ok(((b0 & 0x3F) << 8) | b1)
        } else if b0 & 0xE0 == 0xC0 {
            let rest = self.read_slice(3)?;
            Ok(((b0 & 0x1F) << 24)
                | (u32::from(rest[0]) << 16)
                | (u32::from(rest[1]) << 8)
                | u32::from(rest[2]))
        } else {
            Err(MetadataError::InvalidCompressed(start))
        }
    }

    /// Read a NUL-terminated string padded to a 4-byte boundary
    pub(crate) fn read_padded_cstr(&mut self) -> Result<&'a [u8]> {
        let start = self.pos;
        let rest = &self.data[start..];
        let len = rest
            .iter()
            .position(|b| *b == 0)
            .ok_or(MetadataError::UnexpectedEof {
                offset: start,
                needed: rest.len() + 1,
            })?;
        let name = &rest[..len];
        let padded = (len + 1 + 3) & !3;
        self.skip(padded)?;
        Ok(name)
    }
}

/// Encode an ECMA-335 compressed unsigned integer
#[cfg(any(test, feature = "test-utils"))]
pub(crate) fn compress_u32(value: u32, out: &mut Vec<u8>) {
    if value < 0x80 {
        out.push(value as u8);
    } else if value < 0x4000 {
        out.push(0x80 | (value >> 8) as u8);
        out.push(value as u8);
    } else {
        out.push(0xC0 | ((value >> 24) & 0x1F) as u8);
        out.push((value >> 16) as u8);
        out.push((value >> 8) as u8);
        out.push(value as u8);
    }
}
