//! # Codec - Primitive Binary Encoding
//!
//! Deterministic encode/decode of the primitives journal records and
//! on-disk tables are built from.
//!
//! ## Encodings
//!
//! ```text
//! i8 / bool      1 byte
//! i16            2 bytes LE
//! i32 / f32      4 bytes LE
//! i64 / f64      8 bytes LE
//! string         [len: varint][utf-8 bytes]
//! ```
//!
//! ## Varint
//!
//! Lengths are base-128 with the least significant group first. Every byte
//! carries 7 payload bits; a set high bit (`0x80`) means another byte
//! follows.
//!
//! ```text
//! 0      -> 00
//! 127    -> 7f
//! 128    -> 80 01
//! 16384  -> 80 80 01
//! ```
//!
//! ## Bounds
//!
//! [`SliceWriter`] and [`SliceReader`] treat the length of the slice they
//! wrap as the extent. Any access that would cross it fails with
//! [`CodecError::Bounds`] and leaves both the buffer and the cursor
//! untouched.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use thiserror::Error;

/// Longest possible varint for a 64-bit value.
pub const MAX_VARINT_LEN: usize = 10;

/// Errors raised by the codec.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A read or write would cross the end of the buffer.
    #[error("out of bounds: {len} bytes at offset {offset} exceeds extent {limit}")]
    Bounds {
        offset: usize,
        len: usize,
        limit: usize,
    },

    /// A value cannot be represented (negative length, overlong varint,
    /// invalid UTF-8).
    #[error("encoding error: {0}")]
    Encoding(String),
}

pub type Result<T> = std::result::Result<T, CodecError>;

/// Varint-encodes `value` into `out`, returning the number of bytes used.
///
/// Negative values are rejected with [`CodecError::Encoding`].
pub fn encode_varint(value: i64, out: &mut [u8; MAX_VARINT_LEN]) -> Result<usize> {
    if value < 0 {
        return Err(CodecError::Encoding(format!(
            "varint cannot encode negative value {value}"
        )));
    }
    let mut v = value as u64;
    let mut n = 0;
    while v > 0x7f {
        out[n] = 0x80 | (v & 0x7f) as u8;
        v >>= 7;
        n += 1;
    }
    out[n] = v as u8;
    Ok(n + 1)
}

/// Number of bytes `value` occupies as a varint.
pub fn varint_len(value: u64) -> usize {
    let mut v = value;
    let mut n = 1;
    while v > 0x7f {
        v >>= 7;
        n += 1;
    }
    n
}

/// Full on-wire size of `s`: length prefix plus payload.
pub fn encoded_string_len(s: &str) -> usize {
    varint_len(s.len() as u64) + s.len()
}

/// Decodes a varint starting at `buf[pos]`, returning `(value, bytes_read)`.
pub fn decode_varint(buf: &[u8], pos: usize) -> Result<(u64, usize)> {
    let mut value = 0u64;
    let mut shift = 0u32;
    let mut i = 0;
    loop {
        if i == MAX_VARINT_LEN {
            return Err(CodecError::Encoding(format!(
                "varint at offset {pos} longer than {MAX_VARINT_LEN} bytes"
            )));
        }
        let at = pos + i;
        let b = *buf.get(at).ok_or(CodecError::Bounds {
            offset: at,
            len: 1,
            limit: buf.len(),
        })?;
        value |= u64::from(b & 0x7f) << shift;
        i += 1;
        if b & 0x80 == 0 {
            return Ok((value, i));
        }
        shift += 7;
    }
}

fn check(offset: usize, len: usize, limit: usize) -> Result<()> {
    match offset.checked_add(len) {
        Some(end) if end <= limit => Ok(()),
        _ => Err(CodecError::Bounds { offset, len, limit }),
    }
}

/// Positioned writer over a fixed-size buffer.
pub struct SliceWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> SliceWriter<'a> {
    /// Starts writing at `pos`. The extent is `buf.len()`.
    pub fn new(buf: &'a mut [u8], pos: usize) -> Self {
        Self { buf, pos }
    }

    /// Offset of the next byte to be written.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left before the extent.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    fn reserve(&mut self, len: usize) -> Result<&mut [u8]> {
        check(self.pos, len, self.buf.len())?;
        let start = self.pos;
        self.pos += len;
        Ok(&mut self.buf[start..start + len])
    }

    pub fn write_i8(&mut self, v: i8) -> Result<()> {
        self.reserve(1)?[0] = v as u8;
        Ok(())
    }

    pub fn write_u8(&mut self, v: u8) -> Result<()> {
        self.reserve(1)?[0] = v;
        Ok(())
    }

    pub fn write_bool(&mut self, v: bool) -> Result<()> {
        self.write_u8(u8::from(v))
    }

    pub fn write_i16(&mut self, v: i16) -> Result<()> {
        LittleEndian::write_i16(self.reserve(2)?, v);
        Ok(())
    }

    pub fn write_i32(&mut self, v: i32) -> Result<()> {
        LittleEndian::write_i32(self.reserve(4)?, v);
        Ok(())
    }

    pub fn write_i64(&mut self, v: i64) -> Result<()> {
        LittleEndian::write_i64(self.reserve(8)?, v);
        Ok(())
    }

    pub fn write_f32(&mut self, v: f32) -> Result<()> {
        LittleEndian::write_f32(self.reserve(4)?, v);
        Ok(())
    }

    pub fn write_f64(&mut self, v: f64) -> Result<()> {
        LittleEndian::write_f64(self.reserve(8)?, v);
        Ok(())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.reserve(bytes.len())?.copy_from_slice(bytes);
        Ok(())
    }

    /// Writes a varint length prefix followed by the UTF-8 payload.
    ///
    /// Space for prefix and payload is checked together, so on failure
    /// nothing is written.
    pub fn write_string(&mut self, s: &str) -> Result<()> {
        let mut prefix = [0u8; MAX_VARINT_LEN];
        let n = encode_varint(s.len() as i64, &mut prefix)?;
        check(self.pos, n + s.len(), self.buf.len())?;
        self.write_bytes(&prefix[..n])?;
        self.write_bytes(s.as_bytes())
    }
}

/// Positioned reader over a byte slice.
pub struct SliceReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> SliceReader<'a> {
    /// Starts reading at `pos`. The extent is `buf.len()`.
    pub fn new(buf: &'a [u8], pos: usize) -> Self {
        Self { buf, pos }
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        check(self.pos, len, self.buf.len())?;
        let start = self.pos;
        self.pos += len;
        Ok(&self.buf[start..start + len])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.take(1)?[0] as i8)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(LittleEndian::read_i16(self.take(2)?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(LittleEndian::read_i32(self.take(4)?))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(LittleEndian::read_i64(self.take(8)?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.take(8)?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(LittleEndian::read_f32(self.take(4)?))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(LittleEndian::read_f64(self.take(8)?))
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.take(len)
    }

    pub fn read_varint(&mut self) -> Result<u64> {
        let (value, n) = decode_varint(self.buf, self.pos)?;
        self.pos += n;
        Ok(value)
    }

    /// Reads a varint-prefixed UTF-8 string.
    ///
    /// The cursor only moves if the whole string was readable.
    pub fn read_string(&mut self) -> Result<String> {
        let start = self.pos;
        let len = self.read_varint()?;
        let len = usize::try_from(len)
            .map_err(|_| CodecError::Encoding(format!("string length {len} too large")))?;
        let bytes = match self.take(len) {
            Ok(b) => b,
            Err(e) => {
                self.pos = start;
                return Err(e);
            }
        };
        match std::str::from_utf8(bytes) {
            Ok(s) => Ok(s.to_owned()),
            Err(e) => {
                self.pos = start;
                Err(CodecError::Encoding(format!("invalid utf-8 at offset {start}: {e}")))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Growable-buffer helpers used by in-memory file builders.
// ---------------------------------------------------------------------------

/// Appends a varint to `out`.
pub fn put_varint(out: &mut Vec<u8>, value: u64) {
    let mut v = value;
    while v > 0x7f {
        out.push(0x80 | (v & 0x7f) as u8);
        v >>= 7;
    }
    out.push(v as u8);
}

/// Appends a varint-prefixed UTF-8 string to `out`.
pub fn put_string(out: &mut Vec<u8>, s: &str) {
    put_varint(out, s.len() as u64);
    out.extend_from_slice(s.as_bytes());
}

pub fn put_i16(out: &mut Vec<u8>, v: i16) {
    // Writing into a Vec cannot fail.
    let _ = out.write_i16::<LittleEndian>(v);
}

pub fn put_i32(out: &mut Vec<u8>, v: i32) {
    let _ = out.write_i32::<LittleEndian>(v);
}

pub fn put_i64(out: &mut Vec<u8>, v: i64) {
    let _ = out.write_i64::<LittleEndian>(v);
}

pub fn put_u32(out: &mut Vec<u8>, v: u32) {
    let _ = out.write_u32::<LittleEndian>(v);
}

pub fn put_u64(out: &mut Vec<u8>, v: u64) {
    let _ = out.write_u64::<LittleEndian>(v);
}

pub fn put_f64(out: &mut Vec<u8>, v: f64) {
    let _ = out.write_f64::<LittleEndian>(v);
}
