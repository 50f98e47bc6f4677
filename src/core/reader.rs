//! Sequential bounds-checked binary reader.
//!
//! `BufferReader` decodes a trusted-format-but-untrusted-content byte buffer.
//! Every read asserts enough remaining bytes exist *before* touching them and
//! fails with [`ProtocolError::BufferUnderrun`] otherwise — the primary
//! defense against truncated or malicious network and disk input.
//!
//! Zero-copy reads ([`BufferReader::read_slice`], [`BufferReader::end_data`])
//! return references tied to the source buffer's lifetime; the borrow checker
//! enforces that views never outlive the bytes they alias.

use crate::core::varint;
use crate::error::{ProtocolError, Result};
use crate::utils::hash;

/// Bounds-checked read cursor over an immutable byte buffer.
#[derive(Debug)]
pub struct BufferReader<'a> {
    data: &'a [u8],
    offset: usize,
    stack: Vec<usize>,
}

impl<'a> BufferReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            offset: 0,
            stack: Vec::new(),
        }
    }

    /// Remaining unread byte count. Reaches 0 exactly when the buffer is
    /// fully consumed.
    pub fn left(&self) -> usize {
        self.data.len() - self.offset
    }

    /// Current absolute offset.
    pub fn offset(&self) -> usize {
        self.offset
    }

    fn check(&self, needed: usize) -> Result<()> {
        if self.left() < needed {
            return Err(ProtocolError::BufferUnderrun {
                needed,
                available: self.left(),
            });
        }
        Ok(())
    }

    /// Relative repositioning, validated against buffer bounds in both
    /// directions.
    pub fn seek(&mut self, delta: i64) -> Result<()> {
        let target = self.offset as i64 + delta;
        if target < 0 || target > self.data.len() as i64 {
            return Err(ProtocolError::SeekOutOfBounds {
                delta,
                offset: self.offset,
                len: self.data.len(),
            });
        }
        self.offset = target as usize;
        Ok(())
    }

    /// Push the current offset for later span measurement.
    pub fn start(&mut self) {
        self.stack.push(self.offset);
    }

    /// Pop the innermost span mark and return the consumed length.
    ///
    /// # Panics
    ///
    /// Panics if no matching `start()` exists — a caller bug, not input
    /// corruption.
    pub fn end_len(&mut self) -> usize {
        let start = self
            .stack
            .pop()
            .expect("BufferReader span stack popped when empty");
        self.offset - start
    }

    /// Pop the innermost span mark and return the consumed byte range as a
    /// view into the source buffer.
    ///
    /// # Panics
    ///
    /// Panics if no matching `start()` exists.
    pub fn end_data(&mut self) -> &'a [u8] {
        let start = self
            .stack
            .pop()
            .expect("BufferReader span stack popped when empty");
        &self.data[start..self.offset]
    }

    /// Double-SHA256 the bytes since the last `start()` mark, read the next
    /// 4 bytes as the expected checksum, and fail on mismatch.
    pub fn verify_checksum(&mut self) -> Result<()> {
        let span = self.end_data();
        let expected = self.read_bytes_array::<4>()?;
        if hash::checksum(span) != expected {
            return Err(ProtocolError::ChecksumMismatch);
        }
        Ok(())
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        self.check(n)?;
        let slice = &self.data[self.offset..self.offset + n];
        self.offset += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_bytes_array()?))
    }

    pub fn read_u16_be(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.read_bytes_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_bytes_array()?))
    }

    pub fn read_u32_be(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.read_bytes_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_bytes_array()?))
    }

    pub fn read_u64_be(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.read_bytes_array()?))
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.take(1)?[0] as i8)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_le_bytes(self.read_bytes_array()?))
    }

    pub fn read_i16_be(&mut self) -> Result<i16> {
        Ok(i16::from_be_bytes(self.read_bytes_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_bytes_array()?))
    }

    pub fn read_i32_be(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.read_bytes_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.read_bytes_array()?))
    }

    pub fn read_i64_be(&mut self) -> Result<i64> {
        Ok(i64::from_be_bytes(self.read_bytes_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.read_bytes_array()?))
    }

    pub fn read_f32_be(&mut self) -> Result<f32> {
        Ok(f32::from_be_bytes(self.read_bytes_array()?))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.read_bytes_array()?))
    }

    pub fn read_f64_be(&mut self) -> Result<f64> {
        Ok(f64::from_be_bytes(self.read_bytes_array()?))
    }

    /// CompactSize varint; the consumed byte count is reflected in the
    /// advancing offset, and is also available from [`varint::decode`] for
    /// callers that need to skip without decoding.
    pub fn read_varint(&mut self) -> Result<u64> {
        let (value, consumed) = varint::decode(&self.data[self.offset..])?;
        self.offset += consumed;
        Ok(value)
    }

    /// Owned copy of the next `n` bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        Ok(self.take(n)?.to_vec())
    }

    /// Fixed-width read into an array, for hash and checksum fields.
    pub fn read_bytes_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Zero-copy view of the next `n` bytes, aliasing the source buffer.
    pub fn read_slice(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n)
    }

    /// Varint-length-prefixed bytes. `limit` bounds the claimed length
    /// *before* allocation; attacker-supplied absurd lengths fail instead of
    /// over-allocating.
    pub fn read_var_bytes(&mut self, limit: usize) -> Result<Vec<u8>> {
        let len = self.read_varint()?;
        if len > limit as u64 {
            return Err(ProtocolError::OversizedAllocation {
                claimed: len,
                limit: limit as u64,
            });
        }
        self.read_bytes(len as usize)
    }

    /// Varint-length-prefixed UTF-8 string with the same length guard.
    pub fn read_var_string(&mut self, limit: usize) -> Result<String> {
        let bytes = self.read_var_bytes(limit)?;
        String::from_utf8(bytes).map_err(|_| ProtocolError::InvalidString)
    }

    /// Scan forward for a NUL terminator; fails if none exists before the
    /// end of the buffer.
    pub fn read_null_string(&mut self) -> Result<String> {
        let rest = &self.data[self.offset..];
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(ProtocolError::NoNullTerminator)?;
        let bytes = self.take(nul)?.to_vec();
        self.offset += 1; // terminator
        String::from_utf8(bytes).map_err(|_| ProtocolError::InvalidString)
    }
}
