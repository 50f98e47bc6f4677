//! Bitcoin CompactSize variable-length integers.
//!
//! Values below `0xfd` occupy one byte; larger values are tagged with
//! `0xfd`/`0xfe`/`0xff` followed by a little-endian u16/u32/u64. Decoding
//! rejects non-canonical encodings (a value that would have fit in a shorter
//! form) so that serializations stay byte-exact under round-trips.

use crate::error::{ProtocolError, Result};

/// Encoded width in bytes for a given value.
pub fn size(value: u64) -> usize {
    match value {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

/// Encode into a fixed scratch buffer, returning the buffer and the
/// number of significant bytes.
pub fn encode(value: u64) -> ([u8; 9], usize) {
    let mut buf = [0u8; 9];
    match value {
        0..=0xfc => {
            buf[0] = value as u8;
            (buf, 1)
        }
        0xfd..=0xffff => {
            buf[0] = 0xfd;
            buf[1..3].copy_from_slice(&(value as u16).to_le_bytes());
            (buf, 3)
        }
        0x1_0000..=0xffff_ffff => {
            buf[0] = 0xfe;
            buf[1..5].copy_from_slice(&(value as u32).to_le_bytes());
            (buf, 5)
        }
        _ => {
            buf[0] = 0xff;
            buf[1..9].copy_from_slice(&value.to_le_bytes());
            (buf, 9)
        }
    }
}

/// Decode from the front of `data`, returning the value and the number of
/// bytes consumed.
pub fn decode(data: &[u8]) -> Result<(u64, usize)> {
    let tag = *data.first().ok_or(ProtocolError::BufferUnderrun {
        needed: 1,
        available: 0,
    })?;

    let need = |n: usize| -> Result<()> {
        if data.len() < n {
            Err(ProtocolError::BufferUnderrun {
                needed: n,
                available: data.len(),
            })
        } else {
            Ok(())
        }
    };

    match tag {
        0xfd => {
            need(3)?;
            let value = u16::from_le_bytes([data[1], data[2]]) as u64;
            if value < 0xfd {
                return Err(ProtocolError::NonCanonicalVarInt);
            }
            Ok((value, 3))
        }
        0xfe => {
            need(5)?;
            let value = u32::from_le_bytes([data[1], data[2], data[3], data[4]]) as u64;
            if value <= 0xffff {
                return Err(ProtocolError::NonCanonicalVarInt);
            }
            Ok((value, 5))
        }
        0xff => {
            need(9)?;
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&data[1..9]);
            let value = u64::from_le_bytes(bytes);
            if value <= 0xffff_ffff {
                return Err(ProtocolError::NonCanonicalVarInt);
            }
            Ok((value, 9))
        }
        value => Ok((value as u64, 1)),
    }
}
