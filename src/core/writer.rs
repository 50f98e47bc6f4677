//! Queued-operation binary writer.
//!
//! `BufferWriter` accumulates typed write instructions without touching
//! memory until [`BufferWriter::render`], which allocates exactly one buffer
//! of the exact final size and replays the instructions in order. The running
//! size counter is maintained incrementally as operations are queued, so the
//! same call sequence doubles as a size calculator: queue the writes, read
//! [`BufferWriter::size`], and drop the writer without ever rendering.
//!
//! A writer is single-use: after `render(false)` it is poisoned and any
//! further operation panics rather than silently producing garbage.

use crate::core::varint;
use crate::utils::hash;

/// A single queued write instruction.
#[derive(Debug, Clone)]
enum WriteOp {
    U8(u8),
    U16(u16),
    U16Be(u16),
    U32(u32),
    U32Be(u32),
    U64(u64),
    U64Be(u64),
    I8(i8),
    I16(i16),
    I16Be(i16),
    I32(i32),
    I32Be(i32),
    I64(i64),
    I64Be(i64),
    F32(f32),
    F32Be(f32),
    F64(f64),
    F64Be(f64),
    VarInt(u64),
    Bytes(Vec<u8>),
    VarBytes(Vec<u8>),
    NullString(Vec<u8>),
    /// Reserve bytes without writing; rendered as zeroes.
    Seek(usize),
    Fill {
        value: u8,
        len: usize,
    },
    /// Render-time double-SHA256 over everything written so far.
    Checksum,
}

impl WriteOp {
    fn encoded_len(&self) -> usize {
        match self {
            WriteOp::U8(_) | WriteOp::I8(_) => 1,
            WriteOp::U16(_) | WriteOp::U16Be(_) | WriteOp::I16(_) | WriteOp::I16Be(_) => 2,
            WriteOp::U32(_)
            | WriteOp::U32Be(_)
            | WriteOp::I32(_)
            | WriteOp::I32Be(_)
            | WriteOp::F32(_)
            | WriteOp::F32Be(_)
            | WriteOp::Checksum => 4,
            WriteOp::U64(_)
            | WriteOp::U64Be(_)
            | WriteOp::I64(_)
            | WriteOp::I64Be(_)
            | WriteOp::F64(_)
            | WriteOp::F64Be(_) => 8,
            WriteOp::VarInt(v) => varint::size(*v),
            WriteOp::Bytes(b) => b.len(),
            WriteOp::VarBytes(b) => varint::size(b.len() as u64) + b.len(),
            WriteOp::NullString(b) => b.len() + 1,
            WriteOp::Seek(n) | WriteOp::Fill { len: n, .. } => *n,
        }
    }

    /// Width of the rendered checksum marker.
    const CHECKSUM_LEN: usize = 4;
}

/// Deterministic binary writer with exact lazy size calculation.
#[derive(Debug, Default)]
pub struct BufferWriter {
    ops: Vec<WriteOp>,
    written: usize,
    poisoned: bool,
}

impl BufferWriter {
    pub fn new() -> Self {
        Self {
            ops: Vec::new(),
            written: 0,
            poisoned: false,
        }
    }

    /// Exact byte length of the buffer `render` would produce right now.
    pub fn size(&self) -> usize {
        self.written
    }

    fn push(&mut self, op: WriteOp) -> &mut Self {
        assert!(!self.poisoned, "BufferWriter used after render");
        self.written += op.encoded_len();
        self.ops.push(op);
        self
    }

    pub fn write_u8(&mut self, v: u8) -> &mut Self {
        self.push(WriteOp::U8(v))
    }

    pub fn write_u16(&mut self, v: u16) -> &mut Self {
        self.push(WriteOp::U16(v))
    }

    pub fn write_u16_be(&mut self, v: u16) -> &mut Self {
        self.push(WriteOp::U16Be(v))
    }

    pub fn write_u32(&mut self, v: u32) -> &mut Self {
        self.push(WriteOp::U32(v))
    }

    pub fn write_u32_be(&mut self, v: u32) -> &mut Self {
        self.push(WriteOp::U32Be(v))
    }

    pub fn write_u64(&mut self, v: u64) -> &mut Self {
        self.push(WriteOp::U64(v))
    }

    pub fn write_u64_be(&mut self, v: u64) -> &mut Self {
        self.push(WriteOp::U64Be(v))
    }

    pub fn write_i8(&mut self, v: i8) -> &mut Self {
        self.push(WriteOp::I8(v))
    }

    pub fn write_i16(&mut self, v: i16) -> &mut Self {
        self.push(WriteOp::I16(v))
    }

    pub fn write_i16_be(&mut self, v: i16) -> &mut Self {
        self.push(WriteOp::I16Be(v))
    }

    pub fn write_i32(&mut self, v: i32) -> &mut Self {
        self.push(WriteOp::I32(v))
    }

    pub fn write_i32_be(&mut self, v: i32) -> &mut Self {
        self.push(WriteOp::I32Be(v))
    }

    pub fn write_i64(&mut self, v: i64) -> &mut Self {
        self.push(WriteOp::I64(v))
    }

    pub fn write_i64_be(&mut self, v: i64) -> &mut Self {
        self.push(WriteOp::I64Be(v))
    }

    pub fn write_f32(&mut self, v: f32) -> &mut Self {
        self.push(WriteOp::F32(v))
    }

    pub fn write_f32_be(&mut self, v: f32) -> &mut Self {
        self.push(WriteOp::F32Be(v))
    }

    pub fn write_f64(&mut self, v: f64) -> &mut Self {
        self.push(WriteOp::F64(v))
    }

    pub fn write_f64_be(&mut self, v: f64) -> &mut Self {
        self.push(WriteOp::F64Be(v))
    }

    /// CompactSize varint. Lengths are unsigned by construction in this API;
    /// callers converting from signed domains must reject negatives first.
    pub fn write_varint(&mut self, v: u64) -> &mut Self {
        self.push(WriteOp::VarInt(v))
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> &mut Self {
        self.push(WriteOp::Bytes(data.to_vec()))
    }

    /// Varint length prefix followed by the raw bytes.
    pub fn write_var_bytes(&mut self, data: &[u8]) -> &mut Self {
        self.push(WriteOp::VarBytes(data.to_vec()))
    }

    pub fn write_string(&mut self, s: &str) -> &mut Self {
        self.push(WriteOp::Bytes(s.as_bytes().to_vec()))
    }

    pub fn write_var_string(&mut self, s: &str) -> &mut Self {
        self.push(WriteOp::VarBytes(s.as_bytes().to_vec()))
    }

    /// C-string style: raw bytes followed by a NUL terminator.
    pub fn write_null_string(&mut self, s: &str) -> &mut Self {
        self.push(WriteOp::NullString(s.as_bytes().to_vec()))
    }

    /// Reserve `n` bytes without writing, for later patching. Rendered as
    /// zeroes.
    pub fn seek(&mut self, n: usize) -> &mut Self {
        self.push(WriteOp::Seek(n))
    }

    /// `n` copies of `value`.
    pub fn fill(&mut self, value: u8, n: usize) -> &mut Self {
        self.push(WriteOp::Fill { value, len: n })
    }

    /// Marker for a 4-byte checksum over everything written before it,
    /// computed at render time as the first 4 bytes of double-SHA256.
    pub fn write_checksum(&mut self) -> &mut Self {
        self.push(WriteOp::Checksum)
    }

    /// Materialize the queued operations into exactly one buffer.
    ///
    /// With `keep == false` (the normal case) the writer is cleared and
    /// poisoned afterwards; any further use panics. `keep == true` retains
    /// the operation list for size-then-render reuse patterns.
    ///
    /// # Panics
    ///
    /// Panics if the writer was already rendered, or on the internal
    /// consistency failure of the final offset not matching the running
    /// size counter (a fatal programming error, never an input error).
    pub fn render(&mut self, keep: bool) -> Vec<u8> {
        assert!(!self.poisoned, "BufferWriter rendered twice");

        let mut buf = vec![0u8; self.written];
        let mut pos = 0usize;

        for op in &self.ops {
            let len = op.encoded_len();
            let dst = &mut buf[pos..pos + len];
            match op {
                WriteOp::U8(v) => dst.copy_from_slice(&v.to_le_bytes()),
                WriteOp::U16(v) => dst.copy_from_slice(&v.to_le_bytes()),
                WriteOp::U16Be(v) => dst.copy_from_slice(&v.to_be_bytes()),
                WriteOp::U32(v) => dst.copy_from_slice(&v.to_le_bytes()),
                WriteOp::U32Be(v) => dst.copy_from_slice(&v.to_be_bytes()),
                WriteOp::U64(v) => dst.copy_from_slice(&v.to_le_bytes()),
                WriteOp::U64Be(v) => dst.copy_from_slice(&v.to_be_bytes()),
                WriteOp::I8(v) => dst.copy_from_slice(&v.to_le_bytes()),
                WriteOp::I16(v) => dst.copy_from_slice(&v.to_le_bytes()),
                WriteOp::I16Be(v) => dst.copy_from_slice(&v.to_be_bytes()),
                WriteOp::I32(v) => dst.copy_from_slice(&v.to_le_bytes()),
                WriteOp::I32Be(v) => dst.copy_from_slice(&v.to_be_bytes()),
                WriteOp::I64(v) => dst.copy_from_slice(&v.to_le_bytes()),
                WriteOp::I64Be(v) => dst.copy_from_slice(&v.to_be_bytes()),
                WriteOp::F32(v) => dst.copy_from_slice(&v.to_le_bytes()),
                WriteOp::F32Be(v) => dst.copy_from_slice(&v.to_be_bytes()),
                WriteOp::F64(v) => dst.copy_from_slice(&v.to_le_bytes()),
                WriteOp::F64Be(v) => dst.copy_from_slice(&v.to_be_bytes()),
                WriteOp::VarInt(v) => {
                    let (scratch, n) = varint::encode(*v);
                    dst.copy_from_slice(&scratch[..n]);
                }
                WriteOp::Bytes(b) => dst.copy_from_slice(b),
                WriteOp::VarBytes(b) => {
                    let (scratch, n) = varint::encode(b.len() as u64);
                    dst[..n].copy_from_slice(&scratch[..n]);
                    dst[n..].copy_from_slice(b);
                }
                WriteOp::NullString(b) => {
                    dst[..b.len()].copy_from_slice(b);
                    dst[b.len()] = 0;
                }
                WriteOp::Seek(_) => {}
                WriteOp::Fill { value, len } => dst[..*len].fill(*value),
                WriteOp::Checksum => {
                    debug_assert_eq!(len, WriteOp::CHECKSUM_LEN);
                    let digest = hash::checksum(&buf[..pos]);
                    buf[pos..pos + WriteOp::CHECKSUM_LEN].copy_from_slice(&digest);
                }
            }
            pos += len;
        }

        assert_eq!(pos, buf.len(), "BufferWriter size accounting diverged");

        if !keep {
            self.ops.clear();
            self.written = 0;
            self.poisoned = true;
        }

        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_tracks_every_operation() {
        let mut writer = BufferWriter::new();
        assert_eq!(writer.size(), 0);
        writer.write_u8(1);
        assert_eq!(writer.size(), 1);
        writer.write_u32(2);
        assert_eq!(writer.size(), 5);
        writer.write_varint(0xfd);
        assert_eq!(writer.size(), 8);
        writer.write_var_bytes(&[0u8; 300]);
        assert_eq!(writer.size(), 8 + 3 + 300);
        writer.seek(7);
        assert_eq!(writer.size(), 318);
        let buf = writer.render(false);
        assert_eq!(buf.len(), 318);
    }

    #[test]
    fn test_byte_order_variants() {
        let mut writer = BufferWriter::new();
        writer.write_u16(0x0102).write_u16_be(0x0102);
        writer.write_i32(-2).write_i32_be(-2);
        let buf = writer.render(false);
        assert_eq!(&buf[0..2], &[0x02, 0x01]);
        assert_eq!(&buf[2..4], &[0x01, 0x02]);
        assert_eq!(&buf[4..8], &(-2i32).to_le_bytes());
        assert_eq!(&buf[8..12], &(-2i32).to_be_bytes());
    }

    #[test]
    fn test_checksum_marker() {
        let mut writer = BufferWriter::new();
        writer.write_bytes(b"payload");
        writer.write_checksum();
        let buf = writer.render(false);
        assert_eq!(buf.len(), 11);
        assert_eq!(&buf[7..], &crate::utils::hash::checksum(b"payload"));
    }

    #[test]
    fn test_null_string_and_fill() {
        let mut writer = BufferWriter::new();
        writer.write_null_string("abc").fill(0xaa, 3);
        let buf = writer.render(false);
        assert_eq!(buf, vec![b'a', b'b', b'c', 0, 0xaa, 0xaa, 0xaa]);
    }

    #[test]
    fn test_keep_allows_second_render() {
        let mut writer = BufferWriter::new();
        writer.write_u64_be(42);
        let first = writer.render(true);
        let second = writer.render(false);
        assert_eq!(first, second);
    }

    #[test]
    #[should_panic(expected = "rendered twice")]
    fn test_render_twice_panics() {
        let mut writer = BufferWriter::new();
        writer.write_u8(1);
        let _ = writer.render(false);
        let _ = writer.render(false);
    }

    #[test]
    #[should_panic(expected = "used after render")]
    fn test_write_after_render_panics() {
        let mut writer = BufferWriter::new();
        writer.write_u8(1);
        let _ = writer.render(false);
        writer.write_u8(2);
    }
}
