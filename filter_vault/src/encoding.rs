//! Wire formats shared by the chunked dump/load protocol and snapshot
//! persistence.
//!
//! Everything on the wire is little-endian; floats are IEEE-754 8-byte.
//! Chunk cursors are opaque `u64`s packing a section index (bloom layer or
//! cuckoo sub-filter) with a byte offset inside that section, biased by one
//! so that cursor `1` names the very start of the data stream and `0` stays
//! free for "send the header".

use crate::common::{FilterError, Result};

/// Maximum payload bytes returned by a single chunk read.
pub const MAX_CHUNK_BYTES: usize = 10 * 1024 * 1024;

/// Current snapshot encoding version. Version 0 payloads (no stored
/// `bits`/`n2`) are still loadable; anything newer than this fails.
pub const ENCODING_VERSION: u32 = 1;

/// First data cursor of a chunk stream; also the cursor at which a bloom
/// header is loaded into an empty key.
pub const CHUNK_ITER_INIT: u64 = 1;

const OFFSET_BITS: u32 = 40;
const OFFSET_MASK: u64 = (1 << OFFSET_BITS) - 1;

/// Pack a section index and byte offset into a data cursor.
pub(crate) fn pack_cursor(section: u64, offset: u64) -> u64 {
    debug_assert!(offset <= OFFSET_MASK);
    ((section << OFFSET_BITS) | offset) + 1
}

/// Inverse of [`pack_cursor`]. The caller must have rejected cursor `0`.
pub(crate) fn unpack_cursor(cursor: u64) -> (u64, u64) {
    debug_assert!(cursor >= CHUNK_ITER_INIT);
    let raw = cursor - 1;
    (raw >> OFFSET_BITS, raw & OFFSET_MASK)
}

/// Sequential little-endian reader over a decoded blob. Truncated reads are
/// reported as [`FilterError::InvalidHeader`].
pub(crate) struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or(FilterError::InvalidHeader)?;
        if end > self.buf.len() {
            return Err(FilterError::InvalidHeader);
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub(crate) fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes(bytes.try_into().map_err(|_| FilterError::InvalidHeader)?))
    }

    pub(crate) fn u64(&mut self) -> Result<u64> {
        let bytes = self.take(8)?;
        Ok(u64::from_le_bytes(bytes.try_into().map_err(|_| FilterError::InvalidHeader)?))
    }

    pub(crate) fn f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.u64()?))
    }

    pub(crate) fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.take(len)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pos == self.buf.len()
    }
}

/// Record-oriented writer mirroring the host's snapshot I/O primitives:
/// unsigned integers, doubles, and length-prefixed byte buffers.
#[derive(Debug, Default)]
pub struct RdbWriter {
    buf: Vec<u8>,
}

impl RdbWriter {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a 64-bit unsigned record.
    pub fn save_unsigned(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Appends an 8-byte IEEE-754 record.
    pub fn save_double(&mut self, value: f64) {
        self.buf.extend_from_slice(&value.to_bits().to_le_bytes());
    }

    /// Appends a length-prefixed byte buffer record.
    pub fn save_bytes(&mut self, bytes: &[u8]) {
        self.save_unsigned(bytes.len() as u64);
        self.buf.extend_from_slice(bytes);
    }

    /// Consumes the writer, returning the serialized snapshot payload.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Reader counterpart of [`RdbWriter`].
pub struct RdbReader<'a> {
    inner: ByteReader<'a>,
}

impl<'a> RdbReader<'a> {
    /// Wraps a snapshot payload for sequential decoding.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { inner: ByteReader::new(buf) }
    }

    /// Reads a 64-bit unsigned record.
    pub fn load_unsigned(&mut self) -> Result<u64> {
        self.inner.u64()
    }

    /// Reads an 8-byte IEEE-754 record.
    pub fn load_double(&mut self) -> Result<f64> {
        self.inner.f64()
    }

    /// Reads a length-prefixed byte buffer record.
    pub fn load_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.inner.u64()?;
        let len = usize::try_from(len).map_err(|_| FilterError::InvalidHeader)?;
        Ok(self.inner.bytes(len)?.to_vec())
    }

    /// True once every record has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.inner.is_empty()
    }
}
