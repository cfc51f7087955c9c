//! Low-level framing shared by every codec.
//!
//! All integers are big-endian and fixed width. Variable-size sections are
//! framed by a `u32` byte length, variable-cardinality sections by a `u32`
//! record count.

use hashfile_types::{Hash, HASH_LEN};

use crate::error::{ReferenceError, Result};

/// Append-only byte sink.
#[derive(Default)]
pub(crate) struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub(crate) fn u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub(crate) fn u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub(crate) fn hash(&mut self, hash: &Hash) {
        self.buf.extend_from_slice(hash.as_bytes());
    }

    pub(crate) fn bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Write a record count, failing if it does not fit in a `u32`.
    pub(crate) fn count(&mut self, section: &'static str, count: usize) -> Result<()> {
        let count = u32::try_from(count)
            .map_err(|_| ReferenceError::format(section, format!("{count} records exceed u32")))?;
        self.u32(count);
        Ok(())
    }

    /// Write a length-prefixed section.
    pub(crate) fn framed(&mut self, section: &'static str, bytes: &[u8]) -> Result<()> {
        let len = u32::try_from(bytes.len()).map_err(|_| {
            ReferenceError::format(section, format!("{} bytes exceed u32 frame", bytes.len()))
        })?;
        self.u32(len);
        self.bytes(bytes);
        Ok(())
    }

    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over encoded bytes; every read is bounds-checked.
pub(crate) struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    section: &'static str,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(section: &'static str, data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            section,
        }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub(crate) fn error(&self, reason: impl Into<String>) -> ReferenceError {
        ReferenceError::format(self.section, reason)
    }

    pub(crate) fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(self.error(format!(
                "truncated at offset {}: need {len} bytes, have {}",
                self.pos,
                self.remaining()
            )));
        }
        let data = self.data;
        let slice = &data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub(crate) fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn u32(&mut self) -> Result<u32> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take(4)?);
        Ok(u32::from_be_bytes(raw))
    }

    pub(crate) fn u64(&mut self) -> Result<u64> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(8)?);
        Ok(u64::from_be_bytes(raw))
    }

    pub(crate) fn hash(&mut self) -> Result<Hash> {
        let mut raw = [0u8; HASH_LEN];
        raw.copy_from_slice(self.take(HASH_LEN)?);
        Ok(Hash::from_digest(raw))
    }

    /// Read a record count and check that `count` records of at least
    /// `min_record_len` bytes can fit in what remains.
    pub(crate) fn count(&mut self, min_record_len: usize) -> Result<usize> {
        let count = self.u32()? as usize;
        let needed = count.saturating_mul(min_record_len);
        if needed > self.remaining() {
            return Err(self.error(format!(
                "declared {count} records need at least {needed} bytes, have {}",
                self.remaining()
            )));
        }
        Ok(count)
    }

    /// Read a length-prefixed section.
    pub(crate) fn framed(&mut self) -> Result<&'a [u8]> {
        let len = self.u32()? as usize;
        self.take(len)
    }

    /// Read up to the next `separator` byte, consuming the separator.
    pub(crate) fn until(&mut self, separator: u8) -> Result<&'a [u8]> {
        let data = self.data;
        let rest = &data[self.pos..];
        let end = rest
            .iter()
            .position(|byte| *byte == separator)
            .ok_or_else(|| self.error(format!("missing separator 0x{separator:02x}")))?;
        let field = &rest[..end];
        self.pos += end + 1;
        Ok(field)
    }

    /// Fail if any bytes were left unread.
    pub(crate) fn finish(self) -> Result<()> {
        if self.remaining() != 0 {
            return Err(self.error(format!("{} trailing bytes", self.remaining())));
        }
        Ok(())
    }
}
