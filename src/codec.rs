//! Little-endian decoding helpers shared by every on-disk structure.
//!
//! Writers use `std::io::Write::write_all` directly; readers go through
//! [`ByteReader`], which turns truncation into `CorruptContainer` instead of
//! panicking on a short slice.

use crate::error::{HdtError, Result};

/// Forward-only cursor over a byte slice.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Take the next `len` bytes. `what` names the field for the error message.
    pub fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| {
                HdtError::corrupt(format!(
                    "{} truncated: need {} bytes at offset {}, have {}",
                    what,
                    len,
                    self.pos,
                    self.remaining()
                ))
            })?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub fn read_u8(&mut self, what: &str) -> Result<u8> {
        Ok(self.take(1, what)?[0])
    }

    pub fn read_u16(&mut self, what: &str) -> Result<u16> {
        let b = self.take(2, what)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self, what: &str) -> Result<u32> {
        let b = self.take(4, what)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_u64(&mut self, what: &str) -> Result<u64> {
        let b = self.take(8, what)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(u64::from_le_bytes(buf))
    }

    /// Read a `u64` that is used as an in-memory length or count.
    pub fn read_len(&mut self, what: &str) -> Result<usize> {
        let v = self.read_u64(what)?;
        usize::try_from(v).map_err(|_| HdtError::corrupt(format!("{} too large: {}", what, v)))
    }

    /// Read a `[len: u64][bytes]` block and return the bytes.
    pub fn read_block(&mut self, what: &str) -> Result<&'a [u8]> {
        let len = self.read_len(what)?;
        self.take(len, what)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_in_order() {
        let mut buf = Vec::new();
        buf.push(7u8);
        buf.extend_from_slice(&300u16.to_le_bytes());
        buf.extend_from_slice(&70_000u32.to_le_bytes());
        buf.extend_from_slice(&u64::MAX.to_le_bytes());

        let mut r = ByteReader::new(&buf);
        assert_eq!(r.read_u8("a").unwrap(), 7);
        assert_eq!(r.read_u16("b").unwrap(), 300);
        assert_eq!(r.read_u32("c").unwrap(), 70_000);
        assert_eq!(r.read_u64("d").unwrap(), u64::MAX);
        assert_eq!(r.remaining(), 0);
        assert_eq!(r.position(), buf.len());
    }

    #[test]
    fn test_truncation_is_corrupt_container() {
        let buf = [1u8, 2, 3];
        let mut r = ByteReader::new(&buf);
        let err = r.read_u64("counter").unwrap_err();
        assert_eq!(err.code(), "CORRUPT_CONTAINER");
        assert!(err.to_string().contains("counter truncated"), "{}", err);
    }

    #[test]
    fn test_read_block() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&3u64.to_le_bytes());
        buf.extend_from_slice(b"abcde");
        let mut r = ByteReader::new(&buf);
        assert_eq!(r.read_block("blk").unwrap(), b"abc");
        assert_eq!(r.remaining(), 2);
    }
}
