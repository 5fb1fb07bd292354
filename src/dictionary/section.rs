//! Front-coded sorted term list.
//!
//! Terms are grouped into blocks of `block_size` entries. The first entry of
//! a block (the anchor) is stored whole; each following entry stores only
//! how many leading bytes it shares with its predecessor plus the remaining
//! suffix. Lookup binary-searches anchors, then decodes one block.
//!
//! Binary format:
//! ```text
//! [count: u64 LE]
//! [block_size: u32 LE]
//! [offsets: IntSequence]          // byte offset of every block in `data`
//! [data_len: u64 LE]
//! [data: u8 x data_len]
//!
//! anchor: vbyte(len) bytes
//! entry:  vbyte(shared_prefix_len) vbyte(suffix_len) suffix
//! ```

use std::cmp::Ordering;
use std::io::Write;

use crate::codec::ByteReader;
use crate::error::{HdtError, Result};
use crate::sequence::{vbyte, IntSequence};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontCodedSection {
    count: usize,
    block_size: usize,
    offsets: IntSequence,
    data: Vec<u8>,
}

fn common_prefix(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

impl FrontCodedSection {
    /// Build from strictly increasing terms (byte order).
    pub fn from_sorted<S: AsRef<str>>(terms: &[S], block_size: usize) -> Result<Self> {
        if block_size == 0 || u32::try_from(block_size).is_err() {
            return Err(HdtError::InvalidConfig(format!(
                "block_size must be in 1..={}, got {}",
                u32::MAX,
                block_size
            )));
        }

        let mut data = Vec::new();
        let mut offsets = Vec::with_capacity(terms.len() / block_size + 1);
        let mut prev: &[u8] = &[];

        for (i, term) in terms.iter().enumerate() {
            let bytes = term.as_ref().as_bytes();
            if i > 0 && bytes <= prev {
                return Err(HdtError::GenerationInput(format!(
                    "section terms not strictly increasing at position {}",
                    i
                )));
            }
            if i % block_size == 0 {
                offsets.push(data.len() as u64);
                vbyte::encode(bytes.len() as u64, &mut data);
                data.extend_from_slice(bytes);
            } else {
                let shared = common_prefix(prev, bytes);
                vbyte::encode(shared as u64, &mut data);
                vbyte::encode((bytes.len() - shared) as u64, &mut data);
                data.extend_from_slice(&bytes[shared..]);
            }
            prev = bytes;
        }

        Ok(Self {
            count: terms.len(),
            block_size,
            offsets: IntSequence::encode(&offsets),
            data,
        })
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    fn num_blocks(&self) -> usize {
        self.offsets.len()
    }

    /// Anchor bytes of `block`.
    fn anchor(&self, block: usize) -> Result<&[u8]> {
        let start = self.offsets.get(block) as usize;
        let (len, pos) = vbyte::decode(&self.data, start)?;
        let end = pos
            .checked_add(len as usize)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| HdtError::corrupt("section anchor past end of data"))?;
        Ok(&self.data[pos..end])
    }

    /// Walk `block` from its anchor, calling `visit(index_in_block, term)`
    /// until it returns `false` or the block ends.
    fn walk_block<F>(&self, block: usize, mut visit: F) -> Result<()>
    where
        F: FnMut(usize, &[u8]) -> bool,
    {
        let first = block * self.block_size;
        let entries = self.block_size.min(self.count - first);
        let mut pos = self.offsets.get(block) as usize;
        let mut current: Vec<u8> = Vec::new();

        for i in 0..entries {
            if i == 0 {
                let (len, p) = vbyte::decode(&self.data, pos)?;
                pos = p;
                current.extend_from_slice(self.slice(pos, len)?);
                pos += len as usize;
            } else {
                let (shared, p) = vbyte::decode(&self.data, pos)?;
                let (suffix_len, p) = vbyte::decode(&self.data, p)?;
                if shared as usize > current.len() {
                    return Err(HdtError::corrupt(format!(
                        "section entry shares {} bytes with a {}-byte predecessor",
                        shared,
                        current.len()
                    )));
                }
                current.truncate(shared as usize);
                current.extend_from_slice(self.slice(p, suffix_len)?);
                pos = p + suffix_len as usize;
            }
            if !visit(i, &current) {
                break;
            }
        }
        Ok(())
    }

    fn slice(&self, pos: usize, len: u64) -> Result<&[u8]> {
        pos.checked_add(len as usize)
            .filter(|&end| end <= self.data.len())
            .map(|end| &self.data[pos..end])
            .ok_or_else(|| HdtError::corrupt("section entry past end of data"))
    }

    /// 1-based position of `term`, or `None` when absent.
    pub fn locate(&self, term: &str) -> Result<Option<u64>> {
        let target = term.as_bytes();
        if self.count == 0 {
            return Ok(None);
        }

        // Last block whose anchor is <= target.
        let (mut lo, mut hi) = (0usize, self.num_blocks());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match self.anchor(mid)?.cmp(target) {
                Ordering::Equal => return Ok(Some((mid * self.block_size) as u64 + 1)),
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
            }
        }
        if lo == 0 {
            return Ok(None);
        }
        let block = lo - 1;

        let mut found = None;
        self.walk_block(block, |i, entry| match entry.cmp(target) {
            Ordering::Less => true,
            Ordering::Equal => {
                found = Some((block * self.block_size + i) as u64 + 1);
                false
            }
            Ordering::Greater => false,
        })?;
        Ok(found)
    }

    /// Term at 1-based `position`, or `None` past the end.
    pub fn extract(&self, position: u64) -> Result<Option<String>> {
        if position == 0 || position > self.count as u64 {
            return Ok(None);
        }
        let index = (position - 1) as usize;
        let block = index / self.block_size;
        let target = index % self.block_size;

        let mut out = None;
        self.walk_block(block, |i, entry| {
            if i == target {
                out = Some(entry.to_vec());
                false
            } else {
                true
            }
        })?;

        match out {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| HdtError::corrupt("section term is not valid UTF-8")),
            None => Err(HdtError::corrupt("section block shorter than declared")),
        }
    }

    /// Decode every term in order.
    pub fn terms(&self) -> Result<Vec<String>> {
        let mut out = Vec::with_capacity(self.count);
        let mut bad_utf8 = false;
        for block in 0..self.num_blocks() {
            self.walk_block(block, |_, entry| match std::str::from_utf8(entry) {
                Ok(s) => {
                    out.push(s.to_string());
                    true
                }
                Err(_) => {
                    bad_utf8 = true;
                    false
                }
            })?;
            if bad_utf8 {
                return Err(HdtError::corrupt("section term is not valid UTF-8"));
            }
        }
        Ok(out)
    }

    pub fn size_bytes(&self) -> usize {
        self.data.len() + self.offsets.size_bytes()
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&(self.count as u64).to_le_bytes())?;
        writer.write_all(&(self.block_size as u32).to_le_bytes())?;
        self.offsets.write_to(writer)?;
        writer.write_all(&(self.data.len() as u64).to_le_bytes())?;
        writer.write_all(&self.data)?;
        Ok(())
    }

    /// Read a section and check it decodes into strictly increasing UTF-8 terms.
    pub fn read_from(reader: &mut ByteReader<'_>) -> Result<Self> {
        let count = reader.read_len("section count")?;
        let block_size = reader.read_u32("section block size")? as usize;
        if block_size == 0 {
            return Err(HdtError::corrupt("section block size is zero"));
        }
        let offsets = IntSequence::read_from(reader)?;
        let data = reader.read_block("section data")?.to_vec();

        // Every entry takes at least one byte of data.
        if count > data.len() {
            return Err(HdtError::corrupt(format!(
                "section declares {} terms in {} bytes",
                count,
                data.len()
            )));
        }
        let expected_blocks = count / block_size + usize::from(count % block_size != 0);
        if offsets.len() != expected_blocks {
            return Err(HdtError::corrupt(format!(
                "section has {} block offsets for {} terms of block size {}",
                offsets.len(),
                count,
                block_size
            )));
        }
        let mut prev = None;
        for offset in offsets.iter() {
            if offset as usize >= data.len() || prev.map_or(false, |p| offset <= p) {
                return Err(HdtError::corrupt("section block offsets out of order"));
            }
            prev = Some(offset);
        }

        let section = Self {
            count,
            block_size,
            offsets,
            data,
        };
        section.validate_order()?;
        Ok(section)
    }

    fn validate_order(&self) -> Result<()> {
        let mut prev: Vec<u8> = Vec::new();
        let mut seen = 0usize;
        let mut ok = true;
        for block in 0..self.num_blocks() {
            self.walk_block(block, |_, entry| {
                if (seen > 0 && entry <= prev.as_slice()) || std::str::from_utf8(entry).is_err() {
                    ok = false;
                    return false;
                }
                prev.clear();
                prev.extend_from_slice(entry);
                seen += 1;
                true
            })?;
            if !ok {
                return Err(HdtError::corrupt(format!(
                    "section term {} is out of order or not UTF-8",
                    seen + 1
                )));
            }
        }
        Ok(())
    }
}

impl Default for FrontCodedSection {
    fn default() -> Self {
        Self {
            count: 0,
            block_size: 16,
            offsets: IntSequence::default(),
            data: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_terms() -> Vec<String> {
        let mut terms: Vec<String> = (0..100)
            .map(|i| format!("http://example.org/resource/{:03}", i))
            .collect();
        terms.push("\"literal\"@en".to_string());
        terms.push("_:b0".to_string());
        terms.sort();
        terms
    }

    #[test]
    fn test_locate_and_extract_every_term() {
        let terms = sample_terms();
        for block_size in [1, 3, 16, 1000] {
            let section = FrontCodedSection::from_sorted(&terms, block_size).unwrap();
            assert_eq!(section.len(), terms.len());
            for (i, term) in terms.iter().enumerate() {
                let pos = i as u64 + 1;
                assert_eq!(section.locate(term).unwrap(), Some(pos), "block_size {}", block_size);
                assert_eq!(section.extract(pos).unwrap().as_deref(), Some(term.as_str()));
            }
        }
    }

    #[test]
    fn test_absent_terms() {
        let terms = sample_terms();
        let section = FrontCodedSection::from_sorted(&terms, 4).unwrap();
        assert_eq!(section.locate("").unwrap(), None);
        assert_eq!(section.locate("\"").unwrap(), None);
        assert_eq!(section.locate("http://example.org/resource/0005").unwrap(), None);
        assert_eq!(section.locate("zzz").unwrap(), None);
        assert_eq!(section.extract(0).unwrap(), None);
        assert_eq!(section.extract(terms.len() as u64 + 1).unwrap(), None);
    }

    #[test]
    fn test_empty_section() {
        let section = FrontCodedSection::from_sorted::<String>(&[], 16).unwrap();
        assert!(section.is_empty());
        assert_eq!(section.locate("x").unwrap(), None);
        assert!(section.terms().unwrap().is_empty());
    }

    #[test]
    fn test_front_coding_compresses() {
        let terms = sample_terms();
        let raw: usize = terms.iter().map(|t| t.len()).sum();
        let section = FrontCodedSection::from_sorted(&terms, 16).unwrap();
        assert!(section.data.len() < raw / 2, "{} vs {}", section.data.len(), raw);
    }

    #[test]
    fn test_rejects_unsorted_and_duplicates() {
        let err = FrontCodedSection::from_sorted(&["b", "a"], 16).unwrap_err();
        assert_eq!(err.code(), "GENERATION_INPUT");
        let err = FrontCodedSection::from_sorted(&["a", "a"], 16).unwrap_err();
        assert_eq!(err.code(), "GENERATION_INPUT");
    }

    #[test]
    fn test_roundtrip() {
        let terms = sample_terms();
        let section = FrontCodedSection::from_sorted(&terms, 8).unwrap();
        let mut buf = Vec::new();
        section.write_to(&mut buf).unwrap();
        let loaded = FrontCodedSection::read_from(&mut ByteReader::new(&buf)).unwrap();
        assert_eq!(loaded, section);
        assert_eq!(loaded.terms().unwrap(), terms);
    }

    #[test]
    fn test_count_larger_than_data_is_corrupt() {
        let section = FrontCodedSection::from_sorted(&["alpha", "beta"], 16).unwrap();
        let mut buf = Vec::new();
        section.write_to(&mut buf).unwrap();
        buf[0..8].copy_from_slice(&u64::MAX.to_le_bytes());
        let err = FrontCodedSection::read_from(&mut ByteReader::new(&buf)).unwrap_err();
        assert_eq!(err.code(), "CORRUPT_CONTAINER");
        assert!(err.to_string().contains("declares"), "{}", err);
    }

    #[test]
    fn test_corrupt_data_detected() {
        let section = FrontCodedSection::from_sorted(&["alpha", "beta", "gamma"], 16).unwrap();
        let mut buf = Vec::new();
        section.write_to(&mut buf).unwrap();
        // Flip the anchor's first byte so "alpha" sorts after "beta".
        let anchor_byte = buf.len() - section.data.len() + 1;
        buf[anchor_byte] = b'z';
        let err = FrontCodedSection::read_from(&mut ByteReader::new(&buf)).unwrap_err();
        assert_eq!(err.code(), "CORRUPT_CONTAINER");
    }
}
