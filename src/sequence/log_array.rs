//! Fixed-width bit-packed integer array.
//!
//! Every value takes `width` bits, where `width` is the number of bits needed
//! for the largest value. Values may straddle a word boundary.
//!
//! Binary format:
//! ```text
//! [width: u8]
//! [len: u64 LE]
//! [words: u64 LE x ceil(len * width / 64)]
//! ```

use std::io::Write;

use crate::codec::ByteReader;
use crate::error::{HdtError, Result};

/// Bits needed to represent `value` (0 for 0).
pub fn bits_for(value: u64) -> u8 {
    (64 - value.leading_zeros()) as u8
}

#[inline]
fn mask(width: u8) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

fn words_for(len: usize, width: u8) -> Option<usize> {
    len.checked_mul(width as usize)
        .map(|bits| bits / 64 + usize::from(bits % 64 != 0))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogArray {
    width: u8,
    len: usize,
    words: Vec<u64>,
}

impl LogArray {
    /// Pack `values` using the minimal width for their maximum.
    pub fn from_values(values: &[u64]) -> Self {
        let width = values.iter().copied().max().map(bits_for).unwrap_or(0);
        Self::with_width(values, width)
    }

    /// Pack `values` using an explicit width. Values must fit.
    pub fn with_width(values: &[u64], width: u8) -> Self {
        let word_count = words_for(values.len(), width).unwrap_or(0);
        let mut words = vec![0u64; word_count];
        if width > 0 {
            for (i, &v) in values.iter().enumerate() {
                debug_assert!(bits_for(v) <= width, "value {} does not fit in {} bits", v, width);
                let bit = i * width as usize;
                let word = bit / 64;
                let offset = bit % 64;
                words[word] |= v << offset;
                if offset + width as usize > 64 {
                    words[word + 1] |= v >> (64 - offset);
                }
            }
        }
        Self {
            width,
            len: values.len(),
            words,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bits per entry.
    pub fn width(&self) -> u8 {
        self.width
    }

    /// Value at `index`. O(1).
    pub fn get(&self, index: usize) -> u64 {
        debug_assert!(index < self.len, "index out of bounds");
        if self.width == 0 {
            return 0;
        }
        let bit = index * self.width as usize;
        let word = bit / 64;
        let offset = bit % 64;
        let mut value = self.words[word] >> offset;
        if offset + self.width as usize > 64 {
            value |= self.words[word + 1] << (64 - offset);
        }
        value & mask(self.width)
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        (0..self.len).map(move |i| self.get(i))
    }

    pub fn size_bytes(&self) -> usize {
        self.words.len() * 8
    }

    /// Serialized size for `len` values of `width` bits, without building the array.
    pub fn estimate_serialized_size(len: usize, width: u8) -> usize {
        9 + words_for(len, width).unwrap_or(usize::MAX / 16) * 8
    }

    pub fn serialized_size(&self) -> usize {
        9 + self.words.len() * 8
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&[self.width])?;
        writer.write_all(&(self.len as u64).to_le_bytes())?;
        for &word in &self.words {
            writer.write_all(&word.to_le_bytes())?;
        }
        Ok(())
    }

    pub fn read_from(reader: &mut ByteReader<'_>) -> Result<Self> {
        let width = reader.read_u8("packed array width")?;
        if width > 64 {
            return Err(HdtError::corrupt(format!("packed array width {} exceeds 64", width)));
        }
        let len = reader.read_len("packed array length")?;
        let word_count = words_for(len, width)
            .ok_or_else(|| HdtError::corrupt("packed array length overflow"))?;
        let raw = reader.take(
            word_count
                .checked_mul(8)
                .ok_or_else(|| HdtError::corrupt("packed array length overflow"))?,
            "packed array words",
        )?;
        let words = raw
            .chunks_exact(8)
            .map(|c| u64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
            .collect();
        Ok(Self { width, len, words })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_for() {
        assert_eq!(bits_for(0), 0);
        assert_eq!(bits_for(1), 1);
        assert_eq!(bits_for(2), 2);
        assert_eq!(bits_for(255), 8);
        assert_eq!(bits_for(256), 9);
        assert_eq!(bits_for(u64::MAX), 64);
    }

    #[test]
    fn test_straddling_words() {
        // width 7 guarantees entries crossing 64-bit boundaries.
        let values: Vec<u64> = (0..100).map(|i| (i * 37) % 128).collect();
        let arr = LogArray::from_values(&values);
        assert_eq!(arr.width(), 7);
        for (i, &v) in values.iter().enumerate() {
            assert_eq!(arr.get(i), v, "index {}", i);
        }
    }

    #[test]
    fn test_all_zero_uses_no_words() {
        let arr = LogArray::from_values(&[0, 0, 0]);
        assert_eq!(arr.width(), 0);
        assert_eq!(arr.size_bytes(), 0);
        assert_eq!(arr.get(2), 0);
    }

    #[test]
    fn test_full_width() {
        let values = vec![u64::MAX, 0, u64::MAX - 1, 1];
        let arr = LogArray::from_values(&values);
        assert_eq!(arr.width(), 64);
        assert_eq!(arr.iter().collect::<Vec<_>>(), values);
    }

    #[test]
    fn test_roundtrip_and_size() {
        let values: Vec<u64> = (0..1000).map(|i| i * 3 + 1).collect();
        let arr = LogArray::from_values(&values);
        let mut buf = Vec::new();
        arr.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), arr.serialized_size());
        assert_eq!(
            buf.len(),
            LogArray::estimate_serialized_size(values.len(), arr.width())
        );

        let loaded = LogArray::read_from(&mut ByteReader::new(&buf)).unwrap();
        assert_eq!(loaded, arr);
    }

    #[test]
    fn test_huge_length_is_corrupt() {
        let mut buf = vec![64u8];
        buf.extend_from_slice(&u64::MAX.to_le_bytes());
        let err = LogArray::read_from(&mut ByteReader::new(&buf)).unwrap_err();
        assert_eq!(err.code(), "CORRUPT_CONTAINER");
    }

    #[test]
    fn test_bad_width_is_corrupt() {
        let mut buf = vec![65u8];
        buf.extend_from_slice(&0u64.to_le_bytes());
        let err = LogArray::read_from(&mut ByteReader::new(&buf)).unwrap_err();
        assert!(err.to_string().contains("exceeds 64"), "{}", err);
    }
}
