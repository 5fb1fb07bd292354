//! Elias-Fano encoding for non-decreasing sequences.
//!
//! Each value is split into `lower_bits` low bits, packed in a [`LogArray`],
//! and a high part stored in unary inside a [`Bitmap`]: value `i` sets bit
//! `(v >> lower_bits) + i`. Access is one `select1` plus one packed read.
//!
//! For n values below universe u this takes about `n * (2 + log2(u / n))`
//! bits, which is what makes monotone offset tables and subject lists cheap.
//!
//! Binary format:
//! ```text
//! [len: u64 LE]
//! [lower_bits: u8]
//! [lower: LogArray]
//! [upper: Bitmap]
//! ```

use std::io::Write;

use super::log_array::LogArray;
use crate::codec::ByteReader;
use crate::error::{HdtError, Result};
use crate::succinct::{Bitmap, BitmapBuilder};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EliasFano {
    len: usize,
    lower_bits: u8,
    lower: LogArray,
    upper: Bitmap,
}

/// Split point that minimizes space for `len` values with maximum `max`.
fn lower_bits_for(len: usize, max: u64) -> u8 {
    if len == 0 {
        return 0;
    }
    let ratio = max.saturating_add(1) / len as u64;
    if ratio <= 1 {
        0
    } else {
        (63 - ratio.leading_zeros()) as u8
    }
}

impl EliasFano {
    /// Encode a non-decreasing sequence.
    ///
    /// Returns `None` when the input decreases anywhere.
    pub fn new(values: &[u64]) -> Option<Self> {
        if values.windows(2).any(|w| w[1] < w[0]) {
            return None;
        }
        let len = values.len();
        let max = values.last().copied().unwrap_or(0);
        let lower_bits = lower_bits_for(len, max);

        let low_mask = if lower_bits == 0 { 0 } else { (1u64 << lower_bits) - 1 };
        let lows: Vec<u64> = values.iter().map(|&v| v & low_mask).collect();
        let lower = LogArray::with_width(&lows, lower_bits);

        let upper_len = if len == 0 { 0 } else { (max >> lower_bits) as usize + len };
        let mut upper = BitmapBuilder::with_capacity(upper_len);
        let mut next = 0usize;
        for (i, &v) in values.iter().enumerate() {
            let pos = (v >> lower_bits) as usize + i;
            while next < pos {
                upper.push(false);
                next += 1;
            }
            upper.push(true);
            next += 1;
        }

        Some(Self {
            len,
            lower_bits,
            lower,
            upper: upper.finish(),
        })
    }

    /// Serialized size the encoding would have, computed without building it.
    pub fn estimate_serialized_size(len: usize, max: u64) -> usize {
        let lower_bits = lower_bits_for(len, max);
        let upper_len = if len == 0 { 0 } else { (max >> lower_bits) as usize + len };
        8 + 1 + LogArray::estimate_serialized_size(len, lower_bits) + 16 + (upper_len + 63) / 64 * 8
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Value at `index`.
    pub fn get(&self, index: usize) -> u64 {
        debug_assert!(index < self.len, "index out of bounds");
        let high = match self.upper.select1(index) {
            Some(pos) => (pos - index) as u64,
            None => 0,
        };
        (high << self.lower_bits) | self.lower.get(index)
    }

    /// Index of the first value `>= value`, or `len` when there is none.
    pub fn lower_bound(&self, value: u64) -> usize {
        let (mut lo, mut hi) = (0, self.len);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.get(mid) < value {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    pub fn size_bytes(&self) -> usize {
        self.lower.size_bytes() + self.upper.size_bytes()
    }

    pub fn serialized_size(&self) -> usize {
        9 + self.lower.serialized_size() + self.upper.serialized_size()
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&(self.len as u64).to_le_bytes())?;
        writer.write_all(&[self.lower_bits])?;
        self.lower.write_to(writer)?;
        self.upper.write_to(writer)?;
        Ok(())
    }

    pub fn read_from(reader: &mut ByteReader<'_>) -> Result<Self> {
        let len = reader.read_len("elias-fano length")?;
        let lower_bits = reader.read_u8("elias-fano lower bits")?;
        let lower = LogArray::read_from(reader)?;
        let upper = Bitmap::read_from(reader)?;

        if lower.len() != len || lower.width() != lower_bits {
            return Err(HdtError::corrupt(
                "elias-fano lower bits disagree with header",
            ));
        }
        if upper.count_ones() != len {
            return Err(HdtError::corrupt(format!(
                "elias-fano upper bitmap has {} ones for {} values",
                upper.count_ones(),
                len
            )));
        }
        Ok(Self {
            len,
            lower_bits,
            lower,
            upper,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_decreasing() {
        assert!(EliasFano::new(&[1, 5, 3]).is_none());
    }

    #[test]
    fn test_empty() {
        let ef = EliasFano::new(&[]).unwrap();
        assert!(ef.is_empty());
        let mut buf = Vec::new();
        ef.write_to(&mut buf).unwrap();
        let loaded = EliasFano::read_from(&mut ByteReader::new(&buf)).unwrap();
        assert_eq!(loaded, ef);
    }

    #[test]
    fn test_get_sparse_and_dense() {
        let sparse = vec![100, 5_000, 50_000, 1_000_000, 9_999_999];
        let ef = EliasFano::new(&sparse).unwrap();
        for (i, &v) in sparse.iter().enumerate() {
            assert_eq!(ef.get(i), v);
        }

        let dense: Vec<u64> = (1..=2000).collect();
        let ef = EliasFano::new(&dense).unwrap();
        for (i, &v) in dense.iter().enumerate() {
            assert_eq!(ef.get(i), v);
        }
    }

    #[test]
    fn test_repeated_values() {
        let values = vec![0, 0, 3, 3, 3, 10, 10];
        let ef = EliasFano::new(&values).unwrap();
        let decoded: Vec<u64> = (0..values.len()).map(|i| ef.get(i)).collect();
        assert_eq!(decoded, values);
    }

    #[test]
    fn test_lower_bound() {
        let ef = EliasFano::new(&[2, 4, 4, 9, 30]).unwrap();
        assert_eq!(ef.lower_bound(0), 0);
        assert_eq!(ef.lower_bound(4), 1);
        assert_eq!(ef.lower_bound(5), 3);
        assert_eq!(ef.lower_bound(30), 4);
        assert_eq!(ef.lower_bound(31), 5);
    }

    #[test]
    fn test_estimate_matches_actual() {
        for values in [
            vec![],
            vec![7],
            (0..500u64).map(|i| i * 11).collect::<Vec<_>>(),
            vec![1, 1_000_000_000],
        ] {
            let ef = EliasFano::new(&values).unwrap();
            let mut buf = Vec::new();
            ef.write_to(&mut buf).unwrap();
            let max = values.last().copied().unwrap_or(0);
            assert_eq!(buf.len(), ef.serialized_size());
            assert_eq!(buf.len(), EliasFano::estimate_serialized_size(values.len(), max));
        }
    }

    #[test]
    fn test_length_mismatch_is_corrupt() {
        let ef = EliasFano::new(&[1, 2, 3]).unwrap();
        let mut buf = Vec::new();
        ef.write_to(&mut buf).unwrap();
        buf[0..8].copy_from_slice(&4u64.to_le_bytes());
        let err = EliasFano::read_from(&mut ByteReader::new(&buf)).unwrap_err();
        assert_eq!(err.code(), "CORRUPT_CONTAINER");
    }
}
