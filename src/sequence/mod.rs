//! Compressed integer sequences.
//!
//! [`IntSequence`] stores either a fixed-width [`LogArray`] or an
//! [`EliasFano`] encoding, whichever serializes smaller. Elias-Fano only
//! applies to non-decreasing input.
//!
//! Binary format:
//! ```text
//! [tag: u8]          // 1 = packed, 2 = Elias-Fano
//! [encoding bytes]
//! ```

mod elias_fano;
mod log_array;
pub mod vbyte;

use std::io::Write;
use std::ops::Range;

pub use elias_fano::EliasFano;
pub use log_array::{bits_for, LogArray};

use crate::codec::ByteReader;
use crate::error::{HdtError, Result};

const TAG_PACKED: u8 = 1;
const TAG_ELIAS_FANO: u8 = 2;

/// Which encoding an [`IntSequence`] ended up with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceEncoding {
    Packed,
    EliasFano,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntSequence {
    Packed(LogArray),
    EliasFano(EliasFano),
}

impl IntSequence {
    /// Encode `values`, choosing the smaller representation.
    pub fn encode(values: &[u64]) -> Self {
        let width = values.iter().copied().max().map(bits_for).unwrap_or(0);
        let packed_size = LogArray::estimate_serialized_size(values.len(), width);

        let monotone = values.windows(2).all(|w| w[0] <= w[1]);
        if monotone && !values.is_empty() {
            let max = values[values.len() - 1];
            if EliasFano::estimate_serialized_size(values.len(), max) < packed_size {
                if let Some(ef) = EliasFano::new(values) {
                    return IntSequence::EliasFano(ef);
                }
            }
        }
        IntSequence::Packed(LogArray::with_width(values, width))
    }

    pub fn encoding(&self) -> SequenceEncoding {
        match self {
            IntSequence::Packed(_) => SequenceEncoding::Packed,
            IntSequence::EliasFano(_) => SequenceEncoding::EliasFano,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            IntSequence::Packed(a) => a.len(),
            IntSequence::EliasFano(ef) => ef.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at `index`. Callers stay within `len()`.
    #[inline]
    pub fn get(&self, index: usize) -> u64 {
        match self {
            IntSequence::Packed(a) => a.get(index),
            IntSequence::EliasFano(ef) => ef.get(index),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.range(0..self.len())
    }

    /// Decode the contiguous range `range`, clamped to `len()`.
    pub fn range(&self, range: Range<usize>) -> impl Iterator<Item = u64> + '_ {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        (start..end).map(move |i| self.get(i))
    }

    /// Binary search for `value` inside the sorted sub-range `range`.
    ///
    /// Indices in the result are absolute. `Err` carries the insertion point.
    pub fn binary_search_range(&self, range: Range<usize>, value: u64) -> std::result::Result<usize, usize> {
        let pos = self.lower_bound(range.clone(), value);
        if pos < range.end.min(self.len()) && self.get(pos) == value {
            Ok(pos)
        } else {
            Err(pos)
        }
    }

    /// First absolute index in `range` whose value is `>= value`.
    pub fn lower_bound(&self, range: Range<usize>, value: u64) -> usize {
        if let IntSequence::EliasFano(ef) = self {
            if range.start == 0 && range.end >= ef.len() {
                return ef.lower_bound(value);
            }
        }
        let mut hi = range.end.min(self.len());
        let mut lo = range.start.min(hi);
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

    /// In-memory size of the encoded data.
    pub fn size_bytes(&self) -> usize {
        match self {
            IntSequence::Packed(a) => a.size_bytes(),
            IntSequence::EliasFano(ef) => ef.size_bytes(),
        }
    }

    pub fn serialized_size(&self) -> usize {
        1 + match self {
            IntSequence::Packed(a) => a.serialized_size(),
            IntSequence::EliasFano(ef) => ef.serialized_size(),
        }
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            IntSequence::Packed(a) => {
                writer.write_all(&[TAG_PACKED])?;
                a.write_to(writer)
            }
            IntSequence::EliasFano(ef) => {
                writer.write_all(&[TAG_ELIAS_FANO])?;
                ef.write_to(writer)
            }
        }
    }

    pub fn read_from(reader: &mut ByteReader<'_>) -> Result<Self> {
        match reader.read_u8("sequence tag")? {
            TAG_PACKED => Ok(IntSequence::Packed(LogArray::read_from(reader)?)),
            TAG_ELIAS_FANO => Ok(IntSequence::EliasFano(EliasFano::read_from(reader)?)),
            other => Err(HdtError::corrupt(format!("unknown sequence tag {}", other))),
        }
    }
}

impl Default for IntSequence {
    fn default() -> Self {
        IntSequence::Packed(LogArray::from_values(&[]))
    }
}
