//! Posting lists from predicate identifier to Level-P positions.
//!
//! Positions for predicate `p` live in `positions[offsets[p-1]..offsets[p]]`,
//! ascending, so walking them visits subjects in order.
//!
//! Binary format:
//! ```text
//! [num_predicates: u64 LE]
//! [offsets: IntSequence]     // num_predicates + 1 entries, non-decreasing
//! [positions: IntSequence]
//! ```

use std::io::Write;
use std::ops::Range;

use crate::codec::ByteReader;
use crate::error::{HdtError, Result};
use crate::sequence::IntSequence;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredicateIndex {
    num_predicates: usize,
    offsets: IntSequence,
    positions: IntSequence,
}

impl PredicateIndex {
    /// Build from the Level-P predicate array with a counting sort.
    pub fn build(array_p: &IntSequence) -> Self {
        let num_predicates = array_p.iter().max().unwrap_or(0) as usize;

        let mut counts = vec![0u64; num_predicates + 1];
        for p in array_p.iter() {
            counts[p as usize] += 1;
        }
        // counts[0] is always 0 since predicate ids start at 1.
        let mut offsets = Vec::with_capacity(num_predicates + 1);
        let mut acc = 0u64;
        offsets.push(0);
        for &c in &counts[1..] {
            acc += c;
            offsets.push(acc);
        }

        let mut cursor: Vec<u64> = offsets[..num_predicates].to_vec();
        let mut positions = vec![0u64; array_p.len()];
        for (pos, p) in array_p.iter().enumerate() {
            let slot = &mut cursor[p as usize - 1];
            positions[*slot as usize] = pos as u64;
            *slot += 1;
        }

        Self {
            num_predicates,
            offsets: IntSequence::encode(&offsets),
            positions: IntSequence::encode(&positions),
        }
    }

    pub fn num_predicates(&self) -> usize {
        self.num_predicates
    }

    /// Range into [`positions`](Self::positions) for `predicate`.
    /// Empty for identifiers the index does not know.
    pub fn postings(&self, predicate: u64) -> Range<usize> {
        if predicate == 0 || predicate as usize > self.num_predicates {
            return 0..0;
        }
        let p = predicate as usize;
        self.offsets.get(p - 1) as usize..self.offsets.get(p) as usize
    }

    /// Level-P position stored at posting slot `slot`.
    #[inline]
    pub fn position(&self, slot: usize) -> usize {
        self.positions.get(slot) as usize
    }

    /// Number of subject runs using `predicate`.
    pub fn frequency(&self, predicate: u64) -> usize {
        self.postings(predicate).len()
    }

    pub fn size_bytes(&self) -> usize {
        self.offsets.size_bytes() + self.positions.size_bytes()
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&(self.num_predicates as u64).to_le_bytes())?;
        self.offsets.write_to(writer)?;
        self.positions.write_to(writer)?;
        Ok(())
    }

    pub fn read_from(reader: &mut ByteReader<'_>) -> Result<Self> {
        let num_predicates = reader.read_len("predicate index size")?;
        let offsets = IntSequence::read_from(reader)?;
        let positions = IntSequence::read_from(reader)?;
        Ok(Self {
            num_predicates,
            offsets,
            positions,
        })
    }

    /// Check the index against the Level-P array it was built from.
    ///
    /// Predicate identifiers are dense, so an index never names more
    /// predicates than Level P has entries.
    pub fn validate(&self, array_p: &IntSequence) -> Result<()> {
        if self.num_predicates > array_p.len() {
            return Err(HdtError::corrupt(format!(
                "predicate index names {} predicates for {} level P entries",
                self.num_predicates,
                array_p.len()
            )));
        }
        if self.offsets.len() != self.num_predicates + 1 || self.positions.len() != array_p.len() {
            return Err(HdtError::corrupt("predicate index size disagrees with level P"));
        }
        if self.offsets.get(0) != 0 || self.offsets.get(self.num_predicates) as usize != array_p.len() {
            return Err(HdtError::corrupt("predicate index offsets do not span level P"));
        }
        for p in 1..=self.num_predicates as u64 {
            let (start, end) = (self.offsets.get(p as usize - 1), self.offsets.get(p as usize));
            if start > end {
                return Err(HdtError::corrupt("predicate index offsets decrease"));
            }
            let mut prev = None;
            for slot in start as usize..end as usize {
                let pos = self.position(slot);
                if pos >= array_p.len() || array_p.get(pos) != p || prev.map_or(false, |q| pos <= q) {
                    return Err(HdtError::corrupt(format!(
                        "predicate index posting {} for predicate {} is invalid",
                        pos, p
                    )));
                }
                prev = Some(pos);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postings() {
        let array_p = IntSequence::encode(&[1, 3, 2, 3, 1, 3]);
        let index = PredicateIndex::build(&array_p);
        assert_eq!(index.num_predicates(), 3);

        let collect = |p| index.postings(p).map(|s| index.position(s)).collect::<Vec<_>>();
        assert_eq!(collect(1), vec![0, 4]);
        assert_eq!(collect(2), vec![2]);
        assert_eq!(collect(3), vec![1, 3, 5]);
        assert!(collect(0).is_empty());
        assert!(collect(4).is_empty());
        assert_eq!(index.frequency(3), 3);
        index.validate(&array_p).unwrap();
    }

    #[test]
    fn test_roundtrip_and_validate() {
        let array_p = IntSequence::encode(&[2, 1, 2]);
        let index = PredicateIndex::build(&array_p);
        let mut buf = Vec::new();
        index.write_to(&mut buf).unwrap();
        let loaded = PredicateIndex::read_from(&mut ByteReader::new(&buf)).unwrap();
        assert_eq!(loaded, index);
        loaded.validate(&array_p).unwrap();

        let other = IntSequence::encode(&[1, 1, 2]);
        assert!(loaded.validate(&other).is_err());
    }

    #[test]
    fn test_oversized_predicate_count_is_corrupt() {
        // A zero-width offsets array costs a few bytes whatever its length.
        let array_p = IntSequence::encode(&[1]);
        let num_predicates = 1usize << 60;
        let mut buf = Vec::new();
        buf.extend_from_slice(&(num_predicates as u64).to_le_bytes());
        buf.push(1);
        buf.push(0);
        buf.extend_from_slice(&(num_predicates as u64 + 1).to_le_bytes());
        IntSequence::encode(&[0]).write_to(&mut buf).unwrap();

        let index = PredicateIndex::read_from(&mut ByteReader::new(&buf)).unwrap();
        let err = index.validate(&array_p).unwrap_err();
        assert_eq!(err.code(), "CORRUPT_CONTAINER");
        assert!(err.to_string().contains("level P entries"), "{}", err);
    }

    #[test]
    fn test_empty() {
        let index = PredicateIndex::build(&IntSequence::encode(&[]));
        assert_eq!(index.num_predicates(), 0);
        assert_eq!(index.postings(1), 0..0);
        index.validate(&IntSequence::encode(&[])).unwrap();
    }
}
