//! Bitmap-triples: a three-level, subject-ordered triple index.
//!
//! ```text
//! level S:  s1            s2
//! array P:  p1  p2        p1
//! bitmap P: 0   1         1        // 1 closes a subject's predicate run
//! array O:  o1  o2 o3     o1
//! bitmap O: 1   0  1      1        // 1 closes an (s, p) object run
//! ```
//!
//! Level-P position `i` belongs to subject `level_s[rank1_P(i)]`; Level-O
//! position `j` belongs to predicate entry `rank1_O(j)`. Runs are located
//! with `select1` on the boundary bitmaps.
//!
//! Binary format:
//! ```text
//! [num_triples: u64 LE]
//! [level_s: IntSequence]
//! [array_p: IntSequence]
//! [bitmap_p: Bitmap]
//! [array_o: IntSequence]
//! [bitmap_o: Bitmap]
//! [predicate_index: PredicateIndex]
//! ```

use std::io::Write;
use std::ops::Range;

use super::iter::TripleIdIter;
use super::predicate_index::PredicateIndex;
use super::{IdPattern, PatternClass, TripleId};
use crate::codec::ByteReader;
use crate::error::{HdtError, Result};
use crate::sequence::IntSequence;
use crate::succinct::{Bitmap, BitmapBuilder};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitmapTriples {
    num_triples: usize,
    level_s: IntSequence,
    array_p: IntSequence,
    bitmap_p: Bitmap,
    array_o: IntSequence,
    bitmap_o: Bitmap,
    predicate_index: PredicateIndex,
}

impl Default for BitmapTriples {
    fn default() -> Self {
        let array_p = IntSequence::default();
        let predicate_index = PredicateIndex::build(&array_p);
        Self {
            num_triples: 0,
            level_s: IntSequence::default(),
            array_p,
            bitmap_p: Bitmap::default(),
            array_o: IntSequence::default(),
            bitmap_o: Bitmap::default(),
            predicate_index,
        }
    }
}

impl BitmapTriples {
    /// Build from triples sorted by (s, p, o) without duplicates.
    pub fn from_sorted(triples: &[TripleId]) -> Result<Self> {
        if let Some(pos) = triples.windows(2).position(|w| w[0] >= w[1]) {
            return Err(HdtError::GenerationInput(format!(
                "triples not sorted and unique at position {}",
                pos + 1
            )));
        }
        if let Some(t) = triples
            .iter()
            .find(|t| t.subject == 0 || t.predicate == 0 || t.object == 0)
        {
            return Err(HdtError::GenerationInput(format!(
                "triple ({}, {}, {}) uses identifier 0",
                t.subject, t.predicate, t.object
            )));
        }

        let mut level_s = Vec::new();
        let mut array_p = Vec::new();
        let mut array_o = Vec::with_capacity(triples.len());
        let mut bitmap_p = BitmapBuilder::new();
        let mut bitmap_o = BitmapBuilder::with_capacity(triples.len());

        for (i, t) in triples.iter().enumerate() {
            let next = triples.get(i + 1);
            let new_subject = i == 0 || triples[i - 1].subject != t.subject;
            let new_pair = new_subject || triples[i - 1].predicate != t.predicate;

            if new_subject {
                level_s.push(t.subject);
            }
            if new_pair {
                array_p.push(t.predicate);
                let closes_subject = next.map_or(true, |n| n.subject != t.subject);
                bitmap_p.push(closes_subject);
            }
            array_o.push(t.object);
            let closes_pair =
                next.map_or(true, |n| n.subject != t.subject || n.predicate != t.predicate);
            bitmap_o.push(closes_pair);
        }

        if let Some(&max_p) = array_p.iter().max() {
            if max_p as usize > array_p.len() {
                return Err(HdtError::GenerationInput(format!(
                    "predicate identifier {} is not dense over {} subject-predicate pairs",
                    max_p,
                    array_p.len()
                )));
            }
        }

        let array_p = IntSequence::encode(&array_p);
        let predicate_index = PredicateIndex::build(&array_p);
        Ok(Self {
            num_triples: triples.len(),
            level_s: IntSequence::encode(&level_s),
            array_p,
            bitmap_p: bitmap_p.finish(),
            array_o: IntSequence::encode(&array_o),
            bitmap_o: bitmap_o.finish(),
            predicate_index,
        })
    }

    pub fn num_triples(&self) -> usize {
        self.num_triples
    }

    pub fn is_empty(&self) -> bool {
        self.num_triples == 0
    }

    /// Distinct subjects present in the index.
    pub fn num_subjects(&self) -> usize {
        self.level_s.len()
    }

    /// Number of (subject, predicate) runs.
    pub fn num_pairs(&self) -> usize {
        self.array_p.len()
    }

    // ── Navigation ──────────────────────────────────────────────────

    /// Level-S position of `subject`.
    pub(crate) fn subject_position(&self, subject: u64) -> Option<usize> {
        self.level_s
            .binary_search_range(0..self.level_s.len(), subject)
            .ok()
    }

    /// Level-P positions of the subject at Level-S position `spos`.
    pub(crate) fn predicate_run(&self, spos: usize) -> Range<usize> {
        run_bounds(&self.bitmap_p, spos, self.array_p.len())
    }

    /// Level-O positions of the pair at Level-P position `ppos`.
    pub(crate) fn object_run(&self, ppos: usize) -> Range<usize> {
        run_bounds(&self.bitmap_o, ppos, self.array_o.len())
    }

    pub(crate) fn subject_at(&self, ppos: usize) -> u64 {
        self.level_s.get(self.bitmap_p.rank1(ppos))
    }

    #[inline]
    pub(crate) fn predicate_at(&self, ppos: usize) -> u64 {
        self.array_p.get(ppos)
    }

    #[inline]
    pub(crate) fn object_at(&self, opos: usize) -> u64 {
        self.array_o.get(opos)
    }

    /// Level-P position of `(subject, predicate)`.
    pub(crate) fn pair_position(&self, subject: u64, predicate: u64) -> Option<usize> {
        let spos = self.subject_position(subject)?;
        self.array_p
            .binary_search_range(self.predicate_run(spos), predicate)
            .ok()
    }

    /// Level-O position of `object` inside the run of `ppos`.
    pub(crate) fn object_position(&self, ppos: usize, object: u64) -> Option<usize> {
        self.array_o
            .binary_search_range(self.object_run(ppos), object)
            .ok()
    }

    pub(crate) fn predicate_index(&self) -> &PredicateIndex {
        &self.predicate_index
    }

    // ── Queries ─────────────────────────────────────────────────────

    pub fn contains(&self, triple: &TripleId) -> bool {
        self.pair_position(triple.subject, triple.predicate)
            .and_then(|ppos| self.object_position(ppos, triple.object))
            .is_some()
    }

    /// Lazy iterator over triples matching `pattern`, in (s, p, o) order.
    pub fn search(&self, pattern: IdPattern) -> TripleIdIter<'_> {
        TripleIdIter::new(self, pattern)
    }

    /// Exact number of triples matching `pattern`.
    ///
    /// S?O and ?PO walk the matching subject or predicate runs, and ??O walks
    /// every subject-predicate pair. Use [`estimate`](Self::estimate) where an
    /// upper bound is enough.
    pub fn count(&self, pattern: IdPattern) -> usize {
        match pattern.class() {
            PatternClass::All => self.num_triples,
            PatternClass::Spo => match (pattern.subject, pattern.predicate, pattern.object) {
                (Some(s), Some(p), Some(o)) => usize::from(self.contains(&TripleId::new(s, p, o))),
                _ => 0,
            },
            PatternClass::Sp => match (pattern.subject, pattern.predicate) {
                (Some(s), Some(p)) => self
                    .pair_position(s, p)
                    .map_or(0, |ppos| self.object_run(ppos).len()),
                _ => 0,
            },
            PatternClass::S => match pattern.subject.and_then(|s| self.subject_position(s)) {
                Some(spos) => {
                    let run = self.predicate_run(spos);
                    if run.is_empty() {
                        0
                    } else {
                        self.object_run(run.end - 1).end - self.object_run(run.start).start
                    }
                }
                None => 0,
            },
            PatternClass::P => {
                let index = &self.predicate_index;
                pattern.predicate.map_or(0, |p| {
                    index
                        .postings(p)
                        .map(|slot| self.object_run(index.position(slot)).len())
                        .sum()
                })
            }
            PatternClass::So | PatternClass::Po | PatternClass::O => self.search(pattern).count(),
        }
    }

    /// Upper bound on [`count`](Self::count) that never scans Level O.
    ///
    /// S?O and ?PO drop the object and answer for the wider pattern, ??O
    /// answers with the total. Every other class is exact.
    pub fn estimate(&self, pattern: IdPattern) -> usize {
        match pattern.class() {
            PatternClass::So => self.count(IdPattern::new(pattern.subject, None, None)),
            PatternClass::Po => self.count(IdPattern::new(None, pattern.predicate, None)),
            PatternClass::O => self.num_triples,
            _ => self.count(pattern),
        }
    }

    /// Largest identifier used per role, for bounds checks against a dictionary.
    pub fn max_ids(&self) -> (u64, u64, u64) {
        let max_s = if self.level_s.is_empty() {
            0
        } else {
            self.level_s.get(self.level_s.len() - 1)
        };
        (
            max_s,
            self.predicate_index.num_predicates() as u64,
            self.array_o.iter().max().unwrap_or(0),
        )
    }

    pub fn size_bytes(&self) -> usize {
        self.level_s.size_bytes()
            + self.array_p.size_bytes()
            + self.bitmap_p.size_bytes()
            + self.array_o.size_bytes()
            + self.bitmap_o.size_bytes()
            + self.predicate_index.size_bytes()
    }

    // ── Serialization ───────────────────────────────────────────────

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&(self.num_triples as u64).to_le_bytes())?;
        self.level_s.write_to(writer)?;
        self.array_p.write_to(writer)?;
        self.bitmap_p.write_to(writer)?;
        self.array_o.write_to(writer)?;
        self.bitmap_o.write_to(writer)?;
        self.predicate_index.write_to(writer)?;
        Ok(())
    }

    pub fn read_from(reader: &mut ByteReader<'_>) -> Result<Self> {
        let num_triples = reader.read_len("triple count")?;
        let triples = Self {
            num_triples,
            level_s: IntSequence::read_from(reader)?,
            array_p: IntSequence::read_from(reader)?,
            bitmap_p: Bitmap::read_from(reader)?,
            array_o: IntSequence::read_from(reader)?,
            bitmap_o: Bitmap::read_from(reader)?,
            predicate_index: PredicateIndex::read_from(reader)?,
        };
        triples.validate()?;
        Ok(triples)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);
        let triples = Self::read_from(&mut reader)?;
        if reader.remaining() != 0 {
            return Err(HdtError::corrupt(format!(
                "{} trailing bytes after triple index",
                reader.remaining()
            )));
        }
        Ok(triples)
    }

    /// Structural checks run on every load.
    fn validate(&self) -> Result<()> {
        if self.array_o.len() != self.num_triples {
            return Err(HdtError::corrupt(format!(
                "object level holds {} entries for {} triples",
                self.array_o.len(),
                self.num_triples
            )));
        }
        if self.bitmap_p.len() != self.array_p.len() || self.bitmap_o.len() != self.array_o.len() {
            return Err(HdtError::corrupt("boundary bitmap length differs from its array"));
        }
        if self.bitmap_p.count_ones() != self.level_s.len() {
            return Err(HdtError::corrupt(format!(
                "predicate bitmap closes {} runs for {} subjects",
                self.bitmap_p.count_ones(),
                self.level_s.len()
            )));
        }
        if self.bitmap_o.count_ones() != self.array_p.len() {
            return Err(HdtError::corrupt(format!(
                "object bitmap closes {} runs for {} predicate entries",
                self.bitmap_o.count_ones(),
                self.array_p.len()
            )));
        }
        for bitmap in [&self.bitmap_p, &self.bitmap_o] {
            if !bitmap.is_empty() && bitmap.get(bitmap.len() - 1) != Some(true) {
                return Err(HdtError::corrupt("boundary bitmap does not close its last run"));
            }
        }

        let mut prev = 0u64;
        for s in self.level_s.iter() {
            if s <= prev {
                return Err(HdtError::corrupt("subject level not strictly increasing"));
            }
            prev = s;
        }
        check_runs(&self.array_p, &self.bitmap_p, "predicate")?;
        check_runs(&self.array_o, &self.bitmap_o, "object")?;

        self.predicate_index.validate(&self.array_p)
    }
}

/// Positions `[start, end)` of run `k` in a boundary bitmap where every run
/// ends with a set bit.
fn run_bounds(bitmap: &Bitmap, k: usize, len: usize) -> Range<usize> {
    let start = match k {
        0 => 0,
        _ => bitmap.select1(k - 1).map_or(len, |p| p + 1),
    };
    let end = bitmap.select1(k).map_or(len, |p| p + 1);
    start..end.max(start)
}

/// Every run must hold non-zero, strictly increasing identifiers.
fn check_runs(values: &IntSequence, bounds: &Bitmap, what: &str) -> Result<()> {
    let mut prev = 0u64;
    for (i, v) in values.iter().enumerate() {
        if v == 0 || v <= prev {
            return Err(HdtError::corrupt(format!(
                "{} run not strictly increasing at position {}",
                what, i
            )));
        }
        prev = if bounds.get(i) == Some(true) { 0 } else { v };
    }
    Ok(())
}
