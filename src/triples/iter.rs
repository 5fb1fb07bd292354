//! Lazy pattern cursors over [`BitmapTriples`].
//!
//! Every pattern class reduces to the same two-stage walk: a source of
//! Level-P positions (one pair, one subject's run, a predicate's postings,
//! or everything), and for each of them the object run, either whole or
//! narrowed to a single binary-searched position.

use std::ops::Range;

use super::bitmap_triples::BitmapTriples;
use super::{IdPattern, PatternClass, TripleId};

/// Where the next Level-P position comes from.
#[derive(Debug, Clone)]
enum PairSource {
    /// Contiguous Level-P positions.
    Positions(Range<usize>),
    /// Slots of the predicate index posting list.
    Postings(Range<usize>),
}

#[derive(Debug, Clone)]
enum State {
    /// Emitting objects of the current pair.
    Pair {
        subject: u64,
        predicate: u64,
        objects: Range<usize>,
    },
    /// Between pairs; fetch the next Level-P position.
    Advance,
    Exhausted,
}

/// Forward-only iterator over matching identifier triples, in (s, p, o) order.
#[derive(Debug, Clone)]
pub struct TripleIdIter<'a> {
    triples: &'a BitmapTriples,
    pattern: IdPattern,
    initial: Option<PairSource>,
    source: Option<PairSource>,
    state: State,
}

impl<'a> TripleIdIter<'a> {
    pub(crate) fn new(triples: &'a BitmapTriples, pattern: IdPattern) -> Self {
        let initial = Self::pair_source(triples, &pattern);
        let state = if initial.is_some() {
            State::Advance
        } else {
            State::Exhausted
        };
        Self {
            triples,
            pattern,
            source: initial.clone(),
            initial,
            state,
        }
    }

    /// Level-P positions a pattern can touch, or `None` when it cannot match.
    fn pair_source(triples: &BitmapTriples, pattern: &IdPattern) -> Option<PairSource> {
        match pattern.class() {
            PatternClass::Spo | PatternClass::Sp => {
                let ppos = triples.pair_position(pattern.subject?, pattern.predicate?)?;
                Some(PairSource::Positions(ppos..ppos + 1))
            }
            PatternClass::S | PatternClass::So => {
                let spos = triples.subject_position(pattern.subject?)?;
                Some(PairSource::Positions(triples.predicate_run(spos)))
            }
            PatternClass::P | PatternClass::Po => {
                let postings = triples.predicate_index().postings(pattern.predicate?);
                Some(PairSource::Postings(postings))
            }
            PatternClass::O | PatternClass::All => Some(PairSource::Positions(0..triples.num_pairs())),
        }
    }

    pub fn pattern(&self) -> IdPattern {
        self.pattern
    }

    /// Restart from the first match.
    pub fn reset(&mut self) {
        self.source = self.initial.clone();
        self.state = if self.source.is_some() {
            State::Advance
        } else {
            State::Exhausted
        };
    }

    fn next_pair_position(&mut self) -> Option<usize> {
        match self.source.as_mut()? {
            PairSource::Positions(range) => range.next(),
            PairSource::Postings(slots) => {
                let slot = slots.next()?;
                Some(self.triples.predicate_index().position(slot))
            }
        }
    }
}

impl<'a> Iterator for TripleIdIter<'a> {
    type Item = TripleId;

    fn next(&mut self) -> Option<TripleId> {
        loop {
            match &mut self.state {
                State::Exhausted => return None,
                State::Pair {
                    subject,
                    predicate,
                    objects,
                } => {
                    if let Some(opos) = objects.next() {
                        return Some(TripleId::new(*subject, *predicate, self.triples.object_at(opos)));
                    }
                    self.state = State::Advance;
                }
                State::Advance => {
                    let Some(ppos) = self.next_pair_position() else {
                        self.state = State::Exhausted;
                        return None;
                    };
                    let objects = match self.pattern.object {
                        Some(o) => match self.triples.object_position(ppos, o) {
                            Some(opos) => opos..opos + 1,
                            None => continue,
                        },
                        None => self.triples.object_run(ppos),
                    };
                    self.state = State::Pair {
                        subject: self.triples.subject_at(ppos),
                        predicate: self.triples.predicate_at(ppos),
                        objects,
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> BitmapTriples {
        let triples: Vec<TripleId> = [(1, 1, 1), (1, 1, 2), (2, 1, 2), (2, 2, 1), (3, 2, 2)]
            .into_iter()
            .map(TripleId::from)
            .collect();
        BitmapTriples::from_sorted(&triples).unwrap()
    }

    #[test]
    fn test_predicate_bound_walks_postings_in_subject_order() {
        let bt = index();
        let got: Vec<_> = bt.search(IdPattern::from_ids(0, 2, 0)).collect();
        assert_eq!(got, vec![TripleId::new(2, 2, 1), TripleId::new(3, 2, 2)]);
    }

    #[test]
    fn test_object_bound_scan() {
        let bt = index();
        let got: Vec<_> = bt.search(IdPattern::from_ids(0, 0, 2)).collect();
        assert_eq!(
            got,
            vec![TripleId::new(1, 1, 2), TripleId::new(2, 1, 2), TripleId::new(3, 2, 2)]
        );
    }

    #[test]
    fn test_reset_restarts() {
        let bt = index();
        let mut it = bt.search(IdPattern::from_ids(2, 0, 0));
        assert_eq!(it.next(), Some(TripleId::new(2, 1, 2)));
        assert_eq!(it.next(), Some(TripleId::new(2, 2, 1)));
        assert_eq!(it.next(), None);
        assert_eq!(it.next(), None);
        it.reset();
        assert_eq!(it.count(), 2);
    }

    #[test]
    fn test_unknown_ids_are_empty() {
        let bt = index();
        assert_eq!(bt.search(IdPattern::from_ids(9, 0, 0)).count(), 0);
        assert_eq!(bt.search(IdPattern::from_ids(0, 9, 0)).count(), 0);
        assert_eq!(bt.search(IdPattern::from_ids(0, 0, 9)).count(), 0);
        let mut it = bt.search(IdPattern::from_ids(1, 2, 0));
        assert_eq!(it.next(), None);
        it.reset();
        assert_eq!(it.next(), None);
    }
}
