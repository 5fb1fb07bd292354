//! Identifier triples and the bitmap-triples index.

mod bitmap_triples;
mod iter;
mod predicate_index;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use bitmap_triples::BitmapTriples;
pub use iter::TripleIdIter;
pub use predicate_index::PredicateIndex;

/// A triple in identifier form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TripleId {
    pub subject: u64,
    pub predicate: u64,
    pub object: u64,
}

impl TripleId {
    pub fn new(subject: u64, predicate: u64, object: u64) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }
}

impl From<(u64, u64, u64)> for TripleId {
    fn from((subject, predicate, object): (u64, u64, u64)) -> Self {
        Self::new(subject, predicate, object)
    }
}

/// Identifier pattern; `None` is a wildcard.
///
/// `Some(0)` is a bound position that matches nothing, since identifiers
/// start at 1. Searches use it for terms missing from the dictionary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct IdPattern {
    pub subject: Option<u64>,
    pub predicate: Option<u64>,
    pub object: Option<u64>,
}

fn bound(id: u64) -> Option<u64> {
    (id != 0).then_some(id)
}

impl IdPattern {
    pub fn new(subject: Option<u64>, predicate: Option<u64>, object: Option<u64>) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }

    /// Pattern from raw identifiers, where 0 means wildcard.
    pub fn from_ids(subject: u64, predicate: u64, object: u64) -> Self {
        Self::new(bound(subject), bound(predicate), bound(object))
    }

    /// Matches every triple.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn class(&self) -> PatternClass {
        match (self.subject.is_some(), self.predicate.is_some(), self.object.is_some()) {
            (true, true, true) => PatternClass::Spo,
            (true, true, false) => PatternClass::Sp,
            (true, false, false) => PatternClass::S,
            (true, false, true) => PatternClass::So,
            (false, true, false) => PatternClass::P,
            (false, true, true) => PatternClass::Po,
            (false, false, true) => PatternClass::O,
            (false, false, false) => PatternClass::All,
        }
    }

    pub fn matches(&self, t: &TripleId) -> bool {
        self.subject.map_or(true, |s| s == t.subject)
            && self.predicate.map_or(true, |p| p == t.predicate)
            && self.object.map_or(true, |o| o == t.object)
    }
}

impl From<TripleId> for IdPattern {
    fn from(t: TripleId) -> Self {
        Self::new(Some(t.subject), Some(t.predicate), Some(t.object))
    }
}

/// Which positions of a pattern are bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternClass {
    Spo,
    Sp,
    S,
    So,
    P,
    Po,
    O,
    All,
}

impl fmt::Display for PatternClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PatternClass::Spo => "SPO",
            PatternClass::Sp => "SP?",
            PatternClass::S => "S??",
            PatternClass::So => "S?O",
            PatternClass::P => "?P?",
            PatternClass::Po => "?PO",
            PatternClass::O => "??O",
            PatternClass::All => "???",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_is_wildcard() {
        let p = IdPattern::from_ids(0, 3, 0);
        assert_eq!(p, IdPattern::new(None, Some(3), None));
        assert_eq!(p.class(), PatternClass::P);
        assert_eq!(p.class().to_string(), "?P?");
        assert_eq!(IdPattern::from_ids(0, 0, 0).class(), PatternClass::All);
    }

    #[test]
    fn test_matches() {
        let t = TripleId::new(1, 2, 3);
        assert!(IdPattern::any().matches(&t));
        assert!(IdPattern::from_ids(1, 0, 3).matches(&t));
        assert!(!IdPattern::from_ids(1, 0, 4).matches(&t));
        assert!(IdPattern::from(t).matches(&t));
    }

    #[test]
    fn test_triple_order_is_spo() {
        let mut v = vec![TripleId::new(2, 1, 1), TripleId::new(1, 2, 1), TripleId::new(1, 1, 2)];
        v.sort();
        assert_eq!(v[0], TripleId::new(1, 1, 2));
        assert_eq!(v[2], TripleId::new(2, 1, 1));
    }
}
