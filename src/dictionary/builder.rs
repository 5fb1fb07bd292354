//! Term collection and identifier assignment.
//!
//! Terms are interned once into a flat table (concatenated UTF-8 plus
//! `(offset, length)` entries) with a role bitmask per term. `build` splits
//! them into the four sections and returns the per-term identifiers
//! alongside the dictionary, so triples can be mapped without any lookup.

use std::collections::HashMap;

use rayon::prelude::*;
use tracing::debug;

use super::{FourSectionDictionary, FrontCodedSection, Role};
use crate::error::Result;

const AS_SUBJECT: u8 = 0b001;
const AS_PREDICATE: u8 = 0b010;
const AS_OBJECT: u8 = 0b100;

fn role_bit(role: Role) -> u8 {
    match role {
        Role::Subject => AS_SUBJECT,
        Role::Predicate => AS_PREDICATE,
        Role::Object => AS_OBJECT,
    }
}

/// Interning table that records which roles every term plays.
#[derive(Debug, Default)]
pub struct DictionaryBuilder {
    /// Concatenated UTF-8 term bytes.
    data: Vec<u8>,
    /// (offset, length) into `data`, one per interned term.
    entries: Vec<(usize, usize)>,
    /// Role bitmask per interned term.
    roles: Vec<u8>,
    index: HashMap<String, u32>,
}

/// Identifiers assigned to every interned term, indexed by the value
/// returned from [`DictionaryBuilder::intern`]. 0 means "not in that role".
#[derive(Debug, Clone, Default)]
pub struct IdMapping {
    subject: Vec<u64>,
    predicate: Vec<u64>,
    object: Vec<u64>,
}

impl IdMapping {
    #[inline]
    pub fn subject(&self, term: u32) -> u64 {
        self.subject[term as usize]
    }

    #[inline]
    pub fn predicate(&self, term: u32) -> u64 {
        self.predicate[term as usize]
    }

    #[inline]
    pub fn object(&self, term: u32) -> u64 {
        self.object[term as usize]
    }
}

#[derive(Debug)]
pub struct BuiltDictionary {
    pub dictionary: FourSectionDictionary,
    pub mapping: IdMapping,
}

impl DictionaryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `term` in `role`, returning its 0-based table index.
    pub fn intern(&mut self, term: &str, role: Role) -> u32 {
        if let Some(&idx) = self.index.get(term) {
            self.roles[idx as usize] |= role_bit(role);
            return idx;
        }

        debug_assert!(self.entries.len() < u32::MAX as usize, "term table exceeds u32 range");

        let idx = self.entries.len() as u32;
        self.entries.push((self.data.len(), term.len()));
        self.data.extend_from_slice(term.as_bytes());
        self.roles.push(role_bit(role));
        self.index.insert(term.to_string(), idx);
        idx
    }

    /// Number of distinct terms seen so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn term_bytes(&self, idx: u32) -> &[u8] {
        let (offset, length) = self.entries[idx as usize];
        &self.data[offset..offset + length]
    }

    fn term(&self, idx: u32) -> &str {
        // Interned from &str, so always valid UTF-8.
        std::str::from_utf8(self.term_bytes(idx)).unwrap_or_default()
    }

    /// Term indices whose role mask satisfies `keep`, sorted by term bytes.
    fn sorted_where<F>(&self, keep: F) -> Vec<u32>
    where
        F: Fn(u8) -> bool,
    {
        let mut ids: Vec<u32> = (0..self.entries.len() as u32)
            .filter(|&i| keep(self.roles[i as usize]))
            .collect();
        ids.par_sort_unstable_by(|&a, &b| self.term_bytes(a).cmp(self.term_bytes(b)));
        ids
    }

    /// Partition the interned terms into four sections and assign identifiers.
    pub fn build(self, block_size: usize) -> Result<BuiltDictionary> {
        let shared = self.sorted_where(|r| r & AS_SUBJECT != 0 && r & AS_OBJECT != 0);
        let subjects = self.sorted_where(|r| r & AS_SUBJECT != 0 && r & AS_OBJECT == 0);
        let predicates = self.sorted_where(|r| r & AS_PREDICATE != 0);
        let objects = self.sorted_where(|r| r & AS_OBJECT != 0 && r & AS_SUBJECT == 0);

        debug!(
            shared = shared.len(),
            subjects = subjects.len(),
            predicates = predicates.len(),
            objects = objects.len(),
            "Partitioned dictionary terms"
        );

        let n = self.entries.len();
        let mut mapping = IdMapping {
            subject: vec![0; n],
            predicate: vec![0; n],
            object: vec![0; n],
        };
        for (pos, &idx) in shared.iter().enumerate() {
            mapping.subject[idx as usize] = pos as u64 + 1;
            mapping.object[idx as usize] = pos as u64 + 1;
        }
        let nb_shared = shared.len() as u64;
        for (pos, &idx) in subjects.iter().enumerate() {
            mapping.subject[idx as usize] = nb_shared + pos as u64 + 1;
        }
        for (pos, &idx) in objects.iter().enumerate() {
            mapping.object[idx as usize] = nb_shared + pos as u64 + 1;
        }
        for (pos, &idx) in predicates.iter().enumerate() {
            mapping.predicate[idx as usize] = pos as u64 + 1;
        }

        let section = |ids: &[u32]| {
            let terms: Vec<&str> = ids.iter().map(|&i| self.term(i)).collect();
            FrontCodedSection::from_sorted(&terms, block_size)
        };
        let dictionary = FourSectionDictionary::new(
            section(&shared)?,
            section(&subjects)?,
            section(&predicates)?,
            section(&objects)?,
        );

        Ok(BuiltDictionary { dictionary, mapping })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_dedups_and_merges_roles() {
        let mut b = DictionaryBuilder::new();
        let a = b.intern("ex:a", Role::Subject);
        let again = b.intern("ex:a", Role::Object);
        assert_eq!(a, again);
        assert_eq!(b.len(), 1);
        assert_eq!(b.roles[a as usize], AS_SUBJECT | AS_OBJECT);
    }

    #[test]
    fn test_mapping_matches_dictionary() {
        let mut b = DictionaryBuilder::new();
        let s = b.intern("ex:s", Role::Subject);
        let p = b.intern("ex:p", Role::Predicate);
        let o = b.intern("ex:o", Role::Object);
        let shared = b.intern("ex:o", Role::Subject);
        assert_eq!(o, shared);
        // A term can be a predicate and a subject at once.
        let ps = b.intern("ex:p", Role::Subject);
        assert_eq!(p, ps);

        let built = b.build(16).unwrap();
        let dict = &built.dictionary;
        assert_eq!(dict.nb_shared(), 1);

        for (idx, term) in [(s, "ex:s"), (o, "ex:o"), (p, "ex:p")] {
            assert_eq!(
                dict.string_to_id(term, Role::Subject).unwrap(),
                Some(built.mapping.subject(idx))
            );
        }
        assert_eq!(
            dict.string_to_id("ex:p", Role::Predicate).unwrap(),
            Some(built.mapping.predicate(p))
        );
        assert_eq!(built.mapping.object(s), 0);
    }

    #[test]
    fn test_empty_builder() {
        let built = DictionaryBuilder::new().build(16).unwrap();
        assert_eq!(built.dictionary.nb_subjects(), 0);
        assert_eq!(built.dictionary.nb_predicates(), 0);
    }
}
