//! Result iterators returned by [`TripleStore`](super::TripleStore) searches.

use serde::{Deserialize, Serialize};

use crate::dictionary::{FourSectionDictionary, Role};
use crate::error::Result;
use crate::triples::{IdPattern, TripleId, TripleIdIter};

/// Paging applied to a search. The reported cardinality ignores it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Maximum number of results; `None` for all.
    pub limit: Option<usize>,
    /// Results to skip before the first one returned.
    pub offset: usize,
}

impl SearchOptions {
    pub fn new(limit: Option<usize>, offset: usize) -> Self {
        Self { limit, offset }
    }

    pub fn with_limit(limit: usize) -> Self {
        Self::new(Some(limit), 0)
    }
}

/// A triple in string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

impl Triple {
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }
}

pub(crate) fn decode_triple(dict: &FourSectionDictionary, t: TripleId) -> Result<Triple> {
    Ok(Triple {
        subject: dict.id_to_string(t.subject, Role::Subject)?,
        predicate: dict.id_to_string(t.predicate, Role::Predicate)?,
        object: dict.id_to_string(t.object, Role::Object)?,
    })
}

// ── Identifier results ─────────────────────────────────────────────

/// Identifier triples matching a pattern, with paging applied.
#[derive(Debug, Clone)]
pub struct TripleIdResults<'a> {
    inner: Option<TripleIdIter<'a>>,
    pattern: IdPattern,
    cardinality: usize,
    options: SearchOptions,
    nb_reads: usize,
    skipped: bool,
    peeked: Option<Option<TripleId>>,
}

impl<'a> TripleIdResults<'a> {
    pub(crate) fn new(
        inner: Option<TripleIdIter<'a>>,
        pattern: IdPattern,
        cardinality: usize,
        options: SearchOptions,
    ) -> Self {
        Self {
            inner,
            pattern,
            cardinality,
            options,
            nb_reads: 0,
            skipped: false,
            peeked: None,
        }
    }

    /// Pull the next match from the cursor, skipping the offset first.
    fn pull(&mut self) -> Option<TripleId> {
        if self.options.limit.map_or(false, |limit| self.nb_reads >= limit) {
            return None;
        }
        let inner = self.inner.as_mut()?;
        if !self.skipped {
            self.skipped = true;
            if self.options.offset > 0 {
                return inner.nth(self.options.offset);
            }
        }
        inner.next()
    }

    /// Next result without consuming it.
    pub fn peek(&mut self) -> Option<&TripleId> {
        if self.peeked.is_none() {
            let next = self.pull();
            self.peeked = Some(next);
        }
        self.peeked.as_ref().and_then(|p| p.as_ref())
    }

    pub fn has_next(&mut self) -> bool {
        self.peek().is_some()
    }

    /// Matches of the full pattern, before limit and offset.
    pub fn cardinality(&self) -> usize {
        self.cardinality
    }

    /// Results returned so far.
    pub fn nb_reads(&self) -> usize {
        self.nb_reads
    }

    pub fn limit(&self) -> Option<usize> {
        self.options.limit
    }

    pub fn offset(&self) -> usize {
        self.options.offset
    }

    pub fn pattern(&self) -> IdPattern {
        self.pattern
    }

    /// Bound subject, or 0 for a wildcard.
    pub fn subject(&self) -> u64 {
        self.pattern.subject.unwrap_or(0)
    }

    pub fn predicate(&self) -> u64 {
        self.pattern.predicate.unwrap_or(0)
    }

    pub fn object(&self) -> u64 {
        self.pattern.object.unwrap_or(0)
    }

    /// Results still to come, from the cardinality and paging.
    fn remaining_upper_bound(&self) -> usize {
        let available = self
            .cardinality
            .saturating_sub(self.options.offset)
            .saturating_sub(self.nb_reads);
        match self.options.limit {
            Some(limit) => available.min(limit.saturating_sub(self.nb_reads)),
            None => available,
        }
    }
}

impl<'a> Iterator for TripleIdResults<'a> {
    type Item = TripleId;

    fn next(&mut self) -> Option<TripleId> {
        let next = match self.peeked.take() {
            Some(peeked) => peeked,
            None => self.pull(),
        };
        if next.is_some() {
            self.nb_reads += 1;
        }
        next
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining_upper_bound();
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for TripleIdResults<'_> {}

// ── String results ─────────────────────────────────────────────────

/// String triples matching a pattern. Each identifier is decoded directly
/// from its section; nothing is searched again.
#[derive(Debug, Clone)]
pub struct TripleIter<'a> {
    ids: TripleIdResults<'a>,
    dictionary: &'a FourSectionDictionary,
    subject: String,
    predicate: String,
    object: String,
}

impl<'a> TripleIter<'a> {
    pub(crate) fn new(
        ids: TripleIdResults<'a>,
        dictionary: &'a FourSectionDictionary,
        subject: &str,
        predicate: &str,
        object: &str,
    ) -> Self {
        Self {
            ids,
            dictionary,
            subject: subject.to_string(),
            predicate: predicate.to_string(),
            object: object.to_string(),
        }
    }

    /// Next result without consuming it.
    pub fn peek(&mut self) -> Option<Result<Triple>> {
        let id = *self.ids.peek()?;
        Some(decode_triple(self.dictionary, id))
    }

    pub fn has_next(&mut self) -> bool {
        self.ids.has_next()
    }

    pub fn cardinality(&self) -> usize {
        self.ids.cardinality()
    }

    pub fn nb_reads(&self) -> usize {
        self.ids.nb_reads()
    }

    pub fn limit(&self) -> Option<usize> {
        self.ids.limit()
    }

    pub fn offset(&self) -> usize {
        self.ids.offset()
    }

    /// Subject as given to the search; empty for a wildcard.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn predicate(&self) -> &str {
        &self.predicate
    }

    pub fn object(&self) -> &str {
        &self.object
    }

    /// The identifier iterator underneath.
    pub fn ids(&self) -> &TripleIdResults<'a> {
        &self.ids
    }
}

impl<'a> Iterator for TripleIter<'a> {
    type Item = Result<Triple>;

    fn next(&mut self) -> Option<Result<Triple>> {
        let id = self.ids.next()?;
        Some(decode_triple(self.dictionary, id))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.ids.size_hint()
    }
}

impl ExactSizeIterator for TripleIter<'_> {}
