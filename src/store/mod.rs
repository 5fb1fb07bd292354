//! Query engine over a loaded container.
//!
//! A [`TripleStore`] is immutable once built or opened: every search
//! borrows it and owns only its own cursor, so a store can be shared across
//! threads and searched concurrently.

mod join;
mod results;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use tracing::info;

pub use join::{JoinIter, Solution};
pub use results::{SearchOptions, Triple, TripleIdResults, TripleIter};

use crate::config::GeneratorConfig;
use crate::container::Container;
use crate::dictionary::{FourSectionDictionary, Role};
use crate::error::Result;
use crate::generator::{Generator, RawTriple};
use crate::triples::{BitmapTriples, IdPattern, TripleId};

/// Snapshot of store metadata and memory use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub total_triples: u64,
    pub subjects: u64,
    pub predicates: u64,
    pub objects: u64,
    pub shared: u64,
    pub dictionary_bytes: usize,
    pub index_bytes: usize,
    pub base_uri: String,
    pub created_at: u64,
    pub file_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct TripleStore {
    container: Container,
    file_path: Option<PathBuf>,
}

impl From<Container> for TripleStore {
    fn from(container: Container) -> Self {
        Self {
            container,
            file_path: None,
        }
    }
}

impl TripleStore {
    // ── Construction ───────────────────────────────────────────────

    /// Open a container file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let start = Instant::now();
        let container = Container::open(path)?;
        info!(
            path = %path.display(),
            triples = container.header.nb_triples,
            subjects = container.header.nb_subjects,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Opened container"
        );
        Ok(Self {
            container,
            file_path: Some(path.to_path_buf()),
        })
    }

    /// Parse an in-memory container image.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Container::from_bytes(bytes).map(Self::from)
    }

    /// Build a store from raw triples with the default configuration.
    pub fn generate<I, T>(triples: I, base_uri: &str) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<RawTriple>,
    {
        Generator::default().generate(triples, base_uri).map(Self::from)
    }

    pub fn generate_with<I, T>(triples: I, base_uri: &str, config: GeneratorConfig) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<RawTriple>,
    {
        Generator::new(config)?
            .generate(triples, base_uri)
            .map(Self::from)
    }

    /// Write the container to `path`, replacing any existing file atomically.
    pub fn save_to_container(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let start = Instant::now();
        self.container.save(path)?;
        info!(
            path = %path.display(),
            triples = self.container.header.nb_triples,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Saved container"
        );
        self.file_path = Some(path.to_path_buf());
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.container.to_bytes()
    }

    // ── Metadata ───────────────────────────────────────────────────

    pub fn total_triples(&self) -> u64 {
        self.container.header.nb_triples
    }

    /// Distinct subjects, shared terms included.
    pub fn subject_count(&self) -> u64 {
        self.container.header.nb_subjects
    }

    pub fn predicate_count(&self) -> u64 {
        self.container.header.nb_predicates
    }

    /// Distinct objects, shared terms included.
    pub fn object_count(&self) -> u64 {
        self.container.header.nb_objects
    }

    pub fn shared_count(&self) -> u64 {
        self.container.header.nb_shared
    }

    pub fn base_uri(&self) -> &str {
        &self.container.base_uri
    }

    /// Creation time in unix seconds.
    pub fn created_at(&self) -> u64 {
        self.container.header.created_at
    }

    /// Path the store was opened from or last saved to.
    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    pub fn dictionary(&self) -> &FourSectionDictionary {
        &self.container.dictionary
    }

    pub fn triples(&self) -> &BitmapTriples {
        &self.container.triples
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            total_triples: self.total_triples(),
            subjects: self.subject_count(),
            predicates: self.predicate_count(),
            objects: self.object_count(),
            shared: self.shared_count(),
            dictionary_bytes: self.dictionary().size_bytes(),
            index_bytes: self.triples().size_bytes(),
            base_uri: self.base_uri().to_string(),
            created_at: self.created_at(),
            file_path: self.file_path.clone(),
        }
    }

    // ── Term conversion ────────────────────────────────────────────

    /// Identifier of `term` in `role`; `None` when absent.
    pub fn convert_term(&self, term: &str, role: Role) -> Result<Option<u64>> {
        self.dictionary().string_to_id(term, role)
    }

    /// Term for `id` in `role`.
    pub fn convert_id(&self, id: u64, role: Role) -> Result<String> {
        self.dictionary().id_to_string(id, role)
    }

    pub fn triple_id_to_string(&self, subject: u64, predicate: u64, object: u64) -> Result<Triple> {
        results::decode_triple(self.dictionary(), TripleId::new(subject, predicate, object))
    }

    /// The identifier that the term behind `id` in role `from` has in role
    /// `to`, or `None` when that term never appears there.
    pub(crate) fn translate_id(&self, id: u64, from: Role, to: Role) -> Result<Option<u64>> {
        let dict = self.dictionary();
        match (from, to) {
            _ if from == to => Ok(Some(id)),
            (Role::Subject, Role::Object) | (Role::Object, Role::Subject) => {
                Ok((id <= dict.nb_shared() as u64).then_some(id))
            }
            _ => {
                let term = dict.id_to_string(id, from)?;
                dict.string_to_id(&term, to)
            }
        }
    }

    // ── Search ─────────────────────────────────────────────────────

    /// Search with string terms; an empty string is a wildcard.
    ///
    /// A bound term missing from the dictionary yields an empty iterator
    /// with cardinality 0. Its position in the reported pattern is `Some(0)`.
    ///
    /// The cardinality is exact. For S?O, ?PO and ??O it is counted by
    /// walking the index, and ??O walks every subject-predicate pair.
    pub fn search_triples(
        &self,
        subject: &str,
        predicate: &str,
        object: &str,
    ) -> Result<(TripleIter<'_>, usize)> {
        self.search_triples_with(subject, predicate, object, SearchOptions::default())
    }

    pub fn search_triples_with(
        &self,
        subject: &str,
        predicate: &str,
        object: &str,
        options: SearchOptions,
    ) -> Result<(TripleIter<'_>, usize)> {
        let mut missing = false;
        let mut resolve = |term: &str, role| -> Result<Option<u64>> {
            if term.is_empty() {
                return Ok(None);
            }
            let id = self.convert_term(term, role)?;
            missing |= id.is_none();
            Ok(Some(id.unwrap_or(0)))
        };
        let pattern = IdPattern::new(
            resolve(subject, Role::Subject)?,
            resolve(predicate, Role::Predicate)?,
            resolve(object, Role::Object)?,
        );

        let ids = if missing {
            TripleIdResults::new(None, pattern, 0, options)
        } else {
            self.id_results(pattern, options)
        };
        let cardinality = ids.cardinality();
        Ok((
            TripleIter::new(ids, self.dictionary(), subject, predicate, object),
            cardinality,
        ))
    }

    /// Search with identifiers; 0 is a wildcard.
    pub fn search_triples_ids(
        &self,
        subject: u64,
        predicate: u64,
        object: u64,
    ) -> (TripleIdResults<'_>, usize) {
        self.search_triples_ids_with(subject, predicate, object, SearchOptions::default())
    }

    pub fn search_triples_ids_with(
        &self,
        subject: u64,
        predicate: u64,
        object: u64,
        options: SearchOptions,
    ) -> (TripleIdResults<'_>, usize) {
        let ids = self.id_results(IdPattern::from_ids(subject, predicate, object), options);
        let cardinality = ids.cardinality();
        (ids, cardinality)
    }

    fn id_results(&self, pattern: IdPattern, options: SearchOptions) -> TripleIdResults<'_> {
        let cardinality = self.triples().count(pattern);
        TripleIdResults::new(Some(self.triples().search(pattern)), pattern, cardinality, options)
    }

    /// Evaluate a basic graph pattern. Components starting with `?` are
    /// variables, empty components are wildcards.
    pub fn search_join<S: AsRef<str>>(&self, patterns: &[[S; 3]]) -> Result<JoinIter<'_>> {
        JoinIter::new(self, patterns)
    }
}

impl fmt::Display for TripleStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file_path {
            Some(path) => write!(f, "<TripleStore {}", path.display())?,
            None => write!(f, "<TripleStore (in memory)")?,
        }
        write!(f, ": {} triples>", self.total_triples())
    }
}
