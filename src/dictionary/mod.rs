//! Four-section term dictionary.
//!
//! Terms are split into four front-coded sections:
//!
//! | Section | Holds | Identifiers |
//! |---------|-------|-------------|
//! | shared | terms used as subject and as object | `1..=S` in both roles |
//! | subjects | subject-only terms | `S+1..` |
//! | predicates | predicate terms | `1..` (own space) |
//! | objects | object-only terms | `S+1..` |
//!
//! Binary format: the four sections back to back, in the order above.

mod builder;
mod section;

use std::fmt;
use std::io::Write;

use serde::{Deserialize, Serialize};

pub use builder::{BuiltDictionary, DictionaryBuilder, IdMapping};
pub use section::FrontCodedSection;

use crate::codec::ByteReader;
use crate::error::{HdtError, Result};

/// Position of a term inside a triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Subject,
    Predicate,
    Object,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Subject => "subject",
            Role::Predicate => "predicate",
            Role::Object => "object",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FourSectionDictionary {
    shared: FrontCodedSection,
    subjects: FrontCodedSection,
    predicates: FrontCodedSection,
    objects: FrontCodedSection,
}

impl FourSectionDictionary {
    pub fn new(
        shared: FrontCodedSection,
        subjects: FrontCodedSection,
        predicates: FrontCodedSection,
        objects: FrontCodedSection,
    ) -> Self {
        Self {
            shared,
            subjects,
            predicates,
            objects,
        }
    }

    /// Identifier of `term` in `role`, or `None` when the term never
    /// appears there.
    pub fn string_to_id(&self, term: &str, role: Role) -> Result<Option<u64>> {
        match role {
            Role::Predicate => self.predicates.locate(term),
            Role::Subject | Role::Object => {
                if let Some(id) = self.shared.locate(term)? {
                    return Ok(Some(id));
                }
                let nb_shared = self.nb_shared() as u64;
                Ok(self.role_section(role).locate(term)?.map(|pos| nb_shared + pos))
            }
        }
    }

    /// Term for `id` in `role`.
    pub fn id_to_string(&self, id: u64, role: Role) -> Result<String> {
        let max = self.max_id(role);
        if id == 0 || id > max {
            return Err(HdtError::OutOfRange { id, role, max });
        }
        let nb_shared = self.nb_shared() as u64;
        let decoded = match role {
            Role::Predicate => self.predicates.extract(id)?,
            Role::Subject | Role::Object if id <= nb_shared => self.shared.extract(id)?,
            Role::Subject | Role::Object => self.role_section(role).extract(id - nb_shared)?,
        };
        decoded.ok_or(HdtError::OutOfRange { id, role, max })
    }

    fn role_section(&self, role: Role) -> &FrontCodedSection {
        match role {
            Role::Subject => &self.subjects,
            Role::Predicate => &self.predicates,
            Role::Object => &self.objects,
        }
    }

    /// Largest valid identifier in `role`.
    pub fn max_id(&self, role: Role) -> u64 {
        match role {
            Role::Subject => self.nb_subjects() as u64,
            Role::Predicate => self.nb_predicates() as u64,
            Role::Object => self.nb_objects() as u64,
        }
    }

    pub fn nb_shared(&self) -> usize {
        self.shared.len()
    }

    /// Distinct subjects, shared terms included.
    pub fn nb_subjects(&self) -> usize {
        self.shared.len() + self.subjects.len()
    }

    pub fn nb_predicates(&self) -> usize {
        self.predicates.len()
    }

    /// Distinct objects, shared terms included.
    pub fn nb_objects(&self) -> usize {
        self.shared.len() + self.objects.len()
    }

    pub fn shared(&self) -> &FrontCodedSection {
        &self.shared
    }

    pub fn subjects(&self) -> &FrontCodedSection {
        &self.subjects
    }

    pub fn predicates(&self) -> &FrontCodedSection {
        &self.predicates
    }

    pub fn objects(&self) -> &FrontCodedSection {
        &self.objects
    }

    pub fn size_bytes(&self) -> usize {
        self.shared.size_bytes()
            + self.subjects.size_bytes()
            + self.predicates.size_bytes()
            + self.objects.size_bytes()
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.shared.write_to(writer)?;
        self.subjects.write_to(writer)?;
        self.predicates.write_to(writer)?;
        self.objects.write_to(writer)?;
        Ok(())
    }

    pub fn read_from(reader: &mut ByteReader<'_>) -> Result<Self> {
        let shared = FrontCodedSection::read_from(reader)?;
        let subjects = FrontCodedSection::read_from(reader)?;
        let predicates = FrontCodedSection::read_from(reader)?;
        let objects = FrontCodedSection::read_from(reader)?;
        Ok(Self::new(shared, subjects, predicates, objects))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);
        let dict = Self::read_from(&mut reader)?;
        if reader.remaining() != 0 {
            return Err(HdtError::corrupt(format!(
                "{} trailing bytes after dictionary",
                reader.remaining()
            )));
        }
        Ok(dict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build() -> FourSectionDictionary {
        let mut builder = DictionaryBuilder::new();
        for (s, p, o) in [
            ("ex:alice", "foaf:knows", "ex:bob"),
            ("ex:bob", "foaf:knows", "ex:carol"),
            ("ex:bob", "foaf:name", "\"Bob\""),
            ("ex:dave", "foaf:age", "\"42\""),
        ] {
            builder.intern(s, Role::Subject);
            builder.intern(p, Role::Predicate);
            builder.intern(o, Role::Object);
        }
        builder.build(4).unwrap().dictionary
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::Subject.to_string(), "subject");
        assert_eq!(serde_json::to_string(&Role::Predicate).unwrap(), "\"predicate\"");
    }

    #[test]
    fn test_counts() {
        let dict = build();
        // ex:bob is both subject and object.
        assert_eq!(dict.nb_shared(), 1);
        assert_eq!(dict.nb_subjects(), 3);
        assert_eq!(dict.nb_predicates(), 3);
        assert_eq!(dict.nb_objects(), 4);
    }

    #[test]
    fn test_shared_term_same_id_in_both_roles() {
        let dict = build();
        let as_subject = dict.string_to_id("ex:bob", Role::Subject).unwrap();
        let as_object = dict.string_to_id("ex:bob", Role::Object).unwrap();
        assert_eq!(as_subject, Some(1));
        assert_eq!(as_subject, as_object);
    }

    #[test]
    fn test_role_specific_ids_continue_after_shared() {
        let dict = build();
        // Subject-only, sorted: ex:alice, ex:dave.
        assert_eq!(dict.string_to_id("ex:alice", Role::Subject).unwrap(), Some(2));
        assert_eq!(dict.string_to_id("ex:dave", Role::Subject).unwrap(), Some(3));
        // Object-only, sorted: "42", "Bob", ex:carol.
        assert_eq!(dict.string_to_id("\"42\"", Role::Object).unwrap(), Some(2));
        assert_eq!(dict.string_to_id("ex:carol", Role::Object).unwrap(), Some(4));
        // Predicates have their own space.
        assert_eq!(dict.string_to_id("foaf:age", Role::Predicate).unwrap(), Some(1));
    }

    #[test]
    fn test_absent_is_none_not_error() {
        let dict = build();
        assert_eq!(dict.string_to_id("ex:carol", Role::Subject).unwrap(), None);
        assert_eq!(dict.string_to_id("ex:alice", Role::Object).unwrap(), None);
        assert_eq!(dict.string_to_id("ex:bob", Role::Predicate).unwrap(), None);
    }

    #[test]
    fn test_id_to_string_roundtrip() {
        let dict = build();
        for role in [Role::Subject, Role::Predicate, Role::Object] {
            for id in 1..=dict.max_id(role) {
                let term = dict.id_to_string(id, role).unwrap();
                assert_eq!(dict.string_to_id(&term, role).unwrap(), Some(id));
            }
        }
    }

    #[test]
    fn test_out_of_range() {
        let dict = build();
        let err = dict.id_to_string(0, Role::Subject).unwrap_err();
        assert_eq!(err.code(), "OUT_OF_RANGE");
        let err = dict.id_to_string(5, Role::Object).unwrap_err();
        assert!(matches!(err, HdtError::OutOfRange { id: 5, role: Role::Object, max: 4 }));
    }

    #[test]
    fn test_bytes_roundtrip() {
        let dict = build();
        let mut buf = Vec::new();
        dict.write_to(&mut buf).unwrap();
        let loaded = FourSectionDictionary::from_bytes(&buf).unwrap();
        assert_eq!(loaded, dict);

        buf.push(0);
        assert!(FourSectionDictionary::from_bytes(&buf).is_err());
    }
}
