//! Raw triples in, container out.
//!
//! Pipeline: intern terms with their roles, build the four-section
//! dictionary, map every triple to identifiers, sort and dedup, then build
//! the bitmap-triples index. The result only depends on the set of input
//! triples, not on their order or multiplicity.

use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::GeneratorConfig;
use crate::container::Container;
use crate::dictionary::{DictionaryBuilder, Role};
use crate::error::{HdtError, Result};
use crate::triples::{BitmapTriples, TripleId};

/// A triple as plain strings, before any dictionary exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawTriple {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

impl RawTriple {
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

impl From<(String, String, String)> for RawTriple {
    fn from((s, p, o): (String, String, String)) -> Self {
        Self::new(s, p, o)
    }
}

impl<'a> From<(&'a str, &'a str, &'a str)> for RawTriple {
    fn from((s, p, o): (&'a str, &'a str, &'a str)) -> Self {
        Self::new(s, p, o)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Generator {
    config: GeneratorConfig,
}

impl Generator {
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Build a container from `triples`.
    ///
    /// Any empty term aborts the whole build with `GenerationInput`.
    pub fn generate<I, T>(&self, triples: I, base_uri: &str) -> Result<Container>
    where
        I: IntoIterator<Item = T>,
        T: Into<RawTriple>,
    {
        let start = Instant::now();

        // 1. Intern terms and record the roles they play.
        let stage = Instant::now();
        let mut builder = DictionaryBuilder::new();
        let mut interned: Vec<(u32, u32, u32)> = Vec::new();
        for (i, raw) in triples.into_iter().enumerate() {
            let raw: RawTriple = raw.into();
            for (term, role) in [
                (&raw.subject, Role::Subject),
                (&raw.predicate, Role::Predicate),
                (&raw.object, Role::Object),
            ] {
                if term.is_empty() {
                    return Err(HdtError::GenerationInput(format!(
                        "triple {} has an empty {}",
                        i, role
                    )));
                }
            }
            interned.push((
                builder.intern(&raw.subject, Role::Subject),
                builder.intern(&raw.predicate, Role::Predicate),
                builder.intern(&raw.object, Role::Object),
            ));
        }
        debug!(
            raw_triples = interned.len(),
            terms = builder.len(),
            elapsed_ms = stage.elapsed().as_millis() as u64,
            "Interned terms"
        );

        // 2. Dictionary.
        let stage = Instant::now();
        let built = builder.build(self.config.block_size)?;
        debug!(
            bytes = built.dictionary.size_bytes(),
            elapsed_ms = stage.elapsed().as_millis() as u64,
            "Built dictionary"
        );

        // 3. Map to identifiers.
        let m = &built.mapping;
        let mut ids: Vec<TripleId> = interned
            .iter()
            .map(|&(s, p, o)| TripleId::new(m.subject(s), m.predicate(p), m.object(o)))
            .collect();
        drop(interned);

        // 4. Sort and dedup.
        let stage = Instant::now();
        if ids.len() > self.config.parallel_sort_threshold {
            ids.par_sort_unstable();
        } else {
            ids.sort_unstable();
        }
        let raw_count = ids.len();
        ids.dedup();
        debug!(
            triples = ids.len(),
            duplicates = raw_count - ids.len(),
            elapsed_ms = stage.elapsed().as_millis() as u64,
            "Sorted triples"
        );

        // 5. Index.
        let stage = Instant::now();
        let index = BitmapTriples::from_sorted(&ids)?;
        debug!(
            bytes = index.size_bytes(),
            elapsed_ms = stage.elapsed().as_millis() as u64,
            "Built triple index"
        );

        // 6. Header metadata.
        let container = Container::new(base_uri.to_string(), built.dictionary, index);
        info!(
            triples = container.header.nb_triples,
            subjects = container.header.nb_subjects,
            predicates = container.header.nb_predicates,
            objects = container.header.nb_objects,
            shared = container.header.nb_shared,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Generated container"
        );
        Ok(container)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triples::IdPattern;

    #[test]
    fn test_generate_small_graph() {
        let c = Generator::default()
            .generate(
                vec![
                    ("ex:a", "ex:p", "ex:b"),
                    ("ex:b", "ex:p", "ex:c"),
                    ("ex:a", "ex:q", "\"lit\""),
                ],
                "http://ex.org/",
            )
            .unwrap();
        assert_eq!(c.header.nb_triples, 3);
        assert_eq!(c.header.nb_shared, 1);
        assert_eq!(c.header.nb_subjects, 2);
        assert_eq!(c.header.nb_objects, 3);
        assert_eq!(c.header.nb_predicates, 2);
        assert_eq!(c.base_uri, "http://ex.org/");
    }

    #[test]
    fn test_duplicates_dropped() {
        let c = Generator::default()
            .generate(vec![("s", "p", "o"), ("s", "p", "o"), ("s", "p", "o")], "")
            .unwrap();
        assert_eq!(c.triples.num_triples(), 1);
    }

    #[test]
    fn test_empty_term_aborts() {
        let err = Generator::default()
            .generate(vec![("s", "p", "o"), ("s", "", "o")], "")
            .unwrap_err();
        assert_eq!(err.code(), "GENERATION_INPUT");
        assert!(err.to_string().contains("empty predicate"), "{}", err);
    }

    #[test]
    fn test_parallel_and_sequential_sort_agree() {
        let triples: Vec<RawTriple> = (0..500)
            .map(|i| RawTriple::new(format!("s{}", i % 7), format!("p{}", i % 3), format!("o{}", i)))
            .collect();
        let sequential = Generator::default().generate(triples.clone(), "").unwrap();
        let parallel = Generator::new(GeneratorConfig {
            parallel_sort_threshold: 0,
            ..Default::default()
        })
        .unwrap()
        .generate(triples, "")
        .unwrap();
        assert_eq!(sequential.triples, parallel.triples);
        assert_eq!(
            parallel.triples.search(IdPattern::any()).count(),
            500
        );
    }

    #[test]
    fn test_empty_input() {
        let c = Generator::default()
            .generate(Vec::<RawTriple>::new(), "")
            .unwrap();
        assert_eq!(c.header.nb_triples, 0);
        assert!(c.to_bytes().is_ok());
    }

    #[test]
    fn test_rejects_bad_config() {
        let err = Generator::new(GeneratorConfig {
            block_size: 0,
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(err.code(), "INVALID_CONFIG");
    }
}
