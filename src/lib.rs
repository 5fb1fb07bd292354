//! hdtdb: a compact, immutable, queryable RDF triple store.
//!
//! Terms live in a four-section front-coded dictionary; triples live in a
//! bitmap-triples index built on succinct rank/select bitmaps. A store is
//! generated once from raw triples, saved to a single checksummed container
//! file, and then opened and queried without decompressing.
//!
//! ```
//! use hdtdb::TripleStore;
//!
//! let store = TripleStore::generate(
//!     vec![
//!         ("ex:alice", "foaf:knows", "ex:bob"),
//!         ("ex:bob", "foaf:name", "\"Bob\""),
//!     ],
//!     "http://example.org/",
//! )
//! .unwrap();
//!
//! let (results, cardinality) = store.search_triples("ex:bob", "", "").unwrap();
//! assert_eq!(cardinality, 1);
//! for triple in results {
//!     let triple = triple.unwrap();
//!     assert_eq!(triple.predicate, "foaf:name");
//! }
//! ```

pub mod codec;
pub mod config;
pub mod container;
pub mod dictionary;
pub mod error;
pub mod generator;
pub mod sequence;
pub mod store;
pub mod succinct;
pub mod triples;

pub use config::GeneratorConfig;
pub use container::Container;
pub use dictionary::{FourSectionDictionary, Role};
pub use error::{HdtError, Result};
pub use generator::{Generator, RawTriple};
pub use store::{
    JoinIter, SearchOptions, Solution, StoreStats, Triple, TripleIdResults, TripleIter,
    TripleStore,
};
pub use triples::{BitmapTriples, IdPattern, TripleId};
