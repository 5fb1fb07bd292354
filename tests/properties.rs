//! Property tests: generation is order- and duplicate-insensitive, and every
//! query agrees with a naive filter over the input.

use std::collections::BTreeSet;

use hdtdb::container::CREATED_AT_RANGE;
use hdtdb::{IdPattern, Role, Triple, TripleStore};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn term(prefix: &'static str, n: u32) -> impl Strategy<Value = String> {
    (0..n).prop_map(move |i| format!("{}{}", prefix, i))
}

/// Small vocabularies force term reuse across roles and duplicate triples.
fn raw_triples() -> impl Strategy<Value = Vec<(String, String, String)>> {
    prop::collection::vec(
        (
            term("ex:n", 12),
            term("ex:p", 4),
            prop_oneof![term("ex:n", 12), term("\"lit ", 6)],
        ),
        0..80,
    )
}

fn without_timestamp(mut bytes: Vec<u8>) -> Vec<u8> {
    bytes[CREATED_AT_RANGE].fill(0);
    bytes
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn shuffled_and_duplicated_input_gives_identical_container(
        (triples, shuffled) in raw_triples().prop_flat_map(|t| {
            let doubled: Vec<_> = t.iter().cloned().chain(t.iter().cloned()).collect();
            (Just(t), Just(doubled).prop_shuffle())
        })
    ) {
        let a = TripleStore::generate(triples, "http://ex.org/").unwrap();
        let b = TripleStore::generate(shuffled, "http://ex.org/").unwrap();
        prop_assert_eq!(a.total_triples(), b.total_triples());
        prop_assert_eq!(
            without_timestamp(a.to_bytes().unwrap()),
            without_timestamp(b.to_bytes().unwrap())
        );
    }

    #[test]
    fn terms_roundtrip_through_ids(triples in raw_triples()) {
        let store = TripleStore::generate(triples.clone(), "").unwrap();
        for (s, p, o) in &triples {
            for (term, role) in [(s, Role::Subject), (p, Role::Predicate), (o, Role::Object)] {
                let id = store.convert_term(term, role).unwrap();
                prop_assert!(id.is_some(), "{} missing as {}", term, role);
                prop_assert_eq!(&store.convert_id(id.unwrap(), role).unwrap(), term);
            }
        }
    }

    #[test]
    fn searches_match_naive_filter(triples in raw_triples(), pick in 0usize..1000) {
        let store = TripleStore::generate(triples.clone(), "").unwrap();
        let distinct: BTreeSet<(String, String, String)> = triples.into_iter().collect();
        prop_assert_eq!(store.total_triples() as usize, distinct.len());
        if distinct.is_empty() {
            return Ok(());
        }

        // Query every pattern class around one stored triple.
        let (s, p, o) = distinct.iter().nth(pick % distinct.len()).unwrap().clone();
        for mask in 0u8..8 {
            let qs = if mask & 4 != 0 { s.as_str() } else { "" };
            let qp = if mask & 2 != 0 { p.as_str() } else { "" };
            let qo = if mask & 1 != 0 { o.as_str() } else { "" };

            let expected: BTreeSet<Triple> = distinct
                .iter()
                .filter(|(ts, tp, to)| {
                    (qs.is_empty() || ts.as_str() == qs)
                        && (qp.is_empty() || tp.as_str() == qp)
                        && (qo.is_empty() || to.as_str() == qo)
                })
                .map(|(ts, tp, to)| Triple::new(ts.as_str(), tp.as_str(), to.as_str()))
                .collect();

            let (iter, card) = store.search_triples(qs, qp, qo).unwrap();
            let got: Vec<Triple> = iter.map(|t| t.unwrap()).collect();
            prop_assert_eq!(card, expected.len());
            prop_assert_eq!(got.len(), expected.len());
            prop_assert_eq!(got.into_iter().collect::<BTreeSet<_>>(), expected);
        }
    }

    #[test]
    fn fully_bound_search_finds_each_stored_triple_once(triples in raw_triples()) {
        let store = TripleStore::generate(triples, "").unwrap();
        let (ids, _) = store.search_triples_ids(0, 0, 0);
        for t in ids {
            prop_assert_eq!(store.triples().count(IdPattern::from(t)), 1);
            prop_assert!(store.triples().contains(&t));
        }
    }
}

#[test]
fn reversed_input_with_duplicates_is_byte_identical() {
    let base: Vec<(String, String, String)> = (0..300)
        .map(|i| {
            (
                format!("http://ex.org/s/{}", i % 17),
                format!("http://ex.org/p/{}", i % 5),
                format!("http://ex.org/s/{}", (i * 7) % 23),
            )
        })
        .collect();
    let mut noisy: Vec<_> = base.iter().rev().cloned().collect();
    noisy.extend(base.iter().step_by(3).cloned());

    let a = TripleStore::generate(base, "").unwrap();
    let b = TripleStore::generate(noisy, "").unwrap();
    assert_eq!(
        without_timestamp(a.to_bytes().unwrap()),
        without_timestamp(b.to_bytes().unwrap())
    );
    assert!(a.shared_count() > 0);
}
