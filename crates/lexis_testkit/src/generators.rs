//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random test data
//! that maintains required invariants.

use lexis_core::index::{PayloadLen, RawPosting};
use proptest::prelude::*;
use std::collections::BTreeSet;

/// Strategy for index intervals, small enough to produce many entries.
pub fn index_interval_strategy() -> impl Strategy<Value = u32> {
    1u32..=8
}

/// Strategy for strictly increasing text terms, the empty term included.
pub fn sorted_text_terms_strategy(max_len: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set("[a-z]{0,6}", 0..max_len)
        .prop_map(|set| set.into_iter().collect())
}

/// Strategy for strictly increasing integer terms, sometimes starting at
/// `i64::MIN`, which shares its key with the lexicon's sentinel entry.
pub fn sorted_int_terms_strategy(max_len: usize) -> impl Strategy<Value = Vec<i64>> {
    prop::collection::btree_set(prop_oneof![1 => Just(i64::MIN), 9 => any::<i64>()], 0..max_len)
        .prop_map(|set: BTreeSet<i64>| set.into_iter().collect())
}

/// Strategy for payload layouts.
pub fn payload_len_strategy() -> impl Strategy<Value = PayloadLen> {
    prop_oneof![
        Just(PayloadLen::None),
        (1usize..4).prop_map(PayloadLen::Fixed),
        (1usize..3).prop_map(PayloadLen::PerOccurrence),
    ]
}

/// Strategy for one term's postings: increasing doc ids, frequencies of
/// at least one, and payloads sized for the layout.
pub fn postings_strategy(
    max_len: usize,
) -> impl Strategy<Value = (PayloadLen, Vec<RawPosting>)> {
    payload_len_strategy().prop_flat_map(move |payload_len| {
        prop::collection::vec((1u32..5_000, 1u32..6, any::<u8>()), 0..max_len).prop_map(
            move |raw| {
                let mut doc_id = 0u32;
                let postings = raw
                    .into_iter()
                    .map(|(gap, freq, fill)| {
                        doc_id += gap;
                        let payload = vec![fill; payload_len.bytes_for(freq)];
                        RawPosting::new(doc_id, freq, payload)
                    })
                    .collect();
                (payload_len, postings)
            },
        )
    })
}

/// Strategy for skip points: increasing doc ids and file positions.
pub fn skip_points_strategy(max_len: usize) -> impl Strategy<Value = Vec<(u32, u64)>> {
    prop::collection::vec((1u32..100_000, 0u64..1 << 40), 0..max_len).prop_map(|deltas| {
        let (mut doc_id, mut filepos) = (0u32, 0u64);
        deltas
            .into_iter()
            .map(|(d, p)| {
                doc_id += d;
                filepos += p;
                (doc_id, filepos)
            })
            .collect()
    })
}

/// Strategy for byte-string sort items, including empty ones.
pub fn sort_items_strategy(max_len: usize) -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(prop::collection::vec(any::<u8>(), 0..6), 0..max_len)
}

/// Strategy for memory thresholds down to a single byte.
pub fn mem_thresh_strategy() -> impl Strategy<Value = usize> {
    prop_oneof![Just(1usize), 1usize..64, 64usize..4096]
}

/// Strategy for a sortable column: a value (or none) per document, drawn
/// from a small range so duplicates are common.
pub fn sort_column_strategy(max_docs: usize) -> impl Strategy<Value = Vec<Option<i64>>> {
    prop::collection::vec(prop::option::weighted(0.8, -20i64..20), 1..max_docs)
}

/// Strategy for valid lock names.
pub fn lock_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z0-9._-]{1,16}").expect("Invalid regex")
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn postings_are_well_formed((payload_len, postings) in postings_strategy(32)) {
            for pair in postings.windows(2) {
                prop_assert!(pair[0].doc_id < pair[1].doc_id);
            }
            for posting in &postings {
                prop_assert!(posting.freq >= 1);
                prop_assert_eq!(posting.payload.len(), payload_len.bytes_for(posting.freq));
            }
        }

        #[test]
        fn text_terms_are_strictly_increasing(terms in sorted_text_terms_strategy(32)) {
            for pair in terms.windows(2) {
                prop_assert!(pair[0] < pair[1]);
            }
        }

        #[test]
        fn lock_names_use_allowed_characters(name in lock_name_strategy()) {
            prop_assert!(name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')));
        }
    }
}
