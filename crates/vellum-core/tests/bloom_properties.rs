//! Property-based tests for the Bloom filter.
//!
//! These verify the structural guarantees for arbitrary inputs, not just
//! hand-picked examples: no false negatives, serialization round-trips, and
//! merge behaving as set union. The false-positive bound is checked with a
//! deterministic workload sized so the measurement sits far from the
//! threshold.

use proptest::prelude::*;
use vellum_core::BloomFilter;

/// Strategy for plausible path-like byte strings.
fn arbitrary_paths() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(prop::collection::vec(any::<u8>(), 1..64), 1..200)
}

#[test]
fn prop_no_false_negatives() {
    proptest!(|(paths in arbitrary_paths())| {
        let mut bloom = BloomFilter::new(paths.len(), 0.01).unwrap();

        for path in &paths {
            bloom.add_path(path);
        }
        for path in &paths {
            prop_assert!(bloom.may_contain(path), "false negative for {path:?}");
        }
    });
}

#[test]
fn prop_serialize_round_trip() {
    proptest!(|(paths in arbitrary_paths())| {
        let mut bloom = BloomFilter::new(paths.len(), 0.05).unwrap();
        for path in &paths {
            bloom.add_path(path);
        }

        let restored = BloomFilter::deserialize(&bloom.serialize()).unwrap();

        // PROPERTY: Round-trip must be identity, bitwise and behaviorally.
        prop_assert_eq!(&restored, &bloom);
        for path in &paths {
            prop_assert!(restored.may_contain(path));
        }
    });
}

#[test]
fn prop_merge_equals_union_of_answers() {
    proptest!(|(left in arbitrary_paths(), right in arbitrary_paths(), probe in prop::collection::vec(any::<u8>(), 1..64))| {
        // Same geometry on both sides so the merge is defined.
        let mut a = BloomFilter::new(256, 0.01).unwrap();
        let mut b = BloomFilter::new(256, 0.01).unwrap();

        for path in &left {
            a.add_path(path);
        }
        for path in &right {
            b.add_path(path);
        }

        let answer_a = a.may_contain(&probe);
        let answer_b = b.may_contain(&probe);

        let mut merged = a.clone();
        merged.merge(&b).unwrap();

        // PROPERTY: The merged filter answers exactly the disjunction.
        prop_assert_eq!(merged.may_contain(&probe), answer_a || answer_b);
    });
}

#[test]
fn prop_deserialize_never_panics_on_mutation() {
    proptest!(|(flip_at in 0usize..200, replacement in any::<u8>())| {
        let mut bloom = BloomFilter::new(100, 0.01).unwrap();
        bloom.add_path(b"seed");

        let mut bytes = bloom.serialize();
        if flip_at < bytes.len() {
            bytes[flip_at] = replacement;
        }

        // Any outcome is fine as long as validation fails cleanly.
        let _ = BloomFilter::deserialize(&bytes);
    });
}

/// False-positive rate at full load stays within 1.5x of the target.
///
/// n = 1000 at p = 1% gives an expected measured rate near 1% with a
/// standard error around 0.1% over 10_000 fresh queries, so the 1.5%
/// threshold is a five-sigma margin. The workload is deterministic.
#[test]
fn fp_rate_within_bound_at_capacity() {
    const N: usize = 1000;
    const P: f64 = 0.01;
    const QUERIES: usize = 10_000;

    let mut bloom = BloomFilter::new(N, P).unwrap();
    for i in 0..N {
        bloom.add_path(format!("inserted/item-{i}").as_bytes());
    }

    let false_positives = (0..QUERIES)
        .filter(|i| bloom.may_contain(format!("fresh/query-{i}").as_bytes()))
        .count();

    let measured = false_positives as f64 / QUERIES as f64;
    assert!(
        measured <= P * 1.5,
        "measured fp rate {measured} exceeds bound {}",
        P * 1.5
    );
}

/// Estimated count lands near the true insertion count at capacity.
#[test]
fn estimate_accuracy_at_capacity() {
    const N: usize = 1000;

    let mut bloom = BloomFilter::new(N, 0.01).unwrap();
    for i in 0..N {
        bloom.add_path(format!("item-{i}").as_bytes());
    }

    let estimate = bloom.estimate_count();
    let error = estimate.abs_diff(N);
    assert!(error <= N / 10, "estimate {estimate} too far from {N}");
}
