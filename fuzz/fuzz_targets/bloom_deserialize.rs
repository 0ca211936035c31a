//! Fuzz target for BloomFilter::deserialize
//!
//! This fuzzer feeds arbitrary byte sequences to the filter codec to find:
//! - Parser crashes or panics
//! - Integer overflows in geometry calculations
//! - Oversized allocations from hostile headers
//! - Filters that violate the popcount <= m invariant
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an error.

#![no_main]

use libfuzzer_sys::fuzz_target;
use vellum_core::BloomFilter;

fuzz_target!(|data: &[u8]| {
    if let Ok(filter) = BloomFilter::deserialize(data) {
        // A filter that validates must also behave: probing and
        // re-serializing cannot panic, and the round trip is identity.
        let _ = filter.may_contain(b"probe");
        let _ = filter.estimate_count();
        let bytes = filter.serialize();
        assert_eq!(BloomFilter::deserialize(&bytes).ok(), Some(filter));
    }
});
