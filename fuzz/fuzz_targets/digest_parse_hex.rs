//! Fuzz target for Digest::parse_hex
//!
//! This fuzzer feeds arbitrary strings to the hex parser to find panics or
//! inputs that parse but do not round-trip through the lowercase encoder.

#![no_main]

use libfuzzer_sys::fuzz_target;
use vellum_core::Digest;

fuzz_target!(|data: &str| {
    if let Ok(digest) = Digest::parse_hex(data) {
        // Parsing is case-insensitive; encoding is canonical lowercase.
        assert_eq!(digest.to_hex(), data.to_lowercase());
        assert_eq!(Digest::parse_hex(&digest.to_hex()).ok(), Some(digest));
    }
});
