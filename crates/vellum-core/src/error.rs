//! Error types for the core primitives.
//!
//! Strongly-typed errors per component. Codec failures carry enough context
//! to distinguish a malformed input from an incompatible one: a filter that
//! fails to deserialize is corrupt, a filter that deserializes but cannot be
//! merged is incompatible.

use thiserror::Error;

/// Errors from the digest hex codec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HashError {
    /// Input is not exactly 64 hex characters.
    #[error("invalid hex digest: expected 64 hex characters, got {0}")]
    InvalidHex(String),
}

/// Errors from Bloom filter construction, merging, and deserialization.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BloomError {
    /// Construction parameters out of range.
    #[error("invalid bloom parameters: expected_items={expected_items}, fp_rate={fp_rate}")]
    InvalidParams {
        /// Requested capacity.
        expected_items: usize,
        /// Requested false-positive rate.
        fp_rate: f64,
    },

    /// Serialized filter failed validation.
    #[error("corrupt bloom filter: {0}")]
    CorruptFilter(&'static str),

    /// Two filters with different geometry cannot be combined.
    #[error(
        "incompatible bloom filters: ({bits_a} bits, {hashes_a} hashes) vs \
         ({bits_b} bits, {hashes_b} hashes)"
    )]
    Incompatible {
        /// Bit-array length of the left filter.
        bits_a: u64,
        /// Hash count of the left filter.
        hashes_a: u32,
        /// Bit-array length of the right filter.
        bits_b: u64,
        /// Hash count of the right filter.
        hashes_b: u32,
    },
}
