//! Vellum Core Primitives
//!
//! Building blocks for a distributed, content-addressed version control
//! system. Pure data structures with deterministic outputs and stable wire
//! encodings.
//!
//! # Components
//!
//! - [`Digest`]: 256-bit Blake3 content digest with a hex codec. Blobs are
//!   hashed with a type prefix so file content and raw bytes never collide.
//! - [`BloomFilter`]: approximate-membership filter used for fast conflict
//!   detection between change sets. Supports union, intersection tests, and
//!   a stable serialization for exchange between nodes.
//! - [`HlcClock`]: Hybrid Logical Clock combining wall time with a logical
//!   counter and a node id, giving a total order over events across nodes.
//!
//! # Concurrency
//!
//! None of these types synchronize internally. A [`BloomFilter`] or
//! [`HlcClock`] must be owned or externally serialized by its caller; the
//! hash functions are pure and free of shared state.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod bloom;
mod error;
pub mod hash;
pub mod hlc;

pub use bloom::BloomFilter;
pub use error::{BloomError, HashError};
pub use hash::{Digest, hash, hash_blob};
pub use hlc::{HlcClock, HlcTimestamp};

/// Library version string.
pub const VERSION: &str = "0.1.0";

/// ABI version for compatibility checking across node deployments.
///
/// Incremented whenever a wire encoding in this crate changes shape.
pub const ABI_VERSION: u32 = 1;
