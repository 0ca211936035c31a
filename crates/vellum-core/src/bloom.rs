//! Bloom filter for conflict detection.
//!
//! Change sets exchanged between nodes carry a Bloom filter over their
//! touched paths and object digests. Two change sets whose filters do not
//! intersect are guaranteed disjoint and can merge without a path-level
//! walk; an intersection only means a conflict is *possible*.
//!
//! False positives are allowed (bounded by the construction rate), false
//! negatives are forbidden.
//!
//! # Wire format
//!
//! Little-endian layout, stable across releases:
//!
//! ```text
//! [magic "HBF1": 4 bytes] [m: u32] [k: u32] [bits: ceil(m/8) bytes]
//! ```
//!
//! Bits are packed LSB-first within each byte: bit index `i` lives at byte
//! `i / 8`, position `i % 8`.

use crate::error::BloomError;
use crate::hash::Digest;

/// Serialization magic, "HBF1" in ASCII.
const MAGIC: [u8; 4] = *b"HBF1";

/// Serialized header size: magic + m + k.
const HEADER_SIZE: usize = 12;

/// Upper bound on the bit-array length, constructed or deserialized
/// (128 MiB of filter). Rejecting larger inputs caps the allocation a
/// corrupt or hostile filter can trigger, and every constructible filter
/// stays round-trippable.
const MAX_BITS: u64 = 1 << 30;

/// Upper bound on the probe count, constructed or deserialized.
const MAX_PROBES: u32 = 1024;

/// Approximate-membership filter over paths and digests.
///
/// Geometry `(m, k)` is fixed at construction: `m` bits (always a multiple
/// of 64) and `k` probe positions per element. Filters can only be merged
/// or intersection-tested when their geometry matches.
///
/// # Invariants
///
/// - `m > 0`, `k >= 1`
/// - `popcount(bits) <= m`
/// - [`merge`](Self::merge) preserves `(m, k)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BloomFilter {
    /// Bit array, 64 bits per block, bit `i` at block `i / 64` position
    /// `i % 64`.
    blocks: Vec<u64>,

    /// Bit-array length `m`.
    num_bits: u64,

    /// Probe count `k`.
    num_hashes: u32,
}

impl BloomFilter {
    /// Create a filter sized for `expected_items` insertions at the target
    /// false-positive rate.
    ///
    /// `m = ceil(-n * ln p / (ln 2)^2)` rounded up to a multiple of 64, and
    /// `k = max(1, round((m / n) * ln 2))`.
    ///
    /// # Errors
    ///
    /// `InvalidParams` if `expected_items` is zero or `fp_rate` is outside
    /// the open interval `(0, 1)`, or if the requested geometry overflows
    /// the serializable range.
    pub fn new(expected_items: usize, fp_rate: f64) -> Result<Self, BloomError> {
        if expected_items == 0 || !fp_rate.is_finite() || fp_rate <= 0.0 || fp_rate >= 1.0 {
            return Err(BloomError::InvalidParams { expected_items, fp_rate });
        }

        let ln2 = std::f64::consts::LN_2;
        let n = expected_items as f64;

        let raw_bits = (-n * fp_rate.ln() / (ln2 * ln2)).ceil();
        if !raw_bits.is_finite() || raw_bits > MAX_BITS as f64 {
            return Err(BloomError::InvalidParams { expected_items, fp_rate });
        }

        // MAX_BITS is itself a multiple of 64, so rounding cannot escape it.
        let num_bits = (raw_bits as u64).max(1).div_ceil(64) * 64;

        let num_hashes = ((num_bits as f64 / n) * ln2).round().max(1.0) as u32;
        if num_hashes > MAX_PROBES {
            return Err(BloomError::InvalidParams { expected_items, fp_rate });
        }

        Ok(Self {
            blocks: vec![0u64; (num_bits / 64) as usize],
            num_bits,
            num_hashes,
        })
    }

    /// Bit-array length `m`.
    #[must_use]
    pub fn num_bits(&self) -> u64 {
        self.num_bits
    }

    /// Probe count `k`.
    #[must_use]
    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    /// Add a path (or any byte string) to the filter.
    pub fn add_path(&mut self, path: &[u8]) {
        let (h1, h2) = probe_pair(path);
        for i in 0..u64::from(self.num_hashes) {
            self.set_bit(probe_index(h1, h2, i, self.num_bits));
        }
    }

    /// Add an object digest to the filter.
    ///
    /// The digest bytes are the probe input, so a digest and a path with
    /// identical bytes map to the same positions.
    pub fn add_hash(&mut self, digest: &Digest) {
        self.add_path(digest.as_bytes());
    }

    /// Membership test: true when all `k` probed bits are set.
    ///
    /// A `true` answer may be a false positive; `false` is definitive.
    #[must_use]
    pub fn may_contain(&self, path: &[u8]) -> bool {
        let (h1, h2) = probe_pair(path);
        (0..u64::from(self.num_hashes))
            .all(|i| self.test_bit(probe_index(h1, h2, i, self.num_bits)))
    }

    /// True when some bit is set in both filters.
    ///
    /// Filters with different geometry probe incomparable positions and
    /// never report an intersection.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        if self.num_bits != other.num_bits || self.num_hashes != other.num_hashes {
            return false;
        }
        self.blocks.iter().zip(&other.blocks).any(|(a, b)| a & b != 0)
    }

    /// Union `other` into `self` (bitwise OR).
    ///
    /// # Errors
    ///
    /// `Incompatible` when the geometries differ.
    pub fn merge(&mut self, other: &Self) -> Result<(), BloomError> {
        if self.num_bits != other.num_bits || self.num_hashes != other.num_hashes {
            return Err(BloomError::Incompatible {
                bits_a: self.num_bits,
                hashes_a: self.num_hashes,
                bits_b: other.num_bits,
                hashes_b: other.num_hashes,
            });
        }
        for (a, b) in self.blocks.iter_mut().zip(&other.blocks) {
            *a |= b;
        }
        Ok(())
    }

    /// Estimate the number of distinct insertions from the fill level:
    /// `-(m / k) * ln(1 - popcount / m)`.
    ///
    /// Saturates at `usize::MAX` for a completely full filter.
    #[must_use]
    pub fn estimate_count(&self) -> usize {
        let set_bits = self.popcount();
        if set_bits == 0 {
            return 0;
        }
        if set_bits >= self.num_bits {
            return usize::MAX;
        }

        let m = self.num_bits as f64;
        let k = f64::from(self.num_hashes);
        let fill = set_bits as f64 / m;
        (-(m / k) * (1.0 - fill).ln()).round() as usize
    }

    /// Serialize to the stable little-endian wire format.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let bits_len = (self.num_bits as usize).div_ceil(8);
        let mut out = Vec::with_capacity(HEADER_SIZE + bits_len);

        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&(self.num_bits as u32).to_le_bytes());
        out.extend_from_slice(&self.num_hashes.to_le_bytes());
        for block in &self.blocks {
            out.extend_from_slice(&block.to_le_bytes());
        }
        out.truncate(HEADER_SIZE + bits_len);

        out
    }

    /// Deserialize from the wire format.
    ///
    /// Validates the magic, the geometry bounds, the exact payload length,
    /// and that padding bits past `m` are clear.
    ///
    /// # Errors
    ///
    /// `CorruptFilter` on any validation failure.
    pub fn deserialize(data: &[u8]) -> Result<Self, BloomError> {
        let header: &[u8; HEADER_SIZE] = data
            .get(..HEADER_SIZE)
            .and_then(|h| h.try_into().ok())
            .ok_or(BloomError::CorruptFilter("shorter than header"))?;

        if header[0..4] != MAGIC {
            return Err(BloomError::CorruptFilter("bad magic"));
        }

        let num_bits = u64::from(u32::from_le_bytes([header[4], header[5], header[6], header[7]]));
        let num_hashes = u32::from_le_bytes([header[8], header[9], header[10], header[11]]);

        if num_bits == 0 || num_bits > MAX_BITS {
            return Err(BloomError::CorruptFilter("bit count out of range"));
        }
        if num_hashes == 0 || num_hashes > MAX_PROBES {
            return Err(BloomError::CorruptFilter("probe count out of range"));
        }

        let bits_len = (num_bits as usize).div_ceil(8);
        let bits = data
            .get(HEADER_SIZE..)
            .filter(|rest| rest.len() == bits_len)
            .ok_or(BloomError::CorruptFilter("payload length mismatch"))?;

        let mut blocks = vec![0u64; (num_bits as usize).div_ceil(64)];
        for (i, chunk) in bits.chunks(8).enumerate() {
            let mut word = [0u8; 8];
            word[..chunk.len()].copy_from_slice(chunk);
            blocks[i] = u64::from_le_bytes(word);
        }

        // Padding bits past m must be clear, otherwise popcount could
        // exceed m and the estimate would lie.
        let tail_bits = (num_bits % 64) as u32;
        if tail_bits != 0 {
            let last = blocks[blocks.len() - 1];
            if last >> tail_bits != 0 {
                return Err(BloomError::CorruptFilter("padding bits set"));
            }
        }

        Ok(Self { blocks, num_bits, num_hashes })
    }

    /// Number of set bits.
    fn popcount(&self) -> u64 {
        self.blocks.iter().map(|b| u64::from(b.count_ones())).sum()
    }

    fn set_bit(&mut self, index: u64) {
        self.blocks[(index / 64) as usize] |= 1u64 << (index % 64);
    }

    fn test_bit(&self, index: u64) -> bool {
        self.blocks[(index / 64) as usize] & (1u64 << (index % 64)) != 0
    }
}

/// Derive the double-hashing pair from the Blake3 digest of the input:
/// the first two little-endian u64 words.
fn probe_pair(data: &[u8]) -> (u64, u64) {
    let digest = blake3::hash(data);
    let bytes = digest.as_bytes();

    let mut word = [0u8; 8];
    word.copy_from_slice(&bytes[0..8]);
    let h1 = u64::from_le_bytes(word);
    word.copy_from_slice(&bytes[8..16]);
    let h2 = u64::from_le_bytes(word);

    (h1, h2)
}

/// Probe position `i`: `(h1 + i * h2) mod m`.
fn probe_index(h1: u64, h2: u64, i: u64, num_bits: u64) -> u64 {
    h1.wrapping_add(i.wrapping_mul(h2)) % num_bits
}
