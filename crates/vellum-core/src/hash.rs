//! Blake3 content digests.
//!
//! Every object in a repository is addressed by the Blake3 hash of its
//! bytes. Blobs (file contents) are hashed with a type prefix of the form
//! `"blob" || length_decimal || NUL` so a file whose content happens to
//! equal another object's encoding still gets a distinct address.
//!
//! The hex form is always emitted lowercase; parsing accepts mixed case but
//! requires exactly [`Digest::HEX_SIZE`] characters.

use std::{fmt, str::FromStr};

use crate::error::HashError;

/// A 256-bit Blake3 content digest.
///
/// Value type with total order (byte-wise) so digests can key ordered maps
/// and be compared across nodes without further normalization.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Digest([u8; Digest::SIZE]);

impl Digest {
    /// Digest size in bytes (256 bits).
    pub const SIZE: usize = 32;

    /// Length of the hex form in characters.
    pub const HEX_SIZE: usize = Self::SIZE * 2;

    /// Wrap raw digest bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; Self::SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; Self::SIZE] {
        &self.0
    }

    /// Lowercase hex form, 64 characters.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a hex digest.
    ///
    /// Accepts mixed case. Any length other than 64 characters, or any
    /// non-hex byte, fails with [`HashError::InvalidHex`].
    pub fn parse_hex(hex_str: &str) -> Result<Self, HashError> {
        if hex_str.len() != Self::HEX_SIZE {
            return Err(HashError::InvalidHex(format!(
                "length {} != {}",
                hex_str.len(),
                Self::HEX_SIZE
            )));
        }

        let mut out = [0u8; Self::SIZE];
        hex::decode_to_slice(hex_str, &mut out)
            .map_err(|e| HashError::InvalidHex(e.to_string()))?;

        Ok(Self(out))
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl FromStr for Digest {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_hex(s)
    }
}

/// Hash raw bytes with Blake3.
#[must_use]
pub fn hash(data: &[u8]) -> Digest {
    Digest(*blake3::hash(data).as_bytes())
}

/// Hash blob content with the `"blob" || length_decimal || NUL` type prefix.
///
/// The prefix guarantees `hash_blob(x) != hash(x)` so object kinds occupy
/// disjoint regions of the address space.
#[must_use]
pub fn hash_blob(content: &[u8]) -> Digest {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"blob");
    hasher.update(content.len().to_string().as_bytes());
    hasher.update(&[0]);
    hasher.update(content);
    Digest(*hasher.finalize().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Blake3 hash of the empty input, from the reference test vectors.
    const EMPTY_HEX: &str = "af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262";

    #[test]
    fn empty_input_matches_reference_vector() {
        assert_eq!(hash(b"").to_hex(), EMPTY_HEX);
    }

    #[test]
    fn hash_is_deterministic() {
        let data = b"the quick brown fox";
        assert_eq!(hash(data), hash(data));
    }

    #[test]
    fn different_inputs_produce_different_digests() {
        assert_ne!(hash(b"a"), hash(b"b"));
    }

    #[test]
    fn blob_prefix_changes_digest() {
        let content = b"hello world";
        assert_ne!(hash_blob(content), hash(content));
    }

    #[test]
    fn blob_length_is_part_of_the_prefix() {
        // Same leading bytes, different declared length.
        assert_ne!(hash_blob(b"ab"), hash_blob(b"abc"));
    }

    #[test]
    fn hex_round_trip() {
        let digest = hash(b"round trip");
        let parsed = Digest::parse_hex(&digest.to_hex()).unwrap();
        assert_eq!(parsed, digest);
    }

    #[test]
    fn parse_accepts_mixed_case() {
        let digest = hash(b"case");
        let upper = digest.to_hex().to_uppercase();
        assert_eq!(Digest::parse_hex(&upper).unwrap(), digest);
    }

    #[test]
    fn emitted_hex_is_lowercase() {
        let hex_form = hash(b"case").to_hex();
        assert_eq!(hex_form, hex_form.to_lowercase());
        assert_eq!(hex_form.len(), Digest::HEX_SIZE);
    }

    #[test]
    fn parse_rejects_wrong_length() {
        assert!(matches!(Digest::parse_hex("abcd"), Err(HashError::InvalidHex(_))));
        assert!(matches!(
            Digest::parse_hex(&"a".repeat(Digest::HEX_SIZE + 2)),
            Err(HashError::InvalidHex(_))
        ));
        assert!(matches!(Digest::parse_hex(""), Err(HashError::InvalidHex(_))));
    }

    #[test]
    fn parse_rejects_non_hex_bytes() {
        let bad = "Z".repeat(Digest::HEX_SIZE);
        assert!(matches!(Digest::parse_hex(&bad), Err(HashError::InvalidHex(_))));
    }

    #[test]
    fn from_str_parses_display_output() {
        let digest = hash(b"display");
        let parsed: Digest = digest.to_string().parse().unwrap();
        assert_eq!(parsed, digest);
    }

    #[test]
    fn ordering_is_bytewise() {
        let zero = Digest::from_bytes([0u8; Digest::SIZE]);
        let one = Digest::from_bytes({
            let mut b = [0u8; Digest::SIZE];
            b[31] = 1;
            b
        });
        assert!(zero < one);
    }
}
