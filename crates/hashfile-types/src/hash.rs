use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Length in bytes of every [`Hash`].
pub const HASH_LEN: usize = 32;

/// Content-addressed digest.
///
/// A `Hash` is the BLAKE3 digest of some content. Identical content always
/// produces the same `Hash`. It is `Copy` and is stored by value in every
/// structure that references it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hash([u8; HASH_LEN]);

impl Hash {
    /// Compute a `Hash` from raw bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Create a `Hash` from a pre-computed digest.
    pub const fn from_digest(digest: [u8; HASH_LEN]) -> Self {
        Self(digest)
    }

    /// Create a `Hash` from a digest slice, checking its length.
    pub fn try_from_slice(slice: &[u8]) -> Result<Self, TypeError> {
        let digest: [u8; HASH_LEN] = slice.try_into().map_err(|_| TypeError::InvalidLength {
            expected: HASH_LEN,
            actual: slice.len(),
        })?;
        Ok(Self(digest))
    }

    /// The raw 32-byte digest.
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Self::try_from_slice(&bytes)
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.short_hex())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Hash {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; HASH_LEN]> for Hash {
    fn from(digest: [u8; HASH_LEN]) -> Self {
        Self(digest)
    }
}

impl From<Hash> for [u8; HASH_LEN] {
    fn from(hash: Hash) -> Self {
        hash.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn from_bytes_is_deterministic() {
        let data = b"this is some data";
        assert_eq!(Hash::from_bytes(data), Hash::from_bytes(data));
    }

    #[test]
    fn different_data_produces_different_hashes() {
        assert_ne!(Hash::from_bytes(b"hello"), Hash::from_bytes(b"world"));
    }

    #[test]
    fn short_hex_is_8_chars() {
        assert_eq!(Hash::from_bytes(b"test").short_hex().len(), 8);
    }

    #[test]
    fn display_is_full_hex() {
        let hash = Hash::from_bytes(b"test");
        let display = format!("{hash}");
        assert_eq!(display.len(), 64);
        assert_eq!(display, hash.to_hex());
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert!(matches!(
            Hash::from_hex("zz"),
            Err(TypeError::InvalidHex(_))
        ));
        assert_eq!(
            Hash::from_hex("abcd").unwrap_err(),
            TypeError::InvalidLength {
                expected: 32,
                actual: 2
            }
        );
    }

    #[test]
    fn try_from_slice_checks_length() {
        assert!(Hash::try_from_slice(&[0u8; 31]).is_err());
        assert_eq!(
            Hash::try_from_slice(&[7u8; 32]).unwrap(),
            Hash::from_digest([7u8; 32])
        );
    }

    #[test]
    fn serde_roundtrip() {
        let hash = Hash::from_bytes(b"serde test");
        let json = serde_json::to_string(&hash).unwrap();
        let parsed: Hash = serde_json::from_str(&json).unwrap();
        assert_eq!(hash, parsed);
    }

    #[test]
    fn ordering_is_consistent() {
        assert!(Hash::from_digest([0; 32]) < Hash::from_digest([1; 32]));
    }

    proptest! {
        #[test]
        fn hex_roundtrip(digest in any::<[u8; 32]>()) {
            let hash = Hash::from_digest(digest);
            prop_assert_eq!(hash.to_hex().parse::<Hash>().unwrap(), hash);
        }
    }
}
