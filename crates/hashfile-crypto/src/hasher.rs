use hashfile_types::Hash;

/// Domain-separated BLAKE3 hasher.
///
/// Each hasher carries a domain tag (e.g. `"hashfile-commit-v1"`) that is
/// prepended to every hash computation, so a commit digest can never collide
/// with the plain content digest of identical bytes.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for commit digests.
    pub const COMMIT: Self = Self {
        domain: "hashfile-commit-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> Hash {
        self.hash_parts(&[data])
    }

    /// Hash a sequence of byte slices as if they were concatenated.
    pub fn hash_parts(&self, parts: &[&[u8]]) -> Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        for part in parts {
            hasher.update(part);
        }
        Hash::from_digest(*hasher.finalize().as_bytes())
    }

    /// Verify that data produces the expected hash.
    pub fn verify(&self, data: &[u8], expected: &Hash) -> bool {
        self.hash(data) == *expected
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let data = b"hello world";
        assert_eq!(ContentHasher::COMMIT.hash(data), ContentHasher::COMMIT.hash(data));
    }

    #[test]
    fn domain_separates_from_plain_digest() {
        let data = b"same content";
        assert_ne!(ContentHasher::COMMIT.hash(data), Hash::from_bytes(data));
    }

    #[test]
    fn different_domains_produce_different_hashes() {
        let custom = ContentHasher::new("my-custom-domain-v1");
        assert_ne!(custom.hash(b"data"), ContentHasher::COMMIT.hash(b"data"));
        assert_eq!(custom.domain(), "my-custom-domain-v1");
    }

    #[test]
    fn parts_match_concatenation() {
        let joined = ContentHasher::COMMIT.hash(b"abcdef");
        let parts = ContentHasher::COMMIT.hash_parts(&[&b"abc"[..], &b"def"[..]]);
        assert_eq!(joined, parts);
    }

    #[test]
    fn verify_detects_tampering() {
        let id = ContentHasher::COMMIT.hash(b"original");
        assert!(ContentHasher::COMMIT.verify(b"original", &id));
        assert!(!ContentHasher::COMMIT.verify(b"tampered", &id));
    }
}
