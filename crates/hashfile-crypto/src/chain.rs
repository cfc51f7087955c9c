use hashfile_types::Hash;

use crate::hasher::ContentHasher;

/// Marker appended when a link has no parent.
const NO_PARENT: u8 = 0;
/// Marker appended before the parent digest when one exists.
const HAS_PARENT: u8 = 1;

/// Trait for objects that participate in a hash chain.
pub trait ChainLink {
    /// The link's own hash.
    fn link_hash(&self) -> Hash;
    /// The previous link's hash (None for the first link).
    fn parent_hash(&self) -> Option<Hash>;
    /// Canonical payload bytes for hash verification.
    fn payload_bytes(&self) -> Vec<u8>;
}

/// Hash chain integrity verifier.
///
/// A chain is valid when the first link has no parent, every later link's
/// parent is the hash of the link before it, and every link's hash is
/// correctly computed from its payload and parent.
pub struct HashChainVerifier;

impl HashChainVerifier {
    /// Verify a chain of links front-to-back.
    pub fn verify_chain<L: ChainLink>(links: &[L]) -> Result<(), ChainError> {
        let mut expected_parent: Option<Hash> = None;
        for (index, link) in links.iter().enumerate() {
            match (expected_parent, link.parent_hash()) {
                (None, Some(_)) => return Err(ChainError::GenesisHasParent),
                (Some(_), None) => return Err(ChainError::MissingParent { index }),
                (Some(expected), Some(actual)) if expected != actual => {
                    return Err(ChainError::BrokenLink { index });
                }
                _ => {}
            }

            let computed = Self::compute_hash(&link.payload_bytes(), link.parent_hash());
            if computed != link.link_hash() {
                return Err(ChainError::HashMismatch { index });
            }
            expected_parent = Some(computed);
        }
        Ok(())
    }

    /// Compute the hash of a payload chained to an optional parent.
    ///
    /// The digest covers the payload followed by a presence marker and, when
    /// present, the parent digest.
    pub fn compute_hash(payload: &[u8], parent: Option<Hash>) -> Hash {
        match parent {
            Some(parent) => ContentHasher::COMMIT.hash_parts(&[
                payload,
                &[HAS_PARENT][..],
                &parent.as_bytes()[..],
            ]),
            None => ContentHasher::COMMIT.hash_parts(&[payload, &[NO_PARENT][..]]),
        }
    }
}

/// Errors from chain verification.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("first link has a parent hash (should be None)")]
    GenesisHasParent,

    #[error("broken link at index {index}: parent does not match previous hash")]
    BrokenLink { index: usize },

    #[error("missing parent at index {index} (should reference previous link)")]
    MissingParent { index: usize },

    #[error("hash mismatch at index {index}: computed hash differs from stored")]
    HashMismatch { index: usize },
}
