//! Commits and the commit chain.

use hashfile_crypto::{ChainError, ChainLink, HashChainVerifier};
use hashfile_types::Hash;

use crate::action::Action;
use crate::codec::ActionCodec;
use crate::error::{ReferenceError, Result};

/// One committed transaction.
///
/// The hash is derived from the encoded action and the parent hash, so two
/// commits with the same hash describe the same change at the same position
/// in history.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Commit {
    action: Action,
    parent: Option<Hash>,
    hash: Hash,
}

impl Commit {
    /// Create a commit, computing its hash.
    pub fn new(action: Action, parent: Option<Hash>) -> Self {
        let hash = HashChainVerifier::compute_hash(&ActionCodec::to_bytes(&action), parent);
        Self {
            action,
            parent,
            hash,
        }
    }

    /// Reassemble a decoded commit without recomputing its hash.
    pub(crate) fn from_parts(action: Action, parent: Option<Hash>, hash: Hash) -> Self {
        Self {
            action,
            parent,
            hash,
        }
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    /// Hash of the previous commit, `None` for the first one.
    pub fn parent(&self) -> Option<Hash> {
        self.parent
    }

    pub fn hash(&self) -> Hash {
        self.hash
    }

    pub fn is_genesis(&self) -> bool {
        self.parent.is_none()
    }
}

impl ChainLink for Commit {
    fn link_hash(&self) -> Hash {
        self.hash
    }

    fn parent_hash(&self) -> Option<Hash> {
        self.parent
    }

    fn payload_bytes(&self) -> Vec<u8> {
        ActionCodec::to_bytes(&self.action)
    }
}

/// Ordered commit history, oldest first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Commits {
    list: Vec<Commit>,
}

impl Commits {
    /// An empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a history from a list, verifying every link.
    pub fn from_list(list: Vec<Commit>) -> Result<Self> {
        HashChainVerifier::verify_chain(&list)?;
        Ok(Self { list })
    }

    pub fn list(&self) -> &[Commit] {
        &self.list
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// The most recent commit.
    pub fn head(&self) -> Option<&Commit> {
        self.list.last()
    }

    /// Find a commit by its hash.
    pub fn fetch(&self, hash: &Hash) -> Result<&Commit> {
        self.list
            .iter()
            .find(|commit| commit.hash == *hash)
            .ok_or(ReferenceError::CommitNotFound(*hash))
    }

    /// Append a commit whose parent is the current head.
    pub fn push(&mut self, commit: Commit) -> Result<()> {
        let index = self.list.len();
        match (self.head().map(Commit::hash), commit.parent) {
            (None, Some(_)) => return Err(ChainError::GenesisHasParent.into()),
            (Some(_), None) => return Err(ChainError::MissingParent { index }.into()),
            (Some(head), Some(parent)) if head != parent => {
                return Err(ChainError::BrokenLink { index }.into());
            }
            _ => {}
        }
        let computed = HashChainVerifier::compute_hash(&commit.payload_bytes(), commit.parent);
        if commit.hash != computed {
            return Err(ChainError::HashMismatch { index }.into());
        }
        self.list.push(commit);
        Ok(())
    }

    /// Recompute every hash and check every parent link.
    pub fn verify(&self) -> Result<()> {
        HashChainVerifier::verify_chain(&self.list)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content_key::ContentKey;
    use crate::pointer::Pointer;

    fn action(seed: &[u8], from: u64) -> Action {
        let key = ContentKey::new(
            0,
            Hash::from_bytes(seed),
            Pointer::new(from, seed.len() as u64).unwrap(),
        );
        Action::from_parts(vec![key], vec![])
    }

    fn chain(count: usize) -> Commits {
        let mut commits = Commits::new();
        for i in 0..count {
            let parent = commits.head().map(Commit::hash);
            let seed = format!("commit-{i}");
            commits
                .push(Commit::new(action(seed.as_bytes(), i as u64 * 10), parent))
                .unwrap();
        }
        commits
    }

    #[test]
    fn hash_depends_on_parent() {
        let a = Commit::new(action(b"x", 0), None);
        let b = Commit::new(action(b"x", 0), Some(a.hash()));
        assert_ne!(a.hash(), b.hash());
        assert!(a.is_genesis());
        assert!(!b.is_genesis());
    }

    #[test]
    fn push_builds_verified_chain() {
        let commits = chain(5);
        assert_eq!(commits.len(), 5);
        commits.verify().unwrap();
        for pair in commits.list().windows(2) {
            assert_eq!(pair[1].parent(), Some(pair[0].hash()));
        }
    }

    #[test]
    fn push_rejects_wrong_parent() {
        let mut commits = chain(2);
        let stray = Commit::new(action(b"stray", 99), Some(Hash::from_bytes(b"elsewhere")));
        let err = commits.push(stray).unwrap_err();
        assert_eq!(err, ReferenceError::Chain(ChainError::BrokenLink { index: 2 }));
    }

    #[test]
    fn push_rejects_second_genesis() {
        let mut commits = chain(1);
        let err = commits.push(Commit::new(action(b"again", 5), None)).unwrap_err();
        assert_eq!(err, ReferenceError::Chain(ChainError::MissingParent { index: 1 }));
    }

    #[test]
    fn fetch_by_hash() {
        let commits = chain(3);
        let middle = commits.list()[1].hash();
        assert_eq!(commits.fetch(&middle).unwrap().hash(), middle);
        assert!(commits.fetch(&Hash::from_bytes(b"nope")).unwrap_err().is_not_found());
    }

    #[test]
    fn from_list_detects_tampering() {
        let mut list = chain(3).list().to_vec();
        list[1] = Commit::from_parts(action(b"forged", 1), list[1].parent(), list[1].hash());
        let err = Commits::from_list(list).unwrap_err();
        assert_eq!(err, ReferenceError::Chain(ChainError::HashMismatch { index: 1 }));
    }

    #[test]
    fn empty_history_has_no_head() {
        let commits = Commits::new();
        assert!(commits.head().is_none());
        commits.verify().unwrap();
    }
}
