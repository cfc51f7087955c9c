//! Validating builders for every entity.
//!
//! Builders take fields by value, return `self` from each setter and check
//! mandatory fields in `build()`, which reports problems as
//! [`ReferenceError::Validation`].

use std::collections::BTreeSet;

use hashfile_types::{Hash, Kind};

use crate::action::Action;
use crate::commit::{Commit, Commits};
use crate::content_key::ContentKey;
use crate::content_keys::ContentKeys;
use crate::error::{ReferenceError, Result};
use crate::peer::Peer;
use crate::pointer::Pointer;
use crate::reference::Reference;

fn missing(field: &str, entity: &str) -> ReferenceError {
    ReferenceError::Validation(format!("{field} is mandatory to build a {entity}"))
}

/// Builder for [`Pointer`].
#[derive(Debug, Default)]
pub struct PointerBuilder {
    from: Option<u64>,
    length: Option<u64>,
}

impl PointerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from(mut self, from: u64) -> Self {
        self.from = Some(from);
        self
    }

    pub fn length(mut self, length: u64) -> Self {
        self.length = Some(length);
        self
    }

    pub fn build(self) -> Result<Pointer> {
        let from = self.from.ok_or_else(|| missing("from", "Pointer"))?;
        let length = self.length.ok_or_else(|| missing("length", "Pointer"))?;
        Pointer::new(from, length)
    }
}

/// Builder for [`ContentKey`].
#[derive(Debug, Default)]
pub struct ContentKeyBuilder {
    kind: Option<Kind>,
    hash: Option<Hash>,
    pointer: Option<Pointer>,
}

impl ContentKeyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: Kind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn hash(mut self, hash: Hash) -> Self {
        self.hash = Some(hash);
        self
    }

    pub fn pointer(mut self, pointer: Pointer) -> Self {
        self.pointer = Some(pointer);
        self
    }

    pub fn build(self) -> Result<ContentKey> {
        let kind = self.kind.ok_or_else(|| missing("kind", "ContentKey"))?;
        let hash = self.hash.ok_or_else(|| missing("hash", "ContentKey"))?;
        let pointer = self.pointer.ok_or_else(|| missing("pointer", "ContentKey"))?;
        Ok(ContentKey::new(kind, hash, pointer))
    }
}

/// Builder for [`ContentKeys`]; rejects duplicate `(kind, hash)` pairs.
#[derive(Debug, Default)]
pub struct ContentKeysBuilder {
    keys: Vec<ContentKey>,
}

impl ContentKeysBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_list(mut self, keys: Vec<ContentKey>) -> Self {
        self.keys = keys;
        self
    }

    pub fn key(mut self, key: ContentKey) -> Self {
        self.keys.push(key);
        self
    }

    pub fn build(self) -> Result<ContentKeys> {
        ContentKeys::from_list(self.keys)
    }
}

/// Builder for [`Action`].
///
/// At least one insert or delete is required, and neither set may name the
/// same `(kind, hash)` pair twice.
#[derive(Debug, Default)]
pub struct ActionBuilder {
    inserts: Vec<ContentKey>,
    deletes: Vec<ContentKey>,
}

impl ActionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_inserts(mut self, inserts: Vec<ContentKey>) -> Self {
        self.inserts = inserts;
        self
    }

    pub fn with_deletes(mut self, deletes: Vec<ContentKey>) -> Self {
        self.deletes = deletes;
        self
    }

    pub fn insert(mut self, key: ContentKey) -> Self {
        self.inserts.push(key);
        self
    }

    pub fn delete(mut self, key: ContentKey) -> Self {
        self.deletes.push(key);
        self
    }

    pub fn build(self) -> Result<Action> {
        if self.inserts.is_empty() && self.deletes.is_empty() {
            return Err(ReferenceError::Validation(
                "an Action needs at least one insert or delete".into(),
            ));
        }
        check_set("insert", &self.inserts)?;
        check_set("delete", &self.deletes)?;
        Ok(Action::from_parts(self.inserts, self.deletes))
    }
}

fn check_set(name: &str, keys: &[ContentKey]) -> Result<()> {
    if u32::try_from(keys.len()).is_err() {
        return Err(ReferenceError::Validation(format!(
            "{} {name} keys exceed the u32 count limit",
            keys.len()
        )));
    }
    let mut seen = BTreeSet::new();
    for key in keys {
        if !seen.insert(key.id()) {
            return Err(ReferenceError::Validation(format!(
                "{name} set names kind={} hash={} twice",
                key.kind(),
                key.hash()
            )));
        }
    }
    Ok(())
}

/// Builder for [`Commit`]; computes the commit hash.
#[derive(Debug, Default)]
pub struct CommitBuilder {
    action: Option<Action>,
    parent: Option<Hash>,
}

impl CommitBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    pub fn parent(mut self, parent: Hash) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn build(self) -> Result<Commit> {
        let action = self.action.ok_or_else(|| missing("action", "Commit"))?;
        Ok(Commit::new(action, self.parent))
    }
}

/// Builder for [`Commits`]; verifies every chain link.
#[derive(Debug, Default)]
pub struct CommitsBuilder {
    list: Vec<Commit>,
}

impl CommitsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_list(mut self, list: Vec<Commit>) -> Self {
        self.list = list;
        self
    }

    pub fn commit(mut self, commit: Commit) -> Self {
        self.list.push(commit);
        self
    }

    pub fn build(self) -> Result<Commits> {
        Commits::from_list(self.list)
    }
}

/// Builder for [`Reference`].
///
/// Content keys and commits are mandatory; an empty peer list is stored as
/// no peers.
#[derive(Debug, Default)]
pub struct ReferenceBuilder {
    content_keys: Option<ContentKeys>,
    commits: Option<Commits>,
    peers: Option<Vec<Peer>>,
}

impl ReferenceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content_keys(mut self, content_keys: ContentKeys) -> Self {
        self.content_keys = Some(content_keys);
        self
    }

    pub fn commits(mut self, commits: Commits) -> Self {
        self.commits = Some(commits);
        self
    }

    pub fn peers(mut self, peers: Vec<Peer>) -> Self {
        self.peers = Some(peers);
        self
    }

    pub fn build(self) -> Result<Reference> {
        let content_keys = self
            .content_keys
            .ok_or_else(|| missing("content keys", "Reference"))?;
        let commits = self.commits.ok_or_else(|| missing("commits", "Reference"))?;
        Ok(Reference::from_parts(content_keys, commits, self.peers))
    }
}
