//! The live content index of a database.
//!
//! [`ContentKeys`] maps every `(kind, hash)` pair to the [`ContentKey`] that
//! locates its bytes, and mirrors the map as a list sorted by `(kind, hash)`
//! so that encoding is deterministic regardless of insertion history.

use std::collections::BTreeMap;

use hashfile_types::{Hash, Kind};

use crate::content_key::ContentKey;
use crate::error::{ReferenceError, Result};

/// Index of live content keys.
///
/// The storage region is an append log: [`ContentKeys::next`] is the end of
/// the furthest stored blob and erased ranges are never reused.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContentKeys {
    map: BTreeMap<(Kind, Hash), ContentKey>,
    list: Vec<ContentKey>,
}

impl ContentKeys {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from a list of keys, rejecting duplicate pairs.
    pub fn from_list(keys: Vec<ContentKey>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for key in keys {
            if map.insert(key.id(), key).is_some() {
                return Err(ReferenceError::Validation(format!(
                    "duplicate content key: kind={}, hash={}",
                    key.kind(),
                    key.hash()
                )));
            }
        }
        let list = map.values().copied().collect();
        Ok(Self { map, list })
    }

    /// All live keys, ordered by `(kind, hash)`.
    pub fn list(&self) -> &[ContentKey] {
        &self.list
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Returns `true` if the index holds no keys.
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// The smallest offset at or after the end of every stored blob.
    pub fn next(&self) -> u64 {
        self.list
            .iter()
            .map(|key| key.pointer().end())
            .max()
            .unwrap_or(0)
    }

    /// Keys of the given kind.
    pub fn list_by_kind(&self, kind: Kind) -> Vec<ContentKey> {
        self.map
            .range((kind, Hash::from_digest([0; 32]))..=(kind, Hash::from_digest([0xff; 32])))
            .map(|(_, key)| *key)
            .collect()
    }

    /// A new index holding only the keys of the given kind.
    pub fn filter_kind(&self, kind: Kind) -> ContentKeys {
        let list = self.list_by_kind(kind);
        let map = list.iter().map(|key| (key.id(), *key)).collect();
        ContentKeys { map, list }
    }

    /// Fetch the key stored under `(kind, hash)`.
    pub fn fetch(&self, kind: Kind, hash: &Hash) -> Result<ContentKey> {
        self.map
            .get(&(kind, *hash))
            .copied()
            .ok_or(ReferenceError::ContentKeyNotFound { kind, hash: *hash })
    }

    /// Every key stored under `hash`, whatever its kind.
    pub fn fetch_any(&self, hash: &Hash) -> Vec<ContentKey> {
        self.list
            .iter()
            .filter(|key| key.hash() == *hash)
            .copied()
            .collect()
    }

    /// Returns `true` if `(kind, hash)` is present.
    pub fn contains(&self, kind: Kind, hash: &Hash) -> bool {
        self.map.contains_key(&(kind, *hash))
    }

    /// Insert or replace a key, returning the key it replaced.
    pub fn insert(&mut self, key: ContentKey) -> Option<ContentKey> {
        let previous = self.map.insert(key.id(), key);
        match self.list.binary_search_by_key(&key.id(), ContentKey::id) {
            Ok(pos) => self.list[pos] = key,
            Err(pos) => self.list.insert(pos, key),
        }
        previous
    }

    /// Remove the key stored under `(kind, hash)` and return it.
    ///
    /// The list mirror is rebuilt from the remaining map.
    pub fn erase(&mut self, kind: Kind, hash: &Hash) -> Result<ContentKey> {
        let removed = self
            .map
            .remove(&(kind, *hash))
            .ok_or(ReferenceError::ContentKeyNotFound { kind, hash: *hash })?;
        self.list = self.map.values().copied().collect();
        Ok(removed)
    }
}
