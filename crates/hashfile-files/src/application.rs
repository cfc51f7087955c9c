use hashfile_references::{Commit, Commits, ContentKeys, Peer};
use hashfile_types::{Hash, Kind};

use crate::context::ContextId;
use crate::error::Result;

/// Outcome of [`Application::verify`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// Number of commits checked.
    pub commits: usize,
    /// Number of live content keys checked.
    pub content_keys: usize,
    /// Committed file length.
    pub file_len: u64,
    /// Human-readable description of every problem found.
    pub issues: Vec<String>,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Transactional access to named single-file databases.
///
/// A database is opened into a context. Writes and erases are staged in the
/// context and reach the file only on [`commit`](Application::commit); reads
/// always see the last committed state. Every method taking a [`ContextId`]
/// fails with `NotOpen` for an unknown or closed handle.
pub trait Application {
    /// Returns `true` if a database file called `name` exists.
    fn exists(&self, name: &str) -> Result<bool>;

    /// Create an empty database. Fails with `AlreadyExists`.
    fn create(&mut self, name: &str) -> Result<()>;

    /// Remove a database and its journal files. Fails with `NotFound`, or
    /// `AlreadyOpen` while a context holds it.
    fn delete(&mut self, name: &str) -> Result<()>;

    /// Open a database, taking its advisory lock.
    fn open(&mut self, name: &str) -> Result<ContextId>;

    /// Take the advisory lock again after [`unlock`](Application::unlock).
    /// A no-op while the lock is held.
    fn lock(&mut self, ctx: ContextId) -> Result<()>;

    /// Release the advisory lock without closing the context.
    fn unlock(&mut self, ctx: ContextId) -> Result<()>;

    /// Stage `data` under `(kind, hash)`. The last write for a pair wins.
    fn write(&mut self, ctx: ContextId, kind: Kind, hash: Hash, data: Vec<u8>) -> Result<()>;

    /// Read raw bytes from the database file.
    fn read(&self, ctx: ContextId, offset: u64, length: u64) -> Result<Vec<u8>>;

    /// Read committed content by `(kind, hash)`.
    fn read_by_hash(&self, ctx: ContextId, kind: Kind, hash: &Hash) -> Result<Vec<u8>>;

    /// Committed content keys of one kind. Fails with `NotFound` when none exist.
    fn content_keys_by_kind(&self, ctx: ContextId, kind: Kind) -> Result<ContentKeys>;

    /// The committed history, oldest first.
    fn commits(&self, ctx: ContextId) -> Result<Commits>;

    fn commit_by_hash(&self, ctx: ContextId, hash: &Hash) -> Result<Commit>;

    /// Stage the removal of a committed `(kind, hash)` pair.
    fn erase_by_hash(&mut self, ctx: ContextId, kind: Kind, hash: &Hash) -> Result<()>;

    /// Stage the removal of several pairs of one kind. Nothing is staged
    /// unless every pair exists.
    fn erase_all_by_hashes(&mut self, ctx: ContextId, kind: Kind, hashes: &[Hash]) -> Result<()>;

    /// Make staged changes durable. Returns the new commit hash, or `None`
    /// when no content changed.
    fn commit(&mut self, ctx: ContextId) -> Result<Option<Hash>>;

    /// Discard staged changes.
    fn cancel(&mut self, ctx: ContextId) -> Result<()>;

    /// Release the lock and forget the context.
    fn close(&mut self, ctx: ContextId) -> Result<()>;

    /// Committed peer list, empty when none was ever set.
    fn peers(&self, ctx: ContextId) -> Result<Vec<Peer>>;

    /// Stage a replacement peer list for the next commit.
    fn set_peers(&mut self, ctx: ContextId, peers: Vec<Peer>) -> Result<()>;

    /// Audit the committed state.
    fn verify(&self, ctx: ContextId) -> Result<VerifyReport>;
}
