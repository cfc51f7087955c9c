//! Per-open state of a database.

use std::collections::BTreeSet;
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::PathBuf;

use hashfile_references::{Codec, Peer, Reference, ReferenceCodec};
use hashfile_types::{Hash, Kind};
use tracing::debug;

use crate::error::{FilesError, Result};
use crate::tail::{open_blob, Tail, TAIL_LEN};

/// Opaque handle to an open context.
///
/// Handles come from a per-application counter and are never reused, so a
/// stale handle is always reported as not open.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One staged insert.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingInsert {
    pub kind: Kind,
    pub hash: Hash,
    pub data: Vec<u8>,
}

/// Changes staged in a context since its last commit or cancel.
///
/// A later write of a `(kind, hash)` replaces an earlier staged write. A pair
/// staged for both erase and write is committed as a delete followed by an
/// insert whatever order the calls came in, so it ends up holding the newly
/// written bytes.
#[derive(Clone, Debug, Default)]
pub struct PendingAction {
    inserts: Vec<PendingInsert>,
    deletes: BTreeSet<(Kind, Hash)>,
    peers: Option<Vec<Peer>>,
}

impl PendingAction {
    pub fn stage_insert(&mut self, kind: Kind, hash: Hash, data: Vec<u8>) {
        match self
            .inserts
            .iter_mut()
            .find(|insert| insert.kind == kind && insert.hash == hash)
        {
            Some(existing) => existing.data = data,
            None => self.inserts.push(PendingInsert { kind, hash, data }),
        }
    }

    pub fn stage_delete(&mut self, kind: Kind, hash: Hash) {
        self.deletes.insert((kind, hash));
    }

    /// Replace the peer list with the next commit.
    pub fn stage_peers(&mut self, peers: Vec<Peer>) {
        self.peers = Some(peers);
    }

    /// Staged inserts in staging order.
    pub fn inserts(&self) -> &[PendingInsert] {
        &self.inserts
    }

    /// Staged deletes ordered by `(kind, hash)`.
    pub fn deletes(&self) -> impl Iterator<Item = (Kind, Hash)> + '_ {
        self.deletes.iter().copied()
    }

    pub fn peers(&self) -> Option<&[Peer]> {
        self.peers.as_deref()
    }

    /// Total bytes that the staged inserts will append.
    pub fn insert_bytes(&self) -> u64 {
        self.inserts.iter().map(|insert| insert.data.len() as u64).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.deletes.is_empty() && self.peers.is_none()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// State held for one open database.
pub(crate) struct Context {
    pub(crate) name: String,
    pub(crate) path: PathBuf,
    pub(crate) file: File,
    /// Last committed root state.
    pub(crate) reference: Reference,
    /// Tail that locates `reference` in the file.
    pub(crate) tail: Tail,
    /// Committed file length; the next commit appends here.
    pub(crate) end: u64,
    pub(crate) pending: PendingAction,
    pub(crate) locked: bool,
    pub(crate) poisoned: bool,
}

impl Context {
    /// Read `length` bytes at `offset`, at most `chunk` bytes per read call.
    pub(crate) fn read_range(&self, offset: u64, length: u64, chunk: usize) -> Result<Vec<u8>> {
        read_range(&self.file, offset, length, chunk)
    }

    /// Reload the committed state from disk.
    pub(crate) fn reload(&mut self, codec: &ReferenceCodec, chunk: usize) -> Result<()> {
        let (reference, tail, end) = load(&self.file, codec, chunk)?;
        self.reference = reference;
        self.tail = tail;
        self.end = end;
        Ok(())
    }
}

pub(crate) fn read_range(file: &File, offset: u64, length: u64, chunk: usize) -> Result<Vec<u8>> {
    // Never allocate more than the file can supply.
    let available = file.metadata()?.len().saturating_sub(offset);
    if available < length {
        return Err(FilesError::ShortRead {
            offset,
            expected: length,
            actual: available,
        });
    }
    let expected = usize::try_from(length)
        .map_err(|_| FilesError::Validation(format!("read of {length} bytes is too large")))?;
    let mut buf = vec![0u8; expected];
    let mut reader = file;
    reader.seek(SeekFrom::Start(offset))?;

    let mut filled = 0;
    while filled < expected {
        let want = (expected - filled).min(chunk);
        match reader.read(&mut buf[filled..filled + want]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    if filled < expected {
        return Err(FilesError::ShortRead {
            offset,
            expected: length,
            actual: filled as u64,
        });
    }
    Ok(buf)
}

/// Decode the committed state of a database file.
///
/// Returns the reference, the tail that located it and the file length.
pub(crate) fn load(
    file: &File,
    codec: &ReferenceCodec,
    chunk: usize,
) -> Result<(Reference, Tail, u64)> {
    let file_len = file.metadata()?.len();
    if file_len == 0 {
        return Ok((Reference::empty(), Tail::EMPTY, 0));
    }
    if file_len < TAIL_LEN {
        return Err(FilesError::Format(format!(
            "file of {file_len} bytes is too short for a tail"
        )));
    }

    let raw = read_range(file, file_len - TAIL_LEN, TAIL_LEN, chunk)?;
    let mut bytes = [0u8; TAIL_LEN as usize];
    bytes.copy_from_slice(&raw);
    let tail = Tail::from_bytes(&bytes);
    if tail.is_empty() {
        tail.check_within(0)?;
        return Ok((Reference::empty(), tail, file_len));
    }
    tail.check_within(file_len)?;

    let blob = read_range(file, tail.offset, tail.length, chunk)?;
    let reference = codec.decode(open_blob(&blob)?)?;
    debug!(
        tail_offset = tail.offset,
        tail_length = tail.length,
        file_len,
        "loaded reference"
    );
    Ok((reference, tail, file_len))
}
