use std::collections::HashMap;
use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use hashfile_references::{
    ActionBuilder, Codec, Commit, CommitBuilder, Commits, ContentKey, ContentKeys, Peer, Pointer,
    Reference, ReferenceBuilder, ReferenceCodec,
};
use hashfile_types::{Hash, Kind};
use tracing::{debug, info, warn};

use crate::application::{Application, VerifyReport};
use crate::config::FilesConfig;
use crate::context::{self, Context, ContextId};
use crate::error::{FilesError, Result};
use crate::hooks::{NoOpHook, OnOpen};
use crate::tail::{seal_blob, Journal, Tail, TAIL_LEN};

/// [`Application`] over plain files in one directory.
///
/// Each database is a single file `<dir>/<name>`. While a commit is being
/// written an undo journal lives next to it as `<name>.<backup_extension>`;
/// opening a database with a journal present rolls the interrupted commit
/// back.
pub struct FileApplication {
    config: FilesConfig,
    codec: ReferenceCodec,
    hook: Box<dyn OnOpen>,
    contexts: HashMap<ContextId, Context>,
    next_id: u64,
}

/// A commit computed in memory, ready to be appended.
struct Prepared {
    reference: Reference,
    blob: Vec<u8>,
    tail: Tail,
    start: u64,
    end: u64,
    hash: Option<Hash>,
    inserts: usize,
    deletes: usize,
}

impl FileApplication {
    /// Create an application that accepts every open.
    pub fn new(config: FilesConfig) -> Result<Self> {
        Self::with_hook(config, NoOpHook)
    }

    /// Create an application that consults `hook` before every open.
    pub fn with_hook(config: FilesConfig, hook: impl OnOpen + 'static) -> Result<Self> {
        config.validate()?;
        let codec = ReferenceCodec::new(config.separator)?;
        Ok(Self {
            config,
            codec,
            hook: Box::new(hook),
            contexts: HashMap::new(),
            next_id: 0,
        })
    }

    pub fn config(&self) -> &FilesConfig {
        &self.config
    }

    /// Number of currently open contexts.
    pub fn open_contexts(&self) -> usize {
        self.contexts.len()
    }

    /// Name of the database a context was opened on.
    pub fn name_of(&self, ctx: ContextId) -> Result<&str> {
        Ok(&self.context(ctx)?.name)
    }

    /// Whether a context holds the advisory lock.
    pub fn is_locked(&self, ctx: ContextId) -> Result<bool> {
        Ok(self.context(ctx)?.locked)
    }

    /// Staged changes not yet committed.
    pub fn has_pending(&self, ctx: ContextId) -> Result<bool> {
        Ok(!self.context(ctx)?.pending.is_empty())
    }

    /// Path of the file backing database `name`.
    pub fn database_path(&self, name: &str) -> Result<PathBuf> {
        self.check_name(name)?;
        Ok(self.config.dir_path.join(name))
    }

    fn check_name(&self, name: &str) -> Result<()> {
        let invalid = |reason: &str| -> Result<()> {
            Err(FilesError::Validation(format!(
                "invalid database name {name:?}: {reason}"
            )))
        };
        if name.is_empty() || name == "." || name == ".." {
            return invalid("must be a plain file name");
        }
        if name.contains(['/', '\\', '\0']) {
            return invalid("must not contain path separators");
        }
        for extension in [
            &self.config.destination_extension,
            &self.config.backup_extension,
        ] {
            if name.ends_with(&format!(".{extension}")) {
                return invalid("collides with journal file names");
            }
        }
        Ok(())
    }

    fn is_open(&self, name: &str) -> bool {
        self.contexts.values().any(|context| context.name == name)
    }

    fn context(&self, ctx: ContextId) -> Result<&Context> {
        self.contexts.get(&ctx).ok_or(FilesError::NotOpen(ctx))
    }

    fn context_mut(&mut self, ctx: ContextId) -> Result<&mut Context> {
        self.contexts.get_mut(&ctx).ok_or(FilesError::NotOpen(ctx))
    }
}

impl Application for FileApplication {
    fn exists(&self, name: &str) -> Result<bool> {
        let path = self.database_path(name)?;
        match fs::metadata(&path) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn create(&mut self, name: &str) -> Result<()> {
        let path = self.database_path(name)?;
        fs::create_dir_all(&self.config.dir_path)?;
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(FilesError::AlreadyExists(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        }
        info!(name, path = %path.display(), "created database");
        Ok(())
    }

    fn delete(&mut self, name: &str) -> Result<()> {
        let path = self.database_path(name)?;
        if self.is_open(name) {
            return Err(FilesError::AlreadyOpen(name.to_string()));
        }
        match fs::metadata(&path) {
            Ok(meta) if meta.is_dir() => {
                return Err(FilesError::Validation(format!(
                    "{} is a directory, not a database",
                    path.display()
                )));
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(FilesError::NotFound(format!("database {name}")));
            }
            Err(e) => return Err(e.into()),
        }
        fs::remove_file(&path)?;
        for extension in [
            &self.config.destination_extension,
            &self.config.backup_extension,
        ] {
            remove_if_exists(&sidecar(&self.config, name, extension))?;
        }
        info!(name, "deleted database");
        Ok(())
    }

    fn open(&mut self, name: &str) -> Result<ContextId> {
        let path = self.database_path(name)?;
        if self.is_open(name) {
            return Err(FilesError::AlreadyOpen(name.to_string()));
        }
        self.hook
            .on_open(name)
            .map_err(|reason| FilesError::HookRejected {
                name: name.to_string(),
                reason,
            })?;

        let file = match OpenOptions::new().read(true).write(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(FilesError::NotFound(format!("database {name}")));
            }
            Err(e) => return Err(e.into()),
        };
        try_lock(&file, name)?;
        recover(&self.config, name, &file)?;
        let (reference, tail, end) = context::load(&file, &self.codec, self.config.read_chunk_size)?;

        let id = ContextId::new(self.next_id);
        self.next_id += 1;
        info!(
            name,
            ctx = %id,
            commits = reference.commits().len(),
            content_keys = reference.content_keys().len(),
            file_len = end,
            "opened database"
        );
        self.contexts.insert(
            id,
            Context {
                name: name.to_string(),
                path,
                file,
                reference,
                tail,
                end,
                pending: Default::default(),
                locked: true,
                poisoned: false,
            },
        );
        Ok(id)
    }

    fn lock(&mut self, ctx: ContextId) -> Result<()> {
        let config = &self.config;
        let codec = &self.codec;
        let context = self.contexts.get_mut(&ctx).ok_or(FilesError::NotOpen(ctx))?;
        if context.locked {
            return Ok(());
        }
        try_lock(&context.file, &context.name)?;
        context.locked = true;

        // Another holder may have committed while the lock was released.
        let recovered = recover(config, &context.name, &context.file)?;
        if recovered || context.file.metadata()?.len() != context.end {
            context.reload(codec, config.read_chunk_size)?;
            debug!(ctx = %ctx, name = %context.name, "reloaded committed state");
        }
        debug!(ctx = %ctx, "lock acquired");
        Ok(())
    }

    fn unlock(&mut self, ctx: ContextId) -> Result<()> {
        let context = self.context_mut(ctx)?;
        if context.locked {
            context.file.unlock()?;
            context.locked = false;
            debug!(ctx = %ctx, "lock released");
        }
        Ok(())
    }

    fn write(&mut self, ctx: ContextId, kind: Kind, hash: Hash, data: Vec<u8>) -> Result<()> {
        let context = self.context_mut(ctx)?;
        if data.is_empty() {
            return Err(FilesError::Validation("content must not be empty".into()));
        }
        debug!(ctx = %ctx, kind, hash = %hash.short_hex(), bytes = data.len(), "staged write");
        context.pending.stage_insert(kind, hash, data);
        Ok(())
    }

    fn read(&self, ctx: ContextId, offset: u64, length: u64) -> Result<Vec<u8>> {
        self.context(ctx)?
            .read_range(offset, length, self.config.read_chunk_size)
    }

    fn read_by_hash(&self, ctx: ContextId, kind: Kind, hash: &Hash) -> Result<Vec<u8>> {
        let context = self.context(ctx)?;
        let pointer = context.reference.content_keys().fetch(kind, hash)?.pointer();
        debug!(ctx = %ctx, kind, hash = %hash.short_hex(), from = pointer.from(), "read by hash");
        context.read_range(pointer.from(), pointer.length(), self.config.read_chunk_size)
    }

    fn content_keys_by_kind(&self, ctx: ContextId, kind: Kind) -> Result<ContentKeys> {
        let keys = self.context(ctx)?.reference.content_keys().filter_kind(kind);
        if keys.is_empty() {
            return Err(FilesError::NotFound(format!("content keys of kind {kind}")));
        }
        Ok(keys)
    }

    fn commits(&self, ctx: ContextId) -> Result<Commits> {
        Ok(self.context(ctx)?.reference.commits().clone())
    }

    fn commit_by_hash(&self, ctx: ContextId, hash: &Hash) -> Result<Commit> {
        Ok(self.context(ctx)?.reference.commits().fetch(hash)?.clone())
    }

    fn erase_by_hash(&mut self, ctx: ContextId, kind: Kind, hash: &Hash) -> Result<()> {
        self.erase_all_by_hashes(ctx, kind, std::slice::from_ref(hash))
    }

    fn erase_all_by_hashes(&mut self, ctx: ContextId, kind: Kind, hashes: &[Hash]) -> Result<()> {
        let context = self.context_mut(ctx)?;
        let keys = context.reference.content_keys();
        if let Some(missing) = hashes.iter().find(|hash| !keys.contains(kind, hash)) {
            return Err(FilesError::content_key_not_found(kind, missing));
        }
        for hash in hashes {
            context.pending.stage_delete(kind, *hash);
        }
        debug!(ctx = %ctx, kind, count = hashes.len(), "staged erase");
        Ok(())
    }

    fn commit(&mut self, ctx: ContextId) -> Result<Option<Hash>> {
        let config = &self.config;
        let codec = &self.codec;
        let context = self.contexts.get_mut(&ctx).ok_or(FilesError::NotOpen(ctx))?;
        if context.poisoned {
            return Err(FilesError::Unusable(ctx));
        }
        if context.pending.is_empty() {
            debug!(ctx = %ctx, "nothing to commit");
            return Ok(None);
        }
        if !context.locked {
            return Err(FilesError::NotLocked(ctx));
        }

        debug!(
            ctx = %ctx,
            bytes = context.pending.insert_bytes(),
            "preparing commit"
        );
        let prepared = prepare(context, codec)?;
        if let Err(err) = land(config, context, &prepared) {
            if err.poisons_commit() {
                context.poisoned = true;
            }
            warn!(ctx = %ctx, name = %context.name, error = %err, "commit failed");
            return Err(err);
        }

        let Prepared {
            reference,
            tail,
            end,
            hash,
            inserts,
            deletes,
            ..
        } = prepared;
        context.reference = reference;
        context.tail = tail;
        context.end = end;
        context.pending.clear();
        match hash {
            Some(hash) => info!(
                ctx = %ctx,
                name = %context.name,
                commit = %hash.short_hex(),
                inserts,
                deletes,
                file_len = end,
                "commit landed"
            ),
            None => info!(ctx = %ctx, name = %context.name, "peer list updated"),
        }
        Ok(hash)
    }

    fn cancel(&mut self, ctx: ContextId) -> Result<()> {
        let context = self.context_mut(ctx)?;
        if !context.pending.is_empty() {
            debug!(ctx = %ctx, "discarded staged changes");
        }
        context.pending.clear();
        Ok(())
    }

    fn close(&mut self, ctx: ContextId) -> Result<()> {
        let context = self.contexts.remove(&ctx).ok_or(FilesError::NotOpen(ctx))?;
        if !context.pending.is_empty() {
            debug!(ctx = %ctx, "closing with uncommitted changes");
        }
        if context.locked {
            context.file.unlock()?;
        }
        info!(ctx = %ctx, name = %context.name, path = %context.path.display(), "closed database");
        Ok(())
    }

    fn peers(&self, ctx: ContextId) -> Result<Vec<Peer>> {
        Ok(self
            .context(ctx)?
            .reference
            .peers()
            .map(<[Peer]>::to_vec)
            .unwrap_or_default())
    }

    fn set_peers(&mut self, ctx: ContextId, peers: Vec<Peer>) -> Result<()> {
        let context = self.context_mut(ctx)?;
        debug!(ctx = %ctx, peers = peers.len(), "staged peer list");
        context.pending.stage_peers(peers);
        Ok(())
    }

    fn verify(&self, ctx: ContextId) -> Result<VerifyReport> {
        let context = self.context(ctx)?;
        let reference = &context.reference;
        let mut report = VerifyReport {
            commits: reference.commits().len(),
            content_keys: reference.content_keys().len(),
            file_len: context.end,
            issues: Vec::new(),
        };

        if let Err(err) = reference.commits().verify() {
            report.issues.push(format!("commit chain: {err}"));
        }

        let content_end = if context.tail.is_empty() {
            context.end
        } else {
            context.tail.offset
        };
        let mut pointers: Vec<Pointer> = reference
            .content_keys()
            .list()
            .iter()
            .map(ContentKey::pointer)
            .collect();
        pointers.sort();
        for pointer in &pointers {
            if pointer.end() > content_end {
                report.issues.push(format!(
                    "content at {}..{} extends past the content region ending at {content_end}",
                    pointer.from(),
                    pointer.end()
                ));
            }
        }
        for pair in pointers.windows(2) {
            if pair[0].overlaps(&pair[1]) {
                report.issues.push(format!(
                    "content at {}..{} overlaps {}..{}",
                    pair[0].from(),
                    pair[0].end(),
                    pair[1].from(),
                    pair[1].end()
                ));
            }
        }

        let mut replayed = ContentKeys::new();
        for (index, commit) in reference.commits().list().iter().enumerate() {
            for key in commit.action().deletes() {
                if replayed.erase(key.kind(), &key.hash()).is_err() {
                    report.issues.push(format!(
                        "commit {index} deletes kind={} hash={} which was never inserted",
                        key.kind(),
                        key.hash().short_hex()
                    ));
                }
            }
            for key in commit.action().inserts() {
                replayed.insert(*key);
            }
        }
        if replayed != *reference.content_keys() {
            report
                .issues
                .push("live content keys differ from the replayed commit history".into());
        }

        let disk_len = context.file.metadata()?.len();
        if disk_len != context.end {
            report.issues.push(format!(
                "file is {disk_len} bytes but the committed length is {}",
                context.end
            ));
        }

        debug!(ctx = %ctx, issues = report.issues.len(), "verified database");
        Ok(report)
    }
}

fn sidecar(config: &FilesConfig, name: &str, extension: &str) -> PathBuf {
    config.dir_path.join(format!("{name}.{extension}"))
}

fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn try_lock(file: &File, name: &str) -> Result<()> {
    match file.try_lock() {
        Ok(()) => Ok(()),
        Err(TryLockError::WouldBlock) => Err(FilesError::LockContention(name.to_string())),
        Err(TryLockError::Error(e)) => Err(e.into()),
    }
}

/// Undo an interrupted commit, if its journal is present.
///
/// Returns `true` if the file was rolled back.
fn recover(config: &FilesConfig, name: &str, file: &File) -> Result<bool> {
    if remove_if_exists(&sidecar(config, name, &config.destination_extension))? {
        debug!(name, "discarded unfinished commit journal");
    }

    let journal_path = sidecar(config, name, &config.backup_extension);
    let bytes = match fs::read(&journal_path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    let journal = Journal::from_bytes(&bytes)?;
    let file_len = file.metadata()?.len();
    if file_len < journal.prior_len {
        return Err(FilesError::Format(format!(
            "journal expects at least {} bytes but the file has {file_len}",
            journal.prior_len
        )));
    }
    file.set_len(journal.prior_len)?;
    file.sync_all()?;
    fs::remove_file(&journal_path)?;
    warn!(
        name,
        prior_len = journal.prior_len,
        discarded = file_len - journal.prior_len,
        "rolled back interrupted commit"
    );
    Ok(true)
}

/// Compute the next reference from the committed one and the staged changes.
fn prepare(context: &Context, codec: &ReferenceCodec) -> Result<Prepared> {
    let previous = &context.reference;
    let mut keys = previous.content_keys().clone();

    let mut deleted = Vec::new();
    for (kind, hash) in context.pending.deletes() {
        deleted.push(keys.erase(kind, &hash)?);
    }

    let start = context.end;
    let mut cursor = start;
    let mut inserted = Vec::with_capacity(context.pending.inserts().len());
    for insert in context.pending.inserts() {
        let length = insert.data.len() as u64;
        let key = ContentKey::new(insert.kind, insert.hash, Pointer::new(cursor, length)?);
        if let Some(replaced) = keys.insert(key) {
            deleted.push(replaced);
        }
        inserted.push(key);
        cursor = key.pointer().end();
    }

    let (inserts, deletes) = (inserted.len(), deleted.len());
    let mut commits = previous.commits().clone();
    let hash = if inserted.is_empty() && deleted.is_empty() {
        None
    } else {
        let action = ActionBuilder::new()
            .with_inserts(inserted)
            .with_deletes(deleted)
            .build()?;
        let mut builder = CommitBuilder::new().action(action);
        if let Some(head) = commits.head() {
            builder = builder.parent(head.hash());
        }
        let commit = builder.build()?;
        let hash = commit.hash();
        commits.push(commit)?;
        Some(hash)
    };

    let peers = match context.pending.peers() {
        Some(peers) => peers.to_vec(),
        None => previous.peers().map(<[Peer]>::to_vec).unwrap_or_default(),
    };
    let reference = ReferenceBuilder::new()
        .content_keys(keys)
        .commits(commits)
        .peers(peers)
        .build()?;

    let blob = seal_blob(codec.encode(&reference)?);
    let tail = Tail {
        offset: cursor,
        length: blob.len() as u64,
    };
    let end = cursor + tail.length + TAIL_LEN;
    Ok(Prepared {
        reference,
        blob,
        tail,
        start,
        end,
        hash,
        inserts,
        deletes,
    })
}

/// Journal, append and confirm a prepared commit.
///
/// On failure the file is truncated back to its committed length; if that
/// also fails the context is poisoned and the journal is left for the next
/// open to roll back.
fn land(config: &FilesConfig, context: &mut Context, prepared: &Prepared) -> Result<()> {
    let journal = Journal {
        prior_len: prepared.start,
        prior_tail: context.tail,
    };
    write_journal(config, &context.name, &journal)?;

    let journal_path = sidecar(config, &context.name, &config.backup_extension);
    let result = append(config, context, prepared).and_then(|()| {
        fs::remove_file(&journal_path)?;
        Ok(())
    });
    if result.is_err() {
        let rollback = context
            .file
            .set_len(prepared.start)
            .and_then(|()| context.file.sync_all())
            .map_err(FilesError::from)
            .and_then(|()| remove_if_exists(&journal_path));
        match rollback {
            Ok(_) => warn!(name = %context.name, "rolled back failed commit"),
            Err(err) => {
                context.poisoned = true;
                warn!(name = %context.name, error = %err, "rollback failed; journal kept for next open");
            }
        }
    }
    result
}

fn write_journal(config: &FilesConfig, name: &str, journal: &Journal) -> Result<()> {
    let staging = sidecar(config, name, &config.destination_extension);
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&staging)?;
    file.write_all(&journal.to_bytes())?;
    if config.sync_on_commit {
        file.sync_all()?;
    }
    drop(file);
    fs::rename(&staging, sidecar(config, name, &config.backup_extension))?;
    Ok(())
}

fn append(config: &FilesConfig, context: &Context, prepared: &Prepared) -> Result<()> {
    let mut file = &context.file;
    file.set_len(prepared.start)?;
    file.seek(SeekFrom::Start(prepared.start))?;

    let mut offset = prepared.start;
    for insert in context.pending.inserts() {
        write_fully(&mut file, offset, &insert.data)?;
        offset += insert.data.len() as u64;
    }
    write_fully(&mut file, offset, &prepared.blob)?;
    offset += prepared.blob.len() as u64;
    write_fully(&mut file, offset, &prepared.tail.to_bytes())?;

    if config.sync_on_commit {
        file.sync_all()?;
    }
    let written = file.metadata()?.len();
    if written != prepared.end {
        return Err(FilesError::ShortWrite {
            offset: prepared.start,
            expected: prepared.end - prepared.start,
            actual: written.saturating_sub(prepared.start),
        });
    }
    debug!(
        name = %context.name,
        from = prepared.start,
        to = prepared.end,
        "appended commit"
    );
    Ok(())
}

fn write_fully(writer: &mut impl Write, offset: u64, bytes: &[u8]) -> Result<()> {
    let mut written = 0;
    while written < bytes.len() {
        match writer.write(&bytes[written..]) {
            Ok(0) => {
                return Err(FilesError::ShortWrite {
                    offset,
                    expected: bytes.len() as u64,
                    actual: written as u64,
                });
            }
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
