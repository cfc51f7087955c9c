use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use hashfile_files::tail::{Journal, Tail, TAIL_LEN};
use hashfile_files::{Application, ContextId, FileApplication, FilesConfig, FilesError};
use hashfile_references::Peer;
use hashfile_types::{Hash, Kind};
use proptest::prelude::*;

const DOCS: Kind = 1;
const IMAGES: Kind = 2;

fn app(dir: &Path) -> FileApplication {
    FileApplication::new(FilesConfig::with_dir(dir)).unwrap()
}

fn put(app: &mut FileApplication, ctx: ContextId, kind: Kind, data: &[u8]) -> Hash {
    let hash = Hash::from_bytes(data);
    app.write(ctx, kind, hash, data.to_vec()).unwrap();
    hash
}

#[test]
fn new_database_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app(dir.path());
    assert!(!app.exists("db").unwrap());
    app.create("db").unwrap();
    assert!(app.exists("db").unwrap());
    assert!(matches!(app.create("db"), Err(FilesError::AlreadyExists(_))));

    let ctx = app.open("db").unwrap();
    assert!(app.commits(ctx).unwrap().is_empty());
    for kind in [0, DOCS, u32::MAX] {
        assert!(app.content_keys_by_kind(ctx, kind).unwrap_err().is_not_found());
    }
    assert!(app.peers(ctx).unwrap().is_empty());
    assert!(app.verify(ctx).unwrap().is_ok());
}

#[test]
fn open_missing_database_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app(dir.path());
    assert!(app.open("nope").unwrap_err().is_not_found());
    assert!(app.delete("nope").unwrap_err().is_not_found());
}

#[test]
fn write_commit_read() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app(dir.path());
    app.create("db").unwrap();
    let ctx = app.open("db").unwrap();

    let hash = put(&mut app, ctx, DOCS, b"hello world");
    // Staged content is not visible before commit.
    assert!(app.read_by_hash(ctx, DOCS, &hash).unwrap_err().is_not_found());

    let commit = app.commit(ctx).unwrap().expect("commit hash");
    assert_eq!(app.read_by_hash(ctx, DOCS, &hash).unwrap(), b"hello world");

    let commits = app.commits(ctx).unwrap();
    assert_eq!(commits.len(), 1);
    assert_eq!(commits.head().unwrap().hash(), commit);
    assert!(commits.head().unwrap().parent().is_none());

    let fetched = app.commit_by_hash(ctx, &commit).unwrap();
    assert_eq!(fetched.action().inserts().len(), 1);
    assert_eq!(fetched.action().inserts()[0].hash(), hash);
    assert!(app
        .commit_by_hash(ctx, &Hash::from_bytes(b"unknown"))
        .unwrap_err()
        .is_not_found());

    let keys = app.content_keys_by_kind(ctx, DOCS).unwrap();
    let pointer = keys.fetch(DOCS, &hash).unwrap().pointer();
    assert_eq!(app.read(ctx, pointer.from(), pointer.length()).unwrap(), b"hello world");
}

#[test]
fn empty_write_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app(dir.path());
    app.create("db").unwrap();
    let ctx = app.open("db").unwrap();
    let err = app.write(ctx, DOCS, Hash::from_bytes(b""), Vec::new()).unwrap_err();
    assert!(matches!(err, FilesError::Validation(_)));
}

#[test]
fn empty_commit_is_noop() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app(dir.path());
    app.create("db").unwrap();
    let ctx = app.open("db").unwrap();
    assert_eq!(app.commit(ctx).unwrap(), None);
    assert_eq!(fs::metadata(dir.path().join("db")).unwrap().len(), 0);
}

#[test]
fn erase_then_rewrite() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app(dir.path());
    app.create("db").unwrap();
    let ctx = app.open("db").unwrap();

    let hash = put(&mut app, ctx, DOCS, b"document");
    app.commit(ctx).unwrap();

    app.erase_by_hash(ctx, DOCS, &hash).unwrap();
    let erase_commit = app.commit(ctx).unwrap().unwrap();
    assert!(app.read_by_hash(ctx, DOCS, &hash).unwrap_err().is_not_found());
    let action = app.commit_by_hash(ctx, &erase_commit).unwrap().action().clone();
    assert!(!action.has_inserts());
    assert_eq!(action.deletes()[0].hash(), hash);

    put(&mut app, ctx, DOCS, b"document");
    app.commit(ctx).unwrap();
    assert_eq!(app.read_by_hash(ctx, DOCS, &hash).unwrap(), b"document");
    assert_eq!(app.commits(ctx).unwrap().len(), 3);
}

#[test]
fn erase_missing_pair_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app(dir.path());
    app.create("db").unwrap();
    let ctx = app.open("db").unwrap();
    let present = put(&mut app, ctx, DOCS, b"present");
    app.commit(ctx).unwrap();

    let missing = Hash::from_bytes(b"missing");
    assert!(app.erase_by_hash(ctx, DOCS, &missing).unwrap_err().is_not_found());
    assert!(app.erase_by_hash(ctx, IMAGES, &present).unwrap_err().is_not_found());

    // Nothing is staged when any hash is missing.
    assert!(app
        .erase_all_by_hashes(ctx, DOCS, &[present, missing])
        .unwrap_err()
        .is_not_found());
    assert!(!app.has_pending(ctx).unwrap());

    app.erase_all_by_hashes(ctx, DOCS, &[present]).unwrap();
    assert!(app.has_pending(ctx).unwrap());
}

#[test]
fn same_hash_under_two_kinds() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app(dir.path());
    app.create("db").unwrap();
    let ctx = app.open("db").unwrap();

    let hash = Hash::from_bytes(b"shared");
    app.write(ctx, DOCS, hash, b"as a document".to_vec()).unwrap();
    app.write(ctx, IMAGES, hash, b"as an image".to_vec()).unwrap();
    app.commit(ctx).unwrap();

    assert_eq!(app.read_by_hash(ctx, DOCS, &hash).unwrap(), b"as a document");
    assert_eq!(app.read_by_hash(ctx, IMAGES, &hash).unwrap(), b"as an image");

    app.erase_by_hash(ctx, DOCS, &hash).unwrap();
    app.commit(ctx).unwrap();
    assert!(app.read_by_hash(ctx, DOCS, &hash).unwrap_err().is_not_found());
    assert_eq!(app.read_by_hash(ctx, IMAGES, &hash).unwrap(), b"as an image");
}

#[test]
fn erase_and_write_same_pair_replaces_content() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app(dir.path());
    app.create("db").unwrap();
    let ctx = app.open("db").unwrap();
    let hash = Hash::from_bytes(b"slot");
    app.write(ctx, DOCS, hash, b"old".to_vec()).unwrap();
    app.commit(ctx).unwrap();

    app.erase_by_hash(ctx, DOCS, &hash).unwrap();
    app.write(ctx, DOCS, hash, b"new".to_vec()).unwrap();
    let commit = app.commit(ctx).unwrap().unwrap();

    assert_eq!(app.read_by_hash(ctx, DOCS, &hash).unwrap(), b"new");
    let action = app.commit_by_hash(ctx, &commit).unwrap().action().clone();
    assert_eq!(action.inserts().len(), 1);
    assert_eq!(action.deletes().len(), 1);
    assert!(app.verify(ctx).unwrap().is_ok());
}

#[test]
fn write_then_erase_same_pair_keeps_new_content() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app(dir.path());
    app.create("db").unwrap();
    let ctx = app.open("db").unwrap();
    let hash = Hash::from_bytes(b"slot");
    app.write(ctx, DOCS, hash, b"old".to_vec()).unwrap();
    app.commit(ctx).unwrap();

    app.write(ctx, DOCS, hash, b"new".to_vec()).unwrap();
    app.erase_by_hash(ctx, DOCS, &hash).unwrap();
    let commit = app.commit(ctx).unwrap().unwrap();

    assert_eq!(app.read_by_hash(ctx, DOCS, &hash).unwrap(), b"new");
    let action = app.commit_by_hash(ctx, &commit).unwrap().action().clone();
    assert_eq!(action.inserts().len(), 1);
    assert_eq!(action.deletes().len(), 1);
    assert!(app.verify(ctx).unwrap().is_ok());

    app.close(ctx).unwrap();
    let ctx = app.open("db").unwrap();
    assert_eq!(app.read_by_hash(ctx, DOCS, &hash).unwrap(), b"new");
}

#[test]
fn reopen_reproduces_state() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app(dir.path());
    app.create("db").unwrap();
    let ctx = app.open("db").unwrap();

    let mut hashes = Vec::new();
    for i in 0..5 {
        hashes.push(put(&mut app, ctx, DOCS, format!("entry {i}").as_bytes()));
        app.commit(ctx).unwrap();
    }
    app.erase_by_hash(ctx, DOCS, &hashes[2]).unwrap();
    app.commit(ctx).unwrap();

    let keys = app.content_keys_by_kind(ctx, DOCS).unwrap();
    let commits = app.commits(ctx).unwrap();
    app.close(ctx).unwrap();
    assert!(matches!(app.close(ctx), Err(FilesError::NotOpen(_))));

    let ctx = app.open("db").unwrap();
    assert_eq!(app.content_keys_by_kind(ctx, DOCS).unwrap(), keys);
    assert_eq!(app.commits(ctx).unwrap(), commits);
    assert_eq!(app.read_by_hash(ctx, DOCS, &hashes[4]).unwrap(), b"entry 4");
    assert!(app.verify(ctx).unwrap().is_ok());
}

#[test]
fn chain_links_every_commit_to_its_parent() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app(dir.path());
    app.create("db").unwrap();
    let ctx = app.open("db").unwrap();
    for i in 0..4u8 {
        put(&mut app, ctx, DOCS, &[i; 8]);
        app.commit(ctx).unwrap();
    }
    let commits = app.commits(ctx).unwrap();
    commits.verify().unwrap();
    for pair in commits.list().windows(2) {
        assert_eq!(pair[1].parent(), Some(pair[0].hash()));
    }
}

#[test]
fn cancel_discards_staged_changes() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app(dir.path());
    app.create("db").unwrap();
    let ctx = app.open("db").unwrap();
    let kept = put(&mut app, ctx, DOCS, b"kept");
    app.commit(ctx).unwrap();
    let len_before = fs::metadata(dir.path().join("db")).unwrap().len();

    let dropped = put(&mut app, ctx, DOCS, b"dropped");
    app.erase_by_hash(ctx, DOCS, &kept).unwrap();
    app.cancel(ctx).unwrap();
    assert_eq!(app.commit(ctx).unwrap(), None);
    app.close(ctx).unwrap();

    assert_eq!(fs::metadata(dir.path().join("db")).unwrap().len(), len_before);
    let ctx = app.open("db").unwrap();
    assert_eq!(app.read_by_hash(ctx, DOCS, &kept).unwrap(), b"kept");
    assert!(app.read_by_hash(ctx, DOCS, &dropped).unwrap_err().is_not_found());
    assert_eq!(app.commits(ctx).unwrap().len(), 1);
}

#[test]
fn double_open_in_one_application_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app(dir.path());
    app.create("db").unwrap();
    let ctx = app.open("db").unwrap();
    assert_eq!(app.name_of(ctx).unwrap(), "db");
    assert!(matches!(app.open("db"), Err(FilesError::AlreadyOpen(_))));
    assert!(matches!(app.delete("db"), Err(FilesError::AlreadyOpen(_))));
    assert_eq!(app.open_contexts(), 1);
    app.close(ctx).unwrap();
    assert_eq!(app.open_contexts(), 0);
    assert!(matches!(app.name_of(ctx), Err(FilesError::NotOpen(_))));

    // Handles are never reused.
    let again = app.open("db").unwrap();
    assert_ne!(again, ctx);
    assert!(matches!(app.commits(ctx), Err(FilesError::NotOpen(_))));
}

#[test]
fn lock_contention_between_applications() {
    let dir = tempfile::tempdir().unwrap();
    let mut first = app(dir.path());
    let mut second = app(dir.path());
    first.create("db").unwrap();

    let ctx = first.open("db").unwrap();
    let err = second.open("db").unwrap_err();
    assert!(matches!(err, FilesError::LockContention(_)));
    assert!(err.is_retryable());

    first.unlock(ctx).unwrap();
    assert!(!first.is_locked(ctx).unwrap());
    put(&mut first, ctx, DOCS, b"needs the lock");
    assert!(matches!(first.commit(ctx), Err(FilesError::NotLocked(_))));

    let other = second.open("db").unwrap();
    assert!(matches!(first.lock(ctx), Err(FilesError::LockContention(_))));
    second.close(other).unwrap();

    first.lock(ctx).unwrap();
    first.lock(ctx).unwrap();
    assert!(first.commit(ctx).unwrap().is_some());
}

#[test]
fn relock_sees_commits_made_meanwhile() {
    let dir = tempfile::tempdir().unwrap();
    let mut first = app(dir.path());
    let mut second = app(dir.path());
    first.create("db").unwrap();

    let ctx = first.open("db").unwrap();
    first.unlock(ctx).unwrap();

    let other = second.open("db").unwrap();
    let hash = put(&mut second, other, IMAGES, b"from the second writer");
    second.commit(other).unwrap();
    second.close(other).unwrap();

    first.lock(ctx).unwrap();
    assert_eq!(
        first.read_by_hash(ctx, IMAGES, &hash).unwrap(),
        b"from the second writer"
    );
    put(&mut first, ctx, DOCS, b"after");
    first.commit(ctx).unwrap();
    assert_eq!(first.commits(ctx).unwrap().len(), 2);
    assert!(first.verify(ctx).unwrap().is_ok());
}

#[test]
fn hook_can_reject_open() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = FileApplication::with_hook(FilesConfig::with_dir(dir.path()), |name: &str| {
        if name == "forbidden" {
            Err("not today".to_string())
        } else {
            Ok(())
        }
    })
    .unwrap();
    app.create("forbidden").unwrap();
    app.create("allowed").unwrap();
    assert!(matches!(
        app.open("forbidden"),
        Err(FilesError::HookRejected { reason, .. }) if reason == "not today"
    ));
    app.open("allowed").unwrap();
}

#[test]
fn peers_land_with_commit() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app(dir.path());
    app.create("db").unwrap();
    let ctx = app.open("db").unwrap();

    let peers = vec![
        Peer::new("tcp://a.example:7000").unwrap(),
        Peer::new("https://b.example").unwrap(),
    ];
    app.set_peers(ctx, peers.clone()).unwrap();
    assert!(app.peers(ctx).unwrap().is_empty());
    // A peer-only change persists without adding history.
    assert_eq!(app.commit(ctx).unwrap(), None);
    assert_eq!(app.peers(ctx).unwrap(), peers);
    assert!(app.commits(ctx).unwrap().is_empty());

    put(&mut app, ctx, DOCS, b"content");
    app.commit(ctx).unwrap();
    app.close(ctx).unwrap();

    let ctx = app.open("db").unwrap();
    assert_eq!(app.peers(ctx).unwrap(), peers);
    app.set_peers(ctx, Vec::new()).unwrap();
    app.commit(ctx).unwrap();
    assert!(app.peers(ctx).unwrap().is_empty());
}

#[test]
fn interrupted_commit_is_rolled_back_on_open() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app(dir.path());
    app.create("db").unwrap();
    let ctx = app.open("db").unwrap();
    let hash = put(&mut app, ctx, DOCS, b"committed");
    app.commit(ctx).unwrap();
    app.close(ctx).unwrap();

    // Simulate a crash after the journal was confirmed and half the commit
    // was appended.
    let path = dir.path().join("db");
    let prior_len = fs::metadata(&path).unwrap().len();
    let mut tail = [0u8; TAIL_LEN as usize];
    tail.copy_from_slice(&fs::read(&path).unwrap()[prior_len as usize - TAIL_LEN as usize..]);
    let journal = Journal {
        prior_len,
        prior_tail: Tail::from_bytes(&tail),
    };
    fs::write(dir.path().join("db.backup"), journal.to_bytes()).unwrap();
    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(b"torn commit bytes").unwrap();
    drop(file);

    let ctx = app.open("db").unwrap();
    assert_eq!(fs::metadata(&path).unwrap().len(), prior_len);
    assert!(!dir.path().join("db.backup").exists());
    assert_eq!(app.read_by_hash(ctx, DOCS, &hash).unwrap(), b"committed");
    assert!(app.verify(ctx).unwrap().is_ok());
}

#[test]
fn corrupt_tail_is_format_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app(dir.path());
    app.create("db").unwrap();
    let ctx = app.open("db").unwrap();
    put(&mut app, ctx, DOCS, b"content");
    app.commit(ctx).unwrap();
    app.close(ctx).unwrap();

    let path = dir.path().join("db");
    let mut bytes = fs::read(&path).unwrap();
    let len = bytes.len();
    bytes[len - 20] ^= 0xff;
    fs::write(&path, &bytes).unwrap();
    assert!(matches!(app.open("db"), Err(FilesError::Format(_))));
}

#[test]
fn delete_removes_database_and_journals() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app(dir.path());
    app.create("db").unwrap();
    fs::write(dir.path().join("db.backup"), b"stale").unwrap();
    app.delete("db").unwrap();
    assert!(!app.exists("db").unwrap());
    assert!(!dir.path().join("db.backup").exists());
}

#[test]
fn small_read_chunks_read_everything() {
    let dir = tempfile::tempdir().unwrap();
    let config = FilesConfig {
        read_chunk_size: 3,
        sync_on_commit: false,
        ..FilesConfig::with_dir(dir.path())
    };
    let mut app = FileApplication::new(config).unwrap();
    app.create("db").unwrap();
    let ctx = app.open("db").unwrap();
    let data = vec![7u8; 1000];
    let hash = put(&mut app, ctx, DOCS, &data);
    app.commit(ctx).unwrap();
    app.close(ctx).unwrap();

    let ctx = app.open("db").unwrap();
    assert_eq!(app.read_by_hash(ctx, DOCS, &hash).unwrap(), data);
    let len = fs::metadata(dir.path().join("db")).unwrap().len();
    assert!(matches!(
        app.read(ctx, len - 2, 10),
        Err(FilesError::ShortRead { actual: 2, .. })
    ));
}

#[test]
fn huge_read_on_empty_database_is_short_read() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app(dir.path());
    app.create("db").unwrap();
    let ctx = app.open("db").unwrap();
    assert!(matches!(
        app.read(ctx, 0, 1 << 60),
        Err(FilesError::ShortRead { offset: 0, actual: 0, .. })
    ));
    assert!(matches!(
        app.read(ctx, u64::MAX, 1),
        Err(FilesError::ShortRead { actual: 0, .. })
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn insert_commits_never_overlap(batches in proptest::collection::vec(
        proptest::collection::vec((0u32..3, proptest::collection::vec(any::<u8>(), 1..64)), 1..4),
        1..6,
    )) {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        app.create("db").unwrap();
        let ctx = app.open("db").unwrap();

        let mut last_next = 0;
        for batch in batches {
            for (kind, data) in batch {
                put(&mut app, ctx, kind, &data);
            }
            app.commit(ctx).unwrap();

            let mut pointers = Vec::new();
            for kind in 0..3 {
                if let Ok(keys) = app.content_keys_by_kind(ctx, kind) {
                    pointers.extend(keys.list().iter().map(|key| key.pointer()));
                }
            }
            let next = pointers.iter().map(|p| p.end()).max().unwrap_or(0);
            prop_assert!(next >= last_next);
            last_next = next;

            pointers.sort();
            for pair in pointers.windows(2) {
                prop_assert!(!pair[0].overlaps(&pair[1]));
            }
        }
        prop_assert!(app.verify(ctx).unwrap().is_ok());
    }
}
