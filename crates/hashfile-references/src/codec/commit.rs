use hashfile_types::HASH_LEN;

use crate::action::Action;
use crate::codec::content::{read_key_list, write_content_key};
use crate::codec::wire::{Reader, Writer};
use crate::codec::Codec;
use crate::commit::{Commit, Commits};
use crate::error::{ReferenceError, Result};

const NO_PARENT: u8 = 0;
const HAS_PARENT: u8 = 1;

/// Smallest possible encoded commit: an empty framed action, the parent flag
/// and the commit hash.
const MIN_COMMIT_LEN: usize = 4 + 8 + 1 + HASH_LEN;

/// Codec for [`Action`]: insert count and keys, then delete count and keys.
#[derive(Clone, Copy, Debug, Default)]
pub struct ActionCodec;

impl ActionCodec {
    /// Canonical action bytes, the payload covered by a commit hash.
    ///
    /// Infallible: an [`Action`] can only be built with counts that fit in a
    /// `u32`.
    pub fn to_bytes(action: &Action) -> Vec<u8> {
        let mut writer = Writer::new();
        for keys in [action.inserts(), action.deletes()] {
            writer.u32(keys.len() as u32);
            for key in keys {
                write_content_key(&mut writer, key);
            }
        }
        writer.into_bytes()
    }
}

impl Codec for ActionCodec {
    type Entity = Action;

    fn encode(&self, action: &Action) -> Result<Vec<u8>> {
        Ok(Self::to_bytes(action))
    }

    fn decode(&self, data: &[u8]) -> Result<Action> {
        let mut reader = Reader::new("action", data);
        let inserts = read_key_list(&mut reader)?;
        let deletes = read_key_list(&mut reader)?;
        reader.finish()?;
        Ok(Action::from_parts(inserts, deletes))
    }
}

/// Codec for a single [`Commit`].
///
/// Decoding recomputes the hash from the action bytes and parent and rejects
/// a commit whose stored hash disagrees.
#[derive(Clone, Copy, Debug, Default)]
pub struct CommitCodec;

impl Codec for CommitCodec {
    type Entity = Commit;

    fn encode(&self, commit: &Commit) -> Result<Vec<u8>> {
        let mut writer = Writer::new();
        writer.framed("commit", &ActionCodec::to_bytes(commit.action()))?;
        match commit.parent() {
            Some(parent) => {
                writer.u8(HAS_PARENT);
                writer.hash(&parent);
            }
            None => writer.u8(NO_PARENT),
        }
        writer.hash(&commit.hash());
        Ok(writer.into_bytes())
    }

    fn decode(&self, data: &[u8]) -> Result<Commit> {
        let mut reader = Reader::new("commit", data);
        let action = ActionCodec.decode(reader.framed()?)?;
        let parent = match reader.u8()? {
            NO_PARENT => None,
            HAS_PARENT => Some(reader.hash()?),
            flag => return Err(reader.error(format!("invalid parent flag {flag}"))),
        };
        let hash = reader.hash()?;
        reader.finish()?;

        let commit = Commit::new(action, parent);
        if commit.hash() != hash {
            return Err(ReferenceError::format(
                "commit",
                format!("stored hash {hash} does not match computed {}", commit.hash()),
            ));
        }
        Ok(commit)
    }
}

/// Codec for a [`Commits`] chain: a count followed by framed commits.
#[derive(Clone, Copy, Debug, Default)]
pub struct CommitsCodec;

impl Codec for CommitsCodec {
    type Entity = Commits;

    fn encode(&self, commits: &Commits) -> Result<Vec<u8>> {
        let mut writer = Writer::new();
        writer.count("commits", commits.len())?;
        for commit in commits.list() {
            writer.framed("commits", &CommitCodec.encode(commit)?)?;
        }
        Ok(writer.into_bytes())
    }

    fn decode(&self, data: &[u8]) -> Result<Commits> {
        let mut reader = Reader::new("commits", data);
        let count = reader.count(4 + MIN_COMMIT_LEN)?;
        let mut list = Vec::with_capacity(count);
        for _ in 0..count {
            list.push(CommitCodec.decode(reader.framed()?)?);
        }
        reader.finish()?;
        Commits::from_list(list).map_err(|err| match err {
            ReferenceError::Chain(chain) => ReferenceError::format("commits", chain.to_string()),
            other => other,
        })
    }
}
