use std::io;

use hashfile_references::ReferenceError;
use hashfile_types::{Hash, Kind};

use crate::context::ContextId;

/// Errors produced by the file-backed application.
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// `create` was called for a database that already exists.
    #[error("database already exists: {0}")]
    AlreadyExists(String),

    /// A database, content key, commit or kind partition does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Another context already holds the database open.
    #[error("database is already open: {0}")]
    AlreadyOpen(String),

    /// The context handle is unknown or was closed.
    #[error("context {0} is not open")]
    NotOpen(ContextId),

    /// The on-open hook refused the database.
    #[error("open of {name} rejected by hook: {reason}")]
    HookRejected { name: String, reason: String },

    /// The advisory lock is held by someone else.
    #[error("database {0} is locked by another holder")]
    LockContention(String),

    /// The operation needs the advisory lock and the context does not hold it.
    #[error("context {0} does not hold the database lock")]
    NotLocked(ContextId),

    /// The file ended before the requested range.
    #[error("short read at offset {offset}: expected {expected} bytes, got {actual}")]
    ShortRead {
        offset: u64,
        expected: u64,
        actual: u64,
    },

    /// Fewer bytes reached the file than were handed to it.
    #[error("short write at offset {offset}: expected {expected} bytes, wrote {actual}")]
    ShortWrite {
        offset: u64,
        expected: u64,
        actual: u64,
    },

    /// On-disk bytes are corrupt or inconsistent.
    #[error("format error: {0}")]
    Format(String),

    /// Caller input was rejected.
    #[error("validation error: {0}")]
    Validation(String),

    /// An earlier commit failed midway; close and reopen the context.
    #[error("context {0} is unusable after a failed commit")]
    Unusable(ContextId),

    /// I/O error from the underlying file.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Configuration could not be loaded or is invalid.
    #[error("config error: {0}")]
    Config(String),
}

impl FilesError {
    /// Check if this error indicates the resource doesn't exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, FilesError::NotFound(_))
    }

    /// Check if the same call may succeed later without intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FilesError::AlreadyOpen(_) | FilesError::LockContention(_)
        )
    }

    /// Whether this failure leaves a commit in an unknown state.
    pub(crate) fn poisons_commit(&self) -> bool {
        matches!(
            self,
            FilesError::ShortRead { .. } | FilesError::ShortWrite { .. } | FilesError::Format(_)
        )
    }

    pub(crate) fn content_key_not_found(kind: Kind, hash: &Hash) -> Self {
        FilesError::NotFound(format!("content key kind={kind}, hash={hash}"))
    }
}

impl From<ReferenceError> for FilesError {
    fn from(err: ReferenceError) -> Self {
        match err {
            ReferenceError::ContentKeyNotFound { kind, hash } => {
                FilesError::content_key_not_found(kind, &hash)
            }
            ReferenceError::CommitNotFound(hash) => FilesError::NotFound(format!("commit {hash}")),
            ReferenceError::Format { .. } | ReferenceError::Chain(_) => {
                FilesError::Format(err.to_string())
            }
            ReferenceError::Validation(_)
            | ReferenceError::InvalidPeer { .. }
            | ReferenceError::InvalidSeparator(_) => FilesError::Validation(err.to_string()),
        }
    }
}

/// Convenience alias used throughout the files crate.
pub type Result<T> = std::result::Result<T, FilesError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifiers() {
        assert!(FilesError::NotFound("db".into()).is_not_found());
        assert!(FilesError::LockContention("db".into()).is_retryable());
        assert!(!FilesError::Format("bad".into()).is_retryable());
        assert!(FilesError::Format("bad".into()).poisons_commit());
        assert!(!FilesError::Validation("bad".into()).poisons_commit());
    }

    #[test]
    fn reference_errors_map_by_category() {
        let hash = Hash::from_bytes(b"x");
        let err: FilesError = ReferenceError::CommitNotFound(hash).into();
        assert!(err.is_not_found());
        let err: FilesError = ReferenceError::InvalidSeparator(b'a').into();
        assert!(matches!(err, FilesError::Validation(_)));
        let err: FilesError = ReferenceError::Format {
            section: "reference",
            reason: "truncated".into(),
        }
        .into();
        assert!(matches!(err, FilesError::Format(_)));
    }
}
