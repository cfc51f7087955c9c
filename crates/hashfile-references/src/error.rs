//! Error types for reference operations.

use hashfile_crypto::ChainError;
use hashfile_types::{Hash, Kind};
use thiserror::Error;

/// Errors that can occur while building, querying or decoding references.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReferenceError {
    /// Encoded bytes are truncated or inconsistent with their framing.
    #[error("format error in {section}: {reason}")]
    Format {
        section: &'static str,
        reason: String,
    },

    /// A builder or constructor was given invalid or missing fields.
    #[error("validation error: {0}")]
    Validation(String),

    /// No content key exists for the `(kind, hash)` pair.
    #[error("content key not found: kind={kind}, hash={hash}")]
    ContentKeyNotFound { kind: Kind, hash: Hash },

    /// No commit exists with the given hash.
    #[error("commit not found: {0}")]
    CommitNotFound(Hash),

    /// The commit chain failed verification.
    #[error("commit chain error: {0}")]
    Chain(#[from] ChainError),

    /// A peer address is malformed.
    #[error("invalid peer {peer:?}: {reason}")]
    InvalidPeer { peer: String, reason: String },

    /// The separator byte could occur inside the text fields it delimits.
    #[error("invalid separator byte 0x{0:02x}: must be an ASCII control byte")]
    InvalidSeparator(u8),
}

impl ReferenceError {
    /// Check if this error indicates the resource doesn't exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ReferenceError::ContentKeyNotFound { .. } | ReferenceError::CommitNotFound(_)
        )
    }

    pub(crate) fn format(section: &'static str, reason: impl Into<String>) -> Self {
        ReferenceError::Format {
            section,
            reason: reason.into(),
        }
    }
}

/// Convenience type alias for reference operations.
pub type Result<T> = std::result::Result<T, ReferenceError>;
