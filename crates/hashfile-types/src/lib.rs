//! Foundation types for hashfile.
//!
//! This crate provides the identifiers shared by every other hashfile crate.
//!
//! # Key Types
//!
//! - [`Hash`]: Content-addressed digest (BLAKE3, 32 bytes)
//! - [`Kind`]: Caller-defined tag partitioning content into namespaces

pub mod error;
pub mod hash;

pub use error::TypeError;
pub use hash::{Hash, HASH_LEN};

/// Caller-defined content kind.
///
/// Kinds partition the content index into independent namespaces that share
/// one hash space: the same [`Hash`] may be stored once per kind.
pub type Kind = u32;
