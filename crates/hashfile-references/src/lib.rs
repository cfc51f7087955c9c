//! Root state of a hashfile database.
//!
//! A [`Reference`] is what a database file ultimately stores at its tail:
//! the live [`ContentKeys`] index locating every stored blob, the [`Commits`]
//! chain recording how that index came to be, and an optional peer list.
//!
//! # Architecture
//!
//! - **Content keys** pair a caller-defined kind and a content hash with the
//!   [`Pointer`] to the bytes. The `(kind, hash)` pair is unique per index.
//! - **Actions** are the net effect of one transaction: the keys it inserted
//!   and the keys it retired.
//! - **Commits** wrap an action with the hash of the previous commit; the
//!   commit hash covers both, so history cannot be rewritten silently.
//! - **Codecs** turn every entity into a deterministic big-endian byte form
//!   and back.
//!
//! # Modules
//!
//! - [`error`]: Error types for reference operations
//! - [`codec`]: The [`Codec`] trait and one codec per entity
//! - [`builder`]: Validating builders

pub mod action;
pub mod builder;
pub mod codec;
pub mod commit;
pub mod content_key;
pub mod content_keys;
pub mod error;
pub mod peer;
pub mod pointer;
pub mod reference;

pub use action::Action;
pub use builder::{
    ActionBuilder, CommitBuilder, CommitsBuilder, ContentKeyBuilder, ContentKeysBuilder,
    PointerBuilder, ReferenceBuilder,
};
pub use codec::{
    ActionCodec, Codec, CommitCodec, CommitsCodec, ContentKeyCodec, ContentKeysCodec,
    PointerCodec, ReferenceCodec, DEFAULT_SEPARATOR,
};
pub use commit::{Commit, Commits};
pub use content_key::ContentKey;
pub use content_keys::ContentKeys;
pub use error::{ReferenceError, Result};
pub use peer::Peer;
pub use pointer::Pointer;
pub use reference::Reference;
