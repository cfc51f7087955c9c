//! Binary codecs for every persisted entity.
//!
//! Each codec is a pure, stateless (apart from configuration) pair of
//! functions with `decode(encode(x)) == x`. Integers are big-endian and fixed
//! width: kinds are `u32`, offsets and lengths `u64`, counts `u32`, hashes 32
//! raw bytes. Nested variable-size sections carry a `u32` byte length.

mod commit;
mod content;
mod reference;
mod wire;

pub use commit::{ActionCodec, CommitCodec, CommitsCodec};
pub use content::{ContentKeyCodec, ContentKeysCodec, PointerCodec};
pub use reference::{ReferenceCodec, DEFAULT_SEPARATOR, REFERENCE_MAGIC, REFERENCE_VERSION};

use crate::error::Result;

/// Converts an entity to and from its wire form.
pub trait Codec {
    /// The entity this codec handles.
    type Entity;

    /// Serialize an entity.
    fn encode(&self, entity: &Self::Entity) -> Result<Vec<u8>>;

    /// Parse an entity, consuming every byte of `data`.
    fn decode(&self, data: &[u8]) -> Result<Self::Entity>;
}
