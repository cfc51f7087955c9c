use hashfile_types::{Hash, Kind};

use crate::pointer::Pointer;

/// Descriptor of one stored content blob.
///
/// Within a [`ContentKeys`](crate::ContentKeys) index the `(kind, hash)` pair
/// is unique; the same hash may exist once per kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContentKey {
    kind: Kind,
    hash: Hash,
    pointer: Pointer,
}

impl ContentKey {
    /// Create a content key.
    pub fn new(kind: Kind, hash: Hash, pointer: Pointer) -> Self {
        Self {
            kind,
            hash,
            pointer,
        }
    }

    /// The caller-defined kind tag.
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// The content hash.
    pub fn hash(&self) -> Hash {
        self.hash
    }

    /// Where the content lives in the file.
    pub fn pointer(&self) -> Pointer {
        self.pointer
    }

    /// The `(kind, hash)` pair identifying this key in an index.
    pub fn id(&self) -> (Kind, Hash) {
        (self.kind, self.hash)
    }
}
