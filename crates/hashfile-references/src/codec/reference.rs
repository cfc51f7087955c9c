use tracing::debug;

use crate::codec::wire::{Reader, Writer};
use crate::codec::{Codec, CommitsCodec, ContentKeysCodec};
use crate::error::{ReferenceError, Result};
use crate::peer::Peer;
use crate::reference::Reference;

/// Leading bytes of every encoded reference.
pub const REFERENCE_MAGIC: &[u8; 4] = b"HFRF";
/// Current reference encoding version.
pub const REFERENCE_VERSION: u8 = 1;
/// ASCII record separator, the default peer delimiter.
pub const DEFAULT_SEPARATOR: u8 = 0x1e;

/// Shortest valid peer (`a://b`) plus its terminating separator.
const MIN_PEER_LEN: usize = 6;

/// Codec for [`Reference`], the record persisted at the file tail.
///
/// Layout: magic, version, framed content keys, framed commits, then a peer
/// count followed by that many separator-terminated UTF-8 peer addresses.
#[derive(Clone, Copy, Debug)]
pub struct ReferenceCodec {
    separator: u8,
}

impl ReferenceCodec {
    /// Create a codec delimiting peers with `separator`.
    ///
    /// The separator must be an ASCII control byte, which no valid [`Peer`]
    /// can contain.
    pub fn new(separator: u8) -> Result<Self> {
        if !separator.is_ascii_control() {
            return Err(ReferenceError::InvalidSeparator(separator));
        }
        Ok(Self { separator })
    }

    pub fn separator(&self) -> u8 {
        self.separator
    }
}

impl Default for ReferenceCodec {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR,
        }
    }
}

impl Codec for ReferenceCodec {
    type Entity = Reference;

    fn encode(&self, reference: &Reference) -> Result<Vec<u8>> {
        let mut writer = Writer::new();
        writer.bytes(REFERENCE_MAGIC);
        writer.u8(REFERENCE_VERSION);
        writer.framed("reference", &ContentKeysCodec.encode(reference.content_keys())?)?;
        writer.framed("reference", &CommitsCodec.encode(reference.commits())?)?;

        let peers = reference.peers().unwrap_or_default();
        writer.count("reference", peers.len())?;
        for peer in peers {
            if peer.as_str().as_bytes().contains(&self.separator) {
                return Err(ReferenceError::InvalidPeer {
                    peer: peer.to_string(),
                    reason: format!("contains separator byte 0x{:02x}", self.separator),
                });
            }
            writer.bytes(peer.as_str().as_bytes());
            writer.u8(self.separator);
        }
        Ok(writer.into_bytes())
    }

    fn decode(&self, data: &[u8]) -> Result<Reference> {
        let mut reader = Reader::new("reference", data);
        let magic = reader.take(REFERENCE_MAGIC.len())?;
        if magic != REFERENCE_MAGIC {
            return Err(reader.error(format!("bad magic {magic:02x?}")));
        }
        let version = reader.u8()?;
        if version != REFERENCE_VERSION {
            return Err(reader.error(format!("unsupported version {version}")));
        }

        let content_keys = ContentKeysCodec.decode(reader.framed()?)?;
        let commits = CommitsCodec.decode(reader.framed()?)?;

        let count = reader.count(MIN_PEER_LEN)?;
        let mut peers = Vec::with_capacity(count);
        for _ in 0..count {
            let raw = reader.until(self.separator)?;
            let text = std::str::from_utf8(raw)
                .map_err(|err| reader.error(format!("peer is not UTF-8: {err}")))?;
            let peer = Peer::new(text).map_err(|err| reader.error(err.to_string()))?;
            peers.push(peer);
        }
        reader.finish()?;

        debug!(
            content_keys = content_keys.len(),
            commits = commits.len(),
            peers = peers.len(),
            bytes = data.len(),
            "decoded reference"
        );
        Ok(Reference::from_parts(content_keys, commits, Some(peers)))
    }
}
