use crate::commit::Commits;
use crate::content_keys::ContentKeys;
use crate::peer::Peer;

/// Root state of a database: the live content index, the full commit
/// history and the optional peer list.
///
/// One reference is persisted per commit at the tail of the file; the newest
/// one supersedes all earlier ones.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Reference {
    content_keys: ContentKeys,
    commits: Commits,
    peers: Option<Vec<Peer>>,
}

impl Reference {
    /// The state of a freshly created database.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Assemble a reference; an empty peer list becomes `None`.
    pub(crate) fn from_parts(
        content_keys: ContentKeys,
        commits: Commits,
        peers: Option<Vec<Peer>>,
    ) -> Self {
        Self {
            content_keys,
            commits,
            peers: peers.filter(|peers| !peers.is_empty()),
        }
    }

    pub fn content_keys(&self) -> &ContentKeys {
        &self.content_keys
    }

    pub fn commits(&self) -> &Commits {
        &self.commits
    }

    pub fn has_peers(&self) -> bool {
        self.peers.is_some()
    }

    pub fn peers(&self) -> Option<&[Peer]> {
        self.peers.as_deref()
    }

    /// Returns `true` if nothing has ever been committed.
    pub fn is_empty(&self) -> bool {
        self.content_keys.is_empty() && self.commits.is_empty() && self.peers.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_peers_normalize_to_none() {
        let reference = Reference::from_parts(ContentKeys::new(), Commits::new(), Some(vec![]));
        assert!(!reference.has_peers());
        assert!(reference.peers().is_none());
        assert_eq!(reference, Reference::empty());
        assert!(reference.is_empty());
    }

    #[test]
    fn peers_are_kept() {
        let peers = vec![Peer::new("tcp://a:1").unwrap()];
        let reference =
            Reference::from_parts(ContentKeys::new(), Commits::new(), Some(peers.clone()));
        assert!(reference.has_peers());
        assert_eq!(reference.peers(), Some(peers.as_slice()));
        assert!(!reference.is_empty());
    }
}
