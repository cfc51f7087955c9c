//! Peer address validation.
//!
//! A peer is a URL-like address of the form `scheme://authority[/path]`:
//! - The scheme starts with an ASCII letter and continues with letters,
//!   digits, `+`, `-` or `.`
//! - The authority (everything up to the first `/` after `://`) is non-empty
//! - No character anywhere may be a control character or whitespace
//!
//! Forbidding control characters keeps every valid peer free of the
//! separator byte used by the reference codec.

use std::fmt;
use std::str::FromStr;

use crate::error::{ReferenceError, Result};

/// A validated peer address.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Peer(String);

impl Peer {
    /// Validate and wrap a peer address.
    ///
    /// ```
    /// use hashfile_references::Peer;
    ///
    /// assert!(Peer::new("https://node-a.example:8443").is_ok());
    /// assert!(Peer::new("file:///var/lib/hashfile").is_err());
    /// assert!(Peer::new("no-scheme").is_err());
    /// ```
    pub fn new(address: impl Into<String>) -> Result<Self> {
        let address = address.into();
        if let Err(reason) = validate(&address) {
            return Err(ReferenceError::InvalidPeer {
                peer: address,
                reason,
            });
        }
        Ok(Self(address))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part before `://`.
    pub fn scheme(&self) -> &str {
        self.0.split_once("://").map_or("", |(scheme, _)| scheme)
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

fn validate(address: &str) -> std::result::Result<(), String> {
    if address.is_empty() {
        return Err("peer address must not be empty".into());
    }
    if let Some(ch) = address.chars().find(|ch| ch.is_control() || ch.is_whitespace()) {
        return Err(format!("contains forbidden character: {ch:?}"));
    }

    let (scheme, rest) = address
        .split_once("://")
        .ok_or_else(|| "missing '://' after scheme".to_string())?;

    let mut chars = scheme.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return Err("scheme must start with an ASCII letter".into()),
    }
    if !chars.all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '+' | '-' | '.')) {
        return Err(format!("invalid scheme: {scheme:?}"));
    }

    let authority = rest.split('/').next().unwrap_or("");
    if authority.is_empty() {
        return Err("authority must not be empty".into());
    }
    Ok(())
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Peer {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl AsRef<str> for Peer {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
