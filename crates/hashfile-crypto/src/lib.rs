//! Cryptographic primitives for hashfile.
//!
//! Provides domain-separated BLAKE3 hashing and hash chain verification for
//! the commit history. All crypto operations wrap `blake3`; there is no custom
//! cryptography.

pub mod chain;
pub mod hasher;

pub use chain::{ChainError, ChainLink, HashChainVerifier};
pub use hasher::ContentHasher;
