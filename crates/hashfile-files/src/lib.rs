//! Transactional single-file databases.
//!
//! A database is one append-only file: content blobs, then a self-locating
//! [`Reference`](hashfile_references::Reference) blob and a fixed tail that
//! points at it. Every commit appends new content, a new reference and a new
//! tail, so the previous state stays readable until the new tail is durable.
//!
//! # Modules
//!
//! - [`application`]: The [`Application`] trait
//! - [`files`]: [`FileApplication`], the file-backed implementation
//! - [`context`]: Context handles and staged changes
//! - [`config`]: [`FilesConfig`] loaded from TOML
//! - [`tail`]: Tail pointer, reference blob and journal formats
//! - [`hooks`]: The [`OnOpen`] host callback

pub mod application;
pub mod config;
pub mod context;
pub mod error;
pub mod files;
pub mod hooks;
pub mod tail;

pub use application::{Application, VerifyReport};
pub use config::FilesConfig;
pub use context::{ContextId, PendingAction, PendingInsert};
pub use error::{FilesError, Result};
pub use files::FileApplication;
pub use hooks::{NoOpHook, OnOpen};
