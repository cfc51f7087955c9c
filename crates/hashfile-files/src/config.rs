use std::path::{Path, PathBuf};

use hashfile_references::{ReferenceCodec, DEFAULT_SEPARATOR};
use serde::{Deserialize, Serialize};

use crate::error::{FilesError, Result};

/// Configuration for [`FileApplication`](crate::FileApplication).
///
/// Every field has a default, so a TOML file only needs the keys it changes:
///
/// ```toml
/// dir_path = "/var/lib/hashfile"
/// read_chunk_size = 65536
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    /// Directory holding every database file.
    pub dir_path: PathBuf,
    /// Extension of the commit journal while it is being written.
    pub destination_extension: String,
    /// Extension of the commit journal once it is durable.
    pub backup_extension: String,
    /// Largest single read issued against a database file.
    pub read_chunk_size: usize,
    /// Byte terminating each peer address in an encoded reference.
    pub separator: u8,
    /// `fsync` the journal and the database during every commit.
    pub sync_on_commit: bool,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            dir_path: PathBuf::from("./hashfile-data"),
            destination_extension: "destination".into(),
            backup_extension: "backup".into(),
            read_chunk_size: 1024 * 1024, // 1 MiB
            separator: DEFAULT_SEPARATOR,
            sync_on_commit: true,
        }
    }
}

impl FilesConfig {
    /// Default settings rooted at `dir_path`.
    pub fn with_dir(dir_path: impl Into<PathBuf>) -> Self {
        Self {
            dir_path: dir_path.into(),
            ..Self::default()
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source).map_err(|e| FilesError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| FilesError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| FilesError::Config(e.to_string()))
    }

    /// Reject settings the application cannot run with.
    pub fn validate(&self) -> Result<()> {
        for (field, extension) in [
            ("destination_extension", &self.destination_extension),
            ("backup_extension", &self.backup_extension),
        ] {
            if extension.is_empty() {
                return Err(FilesError::Config(format!("{field} must not be empty")));
            }
            if extension.contains(['/', '\\', '.']) {
                return Err(FilesError::Config(format!(
                    "{field} must be a bare extension, got {extension:?}"
                )));
            }
        }
        if self.destination_extension == self.backup_extension {
            return Err(FilesError::Config(
                "destination_extension and backup_extension must differ".into(),
            ));
        }
        if self.read_chunk_size == 0 {
            return Err(FilesError::Config("read_chunk_size must be positive".into()));
        }
        ReferenceCodec::new(self.separator).map_err(|e| FilesError::Config(e.to_string()))?;
        Ok(())
    }
}
