//! File-backed preference store.

use super::PreferenceStore;
use crate::error::{ConfigError, Result};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Preference store that keeps one file per key inside a directory.
///
/// Writes go to a uniquely named temporary sibling file which is then renamed
/// over the target, so a crash mid-write leaves the previous value intact and
/// concurrent writers never share a temp file.
///
/// # Examples
///
/// ```rust,no_run
/// use server_config::sources::FileStore;
///
/// let store = FileStore::new("/var/lib/my-app/server-config");
/// ```
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the stored values.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
            && !key.starts_with('.');
        if !valid {
            return Err(ConfigError::Persistence(format!(
                "Unsupported store key: {:?}",
                key
            )));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl PreferenceStore for FileStore {
    fn get_string(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ConfigError::Persistence(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn set_string(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir)?;

        // Dropping the temp file on any error below removes it.
        let mut file = tempfile::Builder::new()
            .prefix(&format!(".{}.", key))
            .suffix(".tmp")
            .tempfile_in(&self.dir)?;
        file.write_all(value.as_bytes())?;
        file.as_file().sync_all()?;

        file.persist(&path).map(drop).map_err(|e| {
            ConfigError::Persistence(format!("Failed to replace {}: {}", path.display(), e.error))
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> String {
        format!("file:{}", self.dir.display())
    }
}
