//! JSON-file implementation of [`LocalCartStore`].
//!
//! One file per key under a base directory, written whole via a
//! temp-file-then-rename so a crash mid-write leaves the previous record
//! intact.

use std::fs;
use std::path::{Path, PathBuf};

use super::{LocalCartStore, PersistedCart};
use crate::error::LocalStoreError;

/// Local durable store backed by JSON files.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Create a store rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns `LocalStoreError::Io` if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, LocalStoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys are dotted identifiers, not paths; strip separators so a
        // hostile key cannot escape the base directory.
        let safe: String = key
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

impl LocalCartStore for JsonFileStore {
    fn save(&self, key: &str, record: &PersistedCart) -> Result<(), LocalStoreError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let payload = serde_json::to_vec_pretty(record)?;
        fs::write(&tmp, payload)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<PersistedCart>, LocalStoreError> {
        let path = self.path_for(key);
        if !Path::exists(&path) {
            return Ok(None);
        }
        let payload = fs::read(&path)?;
        Ok(Some(serde_json::from_slice(&payload)?))
    }
}
