//! Persisted key-value store
//!
//! The selector never touches process-wide storage directly; it is handed a
//! `KeyValueStore`. Values are opaque strings (JSON text for structured
//! entries).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::config;
use crate::error::StoreError;
use crate::utils::get_config_dir;
use crate::{log_debug, log_warn};

const MODULE: &str = "store";

/// Key-value persistence
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`
    fn load(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key`, replacing any previous value
    fn save(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// In-memory store, used in tests and when no persistence is wanted
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| StoreError::Backend(format!("Store lock error: {}", e)))?;
        Ok(entries.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| StoreError::Backend(format!("Store lock error: {}", e)))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Store backed by a single JSON object file
///
/// Every `save` rewrites the file through a temporary sibling and a rename,
/// so a crash never leaves a truncated store behind.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Store at `<config dir>/<app name>/store.json`
    pub fn open_default() -> Self {
        Self::new(get_config_dir(config::app::NAME).join(config::store::FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log_debug!(MODULE, "Store file {} not found", self.path.display());
                return Ok(BTreeMap::new());
            }
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        Ok(serde_json::from_str(&content)?)
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, serde_json::to_vec_pretty(entries)?)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|e| StoreError::Backend(format!("Store lock error: {}", e)))?;
        Ok(self.read_entries()?.remove(key))
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|e| StoreError::Backend(format!("Store lock error: {}", e)))?;

        // A corrupt store is replaced rather than blocking every save
        let mut entries = self.read_entries().unwrap_or_else(|e| {
            log_warn!(
                MODULE,
                "Discarding unreadable store {}: {}",
                self.path.display(),
                e
            );
            BTreeMap::new()
        });
        entries.insert(key.to_string(), value.to_string());
        self.write_entries(&entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.load("missing").unwrap().is_none());
        store.save("key", "value").unwrap();
        assert_eq!(store.load("key").unwrap().as_deref(), Some("value"));
    }

    #[test]
    fn test_json_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let store = JsonFileStore::new(&path);
        store.save("a", "[\"x\"]").unwrap();
        store.save("b", "true").unwrap();

        let reopened = JsonFileStore::new(&path);
        assert_eq!(reopened.load("a").unwrap().as_deref(), Some("[\"x\"]"));
        assert_eq!(reopened.load("b").unwrap().as_deref(), Some("true"));
        assert!(reopened.load("c").unwrap().is_none());
    }

    #[test]
    fn test_json_file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("store.json"));
        assert!(store.load("anything").unwrap().is_none());
    }

    #[test]
    fn test_json_file_store_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = JsonFileStore::new(&path);
        assert!(matches!(store.load("k"), Err(StoreError::Json(_))));

        // Saving replaces the corrupt contents
        store.save("k", "v").unwrap();
        assert_eq!(store.load("k").unwrap().as_deref(), Some("v"));
    }
}
