// 🗝️ Key-value storage - where the session keeps its identity between runs
//
// A string-to-string map with single-writer semantics. `SqliteStore` lives
// in db.rs next to the rest of the SQL.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use crate::error::Result;

pub trait KeyValueStore {
    /// Read a value. `Ok(None)` when the key is absent.
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    /// Remove a key. Removing an absent key is not an error.
    fn remove(&mut self, key: &str) -> Result<()>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

// ============================================================================
// IN-MEMORY
// ============================================================================

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

// ============================================================================
// JSON FILE
// ============================================================================

/// A JSON object on disk, rewritten in full on every change.
///
/// A missing file reads as an empty map. An unparseable file also reads as
/// empty and is replaced on the next write.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        FileStore { path: path.into() }
    }

    fn load(&self) -> Result<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }

        let content = fs::read_to_string(&self.path)?;
        match serde_json::from_str(&content) {
            Ok(map) => Ok(map),
            Err(e) => {
                tracing::warn!(path = ?self.path, error = %e, "Ignoring unreadable storage file");
                Ok(HashMap::new())
            }
        }
    }

    fn save(&self, entries: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_json::to_string_pretty(entries)?)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load()?.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.load()?;
        entries.insert(key.to_string(), value.to_string());
        self.save(&entries)
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let mut entries = self.load()?;
        if entries.remove(key).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_set_get_remove() {
        let mut store = MemoryStore::new();
        assert_eq!(store.get("user").unwrap(), None);

        store.set("user", "{}").unwrap();
        assert_eq!(store.get("user").unwrap(), Some("{}".to_string()));
        assert_eq!(store.len(), 1);

        store.remove("user").unwrap();
        assert!(store.is_empty());

        // Removing again is fine
        store.remove("user").unwrap();
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let mut store = FileStore::new(&path);
        store.set("user", r#"{"id":1}"#).unwrap();

        let reopened = FileStore::new(&path);
        assert_eq!(reopened.get("user").unwrap(), Some(r#"{"id":1}"#.to_string()));
    }

    #[test]
    fn test_file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("none.json"));
        assert_eq!(store.get("user").unwrap(), None);
    }

    #[test]
    fn test_file_store_corrupt_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "not json at all").unwrap();

        let mut store = FileStore::new(&path);
        assert_eq!(store.get("user").unwrap(), None);

        store.set("user", "x").unwrap();
        assert_eq!(store.get("user").unwrap(), Some("x".to_string()));
    }

    #[test]
    fn test_file_store_remove_absent_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path().join("session.json"));
        store.remove("user").unwrap();
        assert!(!dir.path().join("session.json").exists());
    }
}
