//! String key-value backends.
//!
//! The host supplies a flat string-to-string store, such as browser local
//! storage. [`MemoryStore`] models it in memory, including a
//! byte quota; [`FileStore`] keeps one JSON file per key in a directory.

use crate::store::StoreError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A flat string key-value store with last-write-wins semantics per key.
pub trait KeyValueStore {
    /// Read a value. Returns `None` if the key doesn't exist.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a value, replacing any previous one.
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove a value. Removing a missing key is not an error.
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

/// In-memory store with an optional quota on the total stored bytes.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that refuses writes once keys plus values exceed `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            quota: Some(bytes),
        }
    }

    /// Every stored key and raw value.
    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    pub fn set_quota(&mut self, quota: Option<usize>) {
        self.quota = quota;
    }

    /// Bytes currently used by keys and values.
    pub fn used_bytes(&self) -> usize {
        self.entries.iter().map(|(k, v)| k.len() + v.len()).sum()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        if let Some(quota) = self.quota {
            let existing = self.entries.get(key).map_or(0, |v| key.len() + v.len());
            let needed = self.used_bytes() - existing + key.len() + value.len();
            if needed > quota {
                return Err(StoreError::QuotaExceeded {
                    key: key.to_owned(),
                    needed,
                    quota,
                });
            }
        }
        self.entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Directory-backed store: key `k` lives in `<root>/k.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `path`, creating the directory if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_to_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        if key.is_empty()
            || key.contains('/')
            || key.contains('\\')
            || key.starts_with('.')
            || key.contains('\0')
        {
            return Err(StoreError::InvalidKey(key.to_owned()));
        }
        Ok(self.root.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.key_to_path(key)?;
        debug!(path = %path.display(), "reading key");
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.key_to_path(key)?;
        debug!(path = %path.display(), bytes = value.len(), "writing key");
        // Write to a sibling temp file and rename so readers never see a
        // half-written value.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        let path = self.key_to_path(key)?;
        debug!(path = %path.display(), "removing key");
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_set_get_remove() {
        let mut kv = MemoryStore::new();
        assert!(kv.get("a").unwrap().is_none());
        kv.set("a", "1").unwrap();
        assert_eq!(kv.get("a").unwrap().as_deref(), Some("1"));
        kv.remove("a").unwrap();
        kv.remove("a").unwrap();
        assert!(kv.is_empty());
    }

    #[test]
    fn memory_quota_rejects_oversized_write() {
        let mut kv = MemoryStore::with_quota(10);
        kv.set("k", "12345").unwrap();
        let err = kv.set("other", "123456789").unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded { .. }));
        assert_eq!(kv.len(), 1);
    }

    #[test]
    fn memory_quota_counts_replacement_once() {
        let mut kv = MemoryStore::with_quota(10);
        kv.set("k", "123456789").unwrap();
        kv.set("k", "987654321").unwrap();
        assert_eq!(kv.used_bytes(), 10);
    }

    #[test]
    fn file_store_roundtrip_and_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let mut kv = FileStore::open(tmp.path().join("data")).unwrap();
            kv.set("mapvc_projects", "[\"Demo\"]").unwrap();
        }
        let kv = FileStore::open(tmp.path().join("data")).unwrap();
        assert_eq!(
            kv.get("mapvc_projects").unwrap().as_deref(),
            Some("[\"Demo\"]")
        );
        assert!(kv.root().join("mapvc_projects.json").is_file());
    }

    #[test]
    fn file_store_remove_missing_is_ok() {
        let tmp = tempfile::tempdir().unwrap();
        let mut kv = FileStore::open(tmp.path()).unwrap();
        kv.remove("nothing").unwrap();
        assert!(kv.get("nothing").unwrap().is_none());
    }

    #[test]
    fn file_store_rejects_path_like_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let mut kv = FileStore::open(tmp.path()).unwrap();
        assert!(matches!(
            kv.set("../escape", "x"),
            Err(StoreError::InvalidKey(_))
        ));
        assert!(kv.get("a/b").is_err());
        assert!(kv.get("").is_err());
    }
}
