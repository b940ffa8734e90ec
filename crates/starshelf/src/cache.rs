//! Durable key → JSON document store.
//!
//! The mirror index is persisted through this abstraction after every
//! mutation. Reads are best-effort: a missing, unreadable or corrupt entry
//! yields the caller's default instead of an error.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur during cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Filesystem error.
    #[error("Cache I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Document could not be encoded or decoded.
    #[error("Cache JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// A durable map of opaque JSON documents.
pub trait CacheStore: Send + Sync {
    /// Load the document stored under `key`, if any.
    fn load(&self, key: &str) -> Result<Option<Value>>;

    /// Store `value` under `key`, replacing any previous document.
    fn save(&self, key: &str, value: &Value) -> Result<()>;

    /// Delete the document stored under `key`. Missing keys are not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

impl<'a> dyn CacheStore + 'a {
    /// Read and decode the document under `key`, falling back to `default`.
    ///
    /// Failures are logged and never propagated.
    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self.load(key) {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(decoded) => decoded,
                Err(e) => {
                    tracing::warn!(
                        key,
                        error = %e,
                        "Cached document has unexpected shape, using default"
                    );
                    default
                }
            },
            Ok(None) => default,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to restore from cache, using default");
                default
            }
        }
    }

    /// Encode `value` and store it under `key`.
    pub fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.save(key, &value)
    }
}

/// File-backed cache: one `<key>.json` file per key inside `dir`.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the cache files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn io_error(path: &Path, source: std::io::Error) -> CacheError {
        CacheError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl CacheStore for FileCache {
    fn load(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path_for(key);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Self::io_error(&path, e)),
        };

        if contents.trim().is_empty() {
            return Ok(None);
        }

        Ok(Some(serde_json::from_str(&contents)?))
    }

    fn save(&self, key: &str, value: &Value) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| Self::io_error(&self.dir, e))?;

        let path = self.path_for(key);
        let tmp_path = self.dir.join(format!(".{key}.json.tmp"));

        // Write to a sibling temp file and rename so readers never see a torn file
        let mut file = fs::File::create(&tmp_path).map_err(|e| Self::io_error(&tmp_path, e))?;
        serde_json::to_writer(&mut file, value)?;
        file.flush().map_err(|e| Self::io_error(&tmp_path, e))?;
        drop(file);

        fs::rename(&tmp_path, &path).map_err(|e| Self::io_error(&path, e))
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_error(&path, e)),
        }
    }
}

/// Process-local cache, for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryCache {
    fn load(&self, key: &str) -> Result<Option<Value>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn save(&self, key: &str, value: &Value) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn file_cache_save_then_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = FileCache::new(dir.path().join("nested"));

        cache
            .save("notion-page", &json!({"R_1": {"pageId": "p1", "title": "a/b"}}))
            .expect("save");

        let loaded = cache.load("notion-page").expect("load");
        assert_eq!(
            loaded,
            Some(json!({"R_1": {"pageId": "p1", "title": "a/b"}}))
        );
        assert!(cache.path_for("notion-page").exists());
        assert!(!dir.path().join("nested/.notion-page.json.tmp").exists());
    }

    #[test]
    fn file_cache_missing_key_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = FileCache::new(dir.path());
        assert!(cache.load("absent").expect("load").is_none());
    }

    #[test]
    fn file_cache_corrupt_file_falls_back_to_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = FileCache::new(dir.path());
        fs::write(cache.path_for("broken"), "{not json").expect("write");

        assert!(matches!(cache.load("broken"), Err(CacheError::Json(_))));

        let store: &dyn CacheStore = &cache;
        let value: BTreeMap<String, String> =
            store.get("broken", BTreeMap::from([("k".to_string(), "v".to_string())]));
        assert_eq!(value.get("k").map(String::as_str), Some("v"));
    }

    #[test]
    fn file_cache_empty_file_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = FileCache::new(dir.path());
        fs::write(cache.path_for("empty"), "").expect("write");
        assert!(cache.load("empty").expect("load").is_none());
    }

    #[test]
    fn file_cache_remove_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = FileCache::new(dir.path());
        cache.save("k", &json!([1, 2])).expect("save");

        cache.remove("k").expect("first remove");
        cache.remove("k").expect("second remove");
        assert!(cache.load("k").expect("load").is_none());
    }

    #[test]
    fn typed_get_and_put_through_dyn_store() {
        let cache = MemoryCache::new();
        let store: &dyn CacheStore = &cache;

        let empty: BTreeMap<String, u32> = store.get("counts", BTreeMap::new());
        assert!(empty.is_empty());

        store
            .put("counts", &BTreeMap::from([("a".to_string(), 1u32)]))
            .expect("put");
        let restored: BTreeMap<String, u32> = store.get("counts", BTreeMap::new());
        assert_eq!(restored.get("a"), Some(&1));
    }

    #[test]
    fn typed_get_with_wrong_shape_uses_default() {
        let cache = MemoryCache::new();
        cache.save("k", &json!("a string")).expect("save");

        let store: &dyn CacheStore = &cache;
        let value: Vec<u32> = store.get("k", vec![7]);
        assert_eq!(value, vec![7]);
    }
}
