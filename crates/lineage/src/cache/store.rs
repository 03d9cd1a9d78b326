//! Cache record persistence.
//!
//! A [`CacheRecord`] pairs a serialized theme entity with the stamped files it
//! was built from. Stores only persist and return records; deciding whether a
//! record is fresh is left to the factory and its [`Freshness`](super::Freshness).
//!
//! [`FileCacheStore`] keeps one JSON file per theme under
//! `<cache_dir>/theme_config/<name>.json` and replaces it atomically, so a
//! reader never sees a half-written record.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::freshness::DependencyStamp;

/// Subdirectory of the cache dir holding theme records.
pub const CACHE_SUBDIR: &str = "theme_config";

/// Error type for cache store operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// IO error reading or writing a record.
    #[error("cache I/O error at \"{}\": {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A stored record cannot be parsed.
    #[error("corrupt cache record at \"{}\": {message}", .path.display())]
    Corrupt { path: PathBuf, message: String },

    /// An entity could not be serialized.
    #[error("failed to serialize theme: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A persisted theme together with its freshness inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Identifier of the freshness strategy that stamped the dependencies.
    pub freshness: String,
    pub written_at: SystemTime,
    pub dependencies: Vec<DependencyStamp>,
    /// The serialized entity.
    pub entity: serde_json::Value,
}

impl CacheRecord {
    pub fn new<T: Serialize>(
        freshness: impl Into<String>,
        dependencies: Vec<DependencyStamp>,
        entity: &T,
    ) -> Result<Self, CacheError> {
        Ok(Self {
            freshness: freshness.into(),
            written_at: SystemTime::now(),
            dependencies,
            entity: serde_json::to_value(entity)?,
        })
    }
}

/// Persistent storage for cache records, keyed by theme name.
pub trait CacheStore: Send + Sync {
    /// Returns the record for `name`, or `None` if there is none.
    ///
    /// A record that exists but cannot be parsed is [`CacheError::Corrupt`].
    fn load(&self, name: &str) -> Result<Option<CacheRecord>, CacheError>;

    /// Replaces the record for `name`.
    fn store(&self, name: &str, record: &CacheRecord) -> Result<(), CacheError>;

    /// Deletes the record for `name`, if any.
    fn remove(&self, name: &str) -> Result<(), CacheError>;

    /// Deletes every record.
    fn clear(&self) -> Result<(), CacheError>;
}

/// Stores records as JSON files under a cache directory.
#[derive(Debug, Clone)]
pub struct FileCacheStore {
    root: PathBuf,
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

impl FileCacheStore {
    /// Creates a store rooted at `<cache_dir>/theme_config`.
    ///
    /// Nothing is created on disk until the first write.
    pub fn new(cache_dir: impl AsRef<Path>) -> Self {
        Self {
            root: cache_dir.as_ref().join(CACHE_SUBDIR),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of the record for `name`.
    pub fn record_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.json", name))
    }

    fn io_err(path: &Path) -> impl FnOnce(io::Error) -> CacheError + '_ {
        move |source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl CacheStore for FileCacheStore {
    fn load(&self, name: &str) -> Result<Option<CacheRecord>, CacheError> {
        let path = self.record_path(name);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Self::io_err(&path)(e)),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| CacheError::Corrupt {
                path,
                message: e.to_string(),
            })
    }

    fn store(&self, name: &str, record: &CacheRecord) -> Result<(), CacheError> {
        let target = self.record_path(name);
        let dir = target.parent().unwrap_or(self.root.as_path());
        std::fs::create_dir_all(dir).map_err(Self::io_err(dir))?;

        let content = serde_json::to_string_pretty(record)?;

        // Unique per writer so concurrent rebuilds never share a temp file.
        let temp = dir.join(format!(
            ".{}.{}.{}.tmp",
            target
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        write_atomic(&temp, &target, content.as_bytes())?;

        debug!(theme = name, path = %target.display(), "wrote cache record");
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<(), CacheError> {
        let path = self.record_path(name);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_err(&path)(e)),
        }
    }

    fn clear(&self) -> Result<(), CacheError> {
        match std::fs::remove_dir_all(&self.root) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_err(&self.root)(e)),
        }
    }
}

/// Writes `content` to `temp`, then renames it over `target`.
///
/// On failure the temp file is removed, whichever step failed.
fn write_atomic(temp: &Path, target: &Path, content: &[u8]) -> Result<(), CacheError> {
    let result = std::fs::write(temp, content)
        .map_err(FileCacheStore::io_err(temp))
        .and_then(|()| std::fs::rename(temp, target).map_err(FileCacheStore::io_err(target)));
    if result.is_err() {
        let _ = std::fs::remove_file(temp);
    }
    result
}

/// Keeps records in memory. Useful for tests and short-lived processes.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    records: Mutex<HashMap<String, CacheRecord>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryCacheStore {
    fn load(&self, name: &str) -> Result<Option<CacheRecord>, CacheError> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(records.get(name).cloned())
    }

    fn store(&self, name: &str, record: &CacheRecord) -> Result<(), CacheError> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        records.insert(name.to_string(), record.clone());
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<(), CacheError> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        records.remove(name);
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        records.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::freshness::Fingerprint;
    use tempfile::TempDir;

    fn record(entity: serde_json::Value) -> CacheRecord {
        CacheRecord {
            freshness: "mtime".to_string(),
            written_at: SystemTime::now(),
            dependencies: vec![DependencyStamp {
                path: PathBuf::from("/themes/base/theme.yml"),
                fingerprint: Some(Fingerprint::new("1.000000000:10")),
            }],
            entity,
        }
    }

    #[test]
    fn test_file_store_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileCacheStore::new(temp_dir.path());

        assert!(store.load("base").unwrap().is_none());

        let original = record(serde_json::json!({"name": "base"}));
        store.store("base", &original).unwrap();

        assert_eq!(store.load("base").unwrap(), Some(original));
        assert!(temp_dir.path().join("theme_config/base.json").is_file());
    }

    #[test]
    fn test_file_store_leaves_no_temp_files() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileCacheStore::new(temp_dir.path());
        store.store("a", &record(serde_json::json!({}))).unwrap();
        store.store("a", &record(serde_json::json!({"v": 2}))).unwrap();

        let names: Vec<String> = std::fs::read_dir(store.root())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.json"]);
    }

    #[test]
    fn test_write_atomic_removes_temp_when_rename_fails() {
        let temp_dir = TempDir::new().unwrap();
        let temp = temp_dir.path().join(".a.json.tmp");
        // A non-empty directory cannot be replaced by a file.
        let target = temp_dir.path().join("a.json");
        std::fs::create_dir_all(target.join("occupied")).unwrap();

        let result = write_atomic(&temp, &target, b"{}");
        assert!(matches!(result, Err(CacheError::Io { path, .. }) if path == target));
        assert!(!temp.exists());
    }

    #[test]
    fn test_write_atomic_removes_temp_when_write_fails() {
        let temp_dir = TempDir::new().unwrap();
        // Writing through a directory path fails before any rename.
        let temp = temp_dir.path().join("busy.tmp");
        std::fs::create_dir_all(&temp).unwrap();
        let target = temp_dir.path().join("a.json");

        let result = write_atomic(&temp, &target, b"{}");
        assert!(matches!(result, Err(CacheError::Io { path, .. }) if path == temp));
        assert!(!target.exists());

        let missing_dir = temp_dir.path().join("missing/.a.json.tmp");
        assert!(write_atomic(&missing_dir, &target, b"{}").is_err());
        assert!(!missing_dir.exists());
    }

    #[test]
    fn test_file_store_nested_names() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileCacheStore::new(temp_dir.path());
        store.store("vendor/dark", &record(serde_json::json!({}))).unwrap();

        assert!(store.record_path("vendor/dark").is_file());
        assert!(store.load("vendor/dark").unwrap().is_some());
    }

    #[test]
    fn test_file_store_corrupt_record() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileCacheStore::new(temp_dir.path());
        std::fs::create_dir_all(store.root()).unwrap();
        std::fs::write(store.record_path("broken"), "{ not json").unwrap();

        assert!(matches!(store.load("broken"), Err(CacheError::Corrupt { .. })));
    }

    #[test]
    fn test_file_store_remove_and_clear() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileCacheStore::new(temp_dir.path());
        store.store("a", &record(serde_json::json!({}))).unwrap();
        store.store("b", &record(serde_json::json!({}))).unwrap();

        store.remove("a").unwrap();
        store.remove("a").unwrap();
        assert!(store.load("a").unwrap().is_none());
        assert!(store.load("b").unwrap().is_some());

        store.clear().unwrap();
        store.clear().unwrap();
        assert!(store.load("b").unwrap().is_none());
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryCacheStore::new();
        assert!(store.is_empty());

        store.store("a", &record(serde_json::json!({}))).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.load("a").unwrap().is_some());

        store.clear().unwrap();
        assert!(store.load("a").unwrap().is_none());
    }
}
