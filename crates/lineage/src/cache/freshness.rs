//! Dependency fingerprints.
//!
//! A cache record is fresh while every dependency still has the fingerprint it
//! had when the record was written. A missing file fingerprints as `None`, so
//! deleting a dependency (or creating a previously missing one) also
//! invalidates the record.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Opaque summary of a file's state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A dependency path with the fingerprint recorded at write time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyStamp {
    pub path: PathBuf,
    pub fingerprint: Option<Fingerprint>,
}

/// Strategy for fingerprinting dependency files.
pub trait Freshness: Send + Sync {
    /// Identifier stored in records; records written by another strategy are stale.
    fn id(&self) -> &'static str;

    /// Fingerprints `path`, or `None` if it does not exist or cannot be read.
    fn fingerprint(&self, path: &Path) -> Option<Fingerprint>;

    /// Stamps every path with its current fingerprint.
    fn stamp(&self, paths: &[PathBuf]) -> Vec<DependencyStamp> {
        paths
            .iter()
            .map(|path| DependencyStamp {
                path: path.clone(),
                fingerprint: self.fingerprint(path),
            })
            .collect()
    }

    /// Returns true if no stamped dependency changed.
    fn is_fresh(&self, recorded_by: &str, stamps: &[DependencyStamp]) -> bool {
        recorded_by == self.id()
            && stamps
                .iter()
                .all(|stamp| self.fingerprint(&stamp.path) == stamp.fingerprint)
    }
}

/// Fingerprints by modification time and length.
#[derive(Debug, Clone, Copy, Default)]
pub struct MtimeFreshness;

impl Freshness for MtimeFreshness {
    fn id(&self) -> &'static str {
        "mtime"
    }

    fn fingerprint(&self, path: &Path) -> Option<Fingerprint> {
        let metadata = fs::metadata(path).ok()?;
        let modified = metadata.modified().ok()?;
        let since_epoch = modified.duration_since(UNIX_EPOCH).unwrap_or_default();
        Some(Fingerprint(format!(
            "{}.{:09}:{}",
            since_epoch.as_secs(),
            since_epoch.subsec_nanos(),
            metadata.len()
        )))
    }
}

/// Fingerprints by SHA-256 of the file content.
///
/// Immune to coarse timestamp resolution and to touches that do not change
/// content, at the price of reading every dependency on each check.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentHashFreshness;

impl Freshness for ContentHashFreshness {
    fn id(&self) -> &'static str {
        "sha256"
    }

    fn fingerprint(&self, path: &Path) -> Option<Fingerprint> {
        let content = fs::read(path).ok()?;
        Some(Fingerprint(hex::encode(Sha256::digest(&content))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_has_no_fingerprint() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("absent.yml");
        assert_eq!(MtimeFreshness.fingerprint(&path), None);
        assert_eq!(ContentHashFreshness.fingerprint(&path), None);
    }

    #[test]
    fn test_mtime_detects_length_change() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("theme.yml");
        std::fs::write(&path, "name: a\n").unwrap();

        let stamps = MtimeFreshness.stamp(std::slice::from_ref(&path));
        assert!(MtimeFreshness.is_fresh("mtime", &stamps));

        std::fs::write(&path, "name: a\ndescription: longer\n").unwrap();
        assert!(!MtimeFreshness.is_fresh("mtime", &stamps));
    }

    #[test]
    fn test_content_hash_ignores_rewrite_with_same_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("theme.yml");
        std::fs::write(&path, "name: a\n").unwrap();

        let stamps = ContentHashFreshness.stamp(std::slice::from_ref(&path));
        std::fs::write(&path, "name: a\n").unwrap();
        assert!(ContentHashFreshness.is_fresh("sha256", &stamps));

        std::fs::write(&path, "name: b\n").unwrap();
        assert!(!ContentHashFreshness.is_fresh("sha256", &stamps));
    }

    #[test]
    fn test_appearing_file_is_a_change() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("theme.yml");

        let stamps = MtimeFreshness.stamp(std::slice::from_ref(&path));
        assert!(MtimeFreshness.is_fresh("mtime", &stamps));

        std::fs::write(&path, "name: new\n").unwrap();
        assert!(!MtimeFreshness.is_fresh("mtime", &stamps));
    }

    #[test]
    fn test_other_strategy_is_stale() {
        assert!(!MtimeFreshness.is_fresh("sha256", &[]));
        assert!(ContentHashFreshness.is_fresh("sha256", &[]));
    }

    #[test]
    fn test_known_digest() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty");
        std::fs::write(&path, "").unwrap();

        assert_eq!(
            ContentHashFreshness.fingerprint(&path).unwrap().as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
