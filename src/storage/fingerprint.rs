//! Content Fingerprints
//!
//! Small files are identified by a SHA-256 of their content. Large files and
//! directories use a `(mtime, size)` signature, which is cheaper but misses
//! edits that preserve both.

use std::fmt;
use std::path::Path;
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::fs::{FileStat, FileSystem};
use crate::constants::fingerprint::CONTENT_HASH_LIMIT;
use crate::types::Result;

/// Identity of a filesystem entry's content state
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint of an entry that does not exist
    pub fn absent() -> Self {
        Self("absent".to_string())
    }

    pub fn of_content(bytes: &[u8]) -> Self {
        Self(format!("sha256:{:x}", Sha256::digest(bytes)))
    }

    pub fn of_signature(stat: &FileStat) -> Self {
        let mtime_ms = stat
            .modified
            .and_then(|m| m.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis())
            .unwrap_or(0);
        Self(format!("sig:{}:{}", mtime_ms, stat.size))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_absent(&self) -> bool {
        self.0 == "absent"
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the current fingerprint of `path`
///
/// A missing entry yields [`Fingerprint::absent`]; other I/O failures are errors.
pub async fn compute(fs: &dyn FileSystem, path: &Path) -> Result<Fingerprint> {
    let stat = match fs.stat(path).await {
        Ok(stat) => stat,
        Err(e) if e.is_not_found() => return Ok(Fingerprint::absent()),
        Err(e) => return Err(e),
    };

    if stat.is_dir || stat.size >= CONTENT_HASH_LIMIT {
        return Ok(Fingerprint::of_signature(&stat));
    }

    match fs.read_file(path).await {
        Ok(bytes) => Ok(Fingerprint::of_content(&bytes)),
        Err(e) if e.is_not_found() => Ok(Fingerprint::absent()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::fs::LocalFileSystem;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_content_change_changes_fingerprint() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.md");
        let fs = LocalFileSystem::new();

        std::fs::write(&file, "# One").unwrap();
        let first = compute(&fs, &file).await.unwrap();
        assert!(first.as_str().starts_with("sha256:"));

        std::fs::write(&file, "# Two").unwrap();
        let second = compute(&fs, &file).await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_identical_content_same_fingerprint() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        std::fs::write(&a, "same").unwrap();
        std::fs::write(&b, "same").unwrap();

        let fs = LocalFileSystem::new();
        assert_eq!(
            compute(&fs, &a).await.unwrap(),
            compute(&fs, &b).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_directory_uses_signature() {
        let dir = TempDir::new().unwrap();
        let fp = compute(&LocalFileSystem::new(), dir.path()).await.unwrap();
        assert!(fp.as_str().starts_with("sig:"));
    }

    #[tokio::test]
    async fn test_missing_is_absent() {
        let dir = TempDir::new().unwrap();
        let fp = compute(&LocalFileSystem::new(), &dir.path().join("ghost.rs"))
            .await
            .unwrap();
        assert!(fp.is_absent());
    }

    #[test]
    fn test_signature_format() {
        let stat = FileStat {
            is_dir: false,
            size: 42,
            modified: Some(SystemTime::UNIX_EPOCH + Duration::from_millis(1500)),
        };
        assert_eq!(Fingerprint::of_signature(&stat).as_str(), "sig:1500:42");
    }
}
