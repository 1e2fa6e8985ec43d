//! Filesystem Access
//!
//! The analyzers and the cache only touch the filesystem through
//! [`FileSystem`], so tests can swap in failing or counting implementations.

use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;

use crate::types::{LensError, Result};

/// Subset of file metadata the pipeline needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub is_dir: bool,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

/// Immediate child of a directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntryInfo {
    pub name: String,
    pub is_dir: bool,
}

/// Read/stat collaborator
///
/// Missing or inaccessible entries must surface as [`LensError::NotFound`].
#[async_trait]
pub trait FileSystem: Send + Sync {
    async fn stat(&self, path: &Path) -> Result<FileStat>;

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>>;

    /// Children sorted by name
    async fn read_dir(&self, path: &Path) -> Result<Vec<DirEntryInfo>>;
}

pub type SharedFileSystem = Arc<dyn FileSystem>;

/// [`FileSystem`] backed by `tokio::fs`
#[derive(Debug, Clone, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }

    pub fn shared() -> SharedFileSystem {
        Arc::new(Self)
    }
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn stat(&self, path: &Path) -> Result<FileStat> {
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| LensError::from_io(e, path))?;
        Ok(FileStat {
            is_dir: meta.is_dir(),
            size: meta.len(),
            modified: meta.modified().ok(),
        })
    }

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        tokio::fs::read(path)
            .await
            .map_err(|e| LensError::from_io(e, path))
    }

    async fn read_dir(&self, path: &Path) -> Result<Vec<DirEntryInfo>> {
        let mut entries = tokio::fs::read_dir(path)
            .await
            .map_err(|e| LensError::from_io(e, path))?;

        let mut children = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            children.push(DirEntryInfo {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir,
            });
        }
        children.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(children)
    }
}
