//! Storage Layer
//!
//! Filesystem access, content fingerprints and the persistent analysis cache.

pub mod cache;
pub mod fingerprint;
pub mod fs;
pub mod log;

pub use cache::{AnalysisCache, CacheConfig, CacheEntry, CacheStats};
pub use fingerprint::Fingerprint;
pub use fs::{DirEntryInfo, FileStat, FileSystem, LocalFileSystem, SharedFileSystem};
