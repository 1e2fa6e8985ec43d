//! Durable Cache Log
//!
//! Append-oriented JSON-lines file. Each line is one self-contained record:
//! `{"key": "...", "entry": {...}}` stores an entry, `"entry": null` is a
//! tombstone. Replaying the file in order (later lines win) reconstructs the
//! cache; corrupt lines are skipped individually.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::cache::CacheEntry;
use crate::types::{Result, TargetKey};

/// One line of the log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub key: TargetKey,
    pub entry: Option<CacheEntry>,
}

/// Replayed log contents
#[derive(Debug, Default)]
pub struct LoadedLog {
    pub entries: HashMap<TargetKey, CacheEntry>,
    /// Lines read, including superseded ones
    pub lines: usize,
    pub skipped: usize,
}

/// JSON-lines file holding cache records
#[derive(Debug, Clone)]
pub struct CacheLog {
    path: PathBuf,
}

impl CacheLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replay the log; an unreadable file yields an empty cache
    pub async fn load(&self) -> LoadedLog {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No cache log yet");
                return LoadedLog::default();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Cache log unreadable, starting empty");
                return LoadedLog::default();
            }
        };

        let mut loaded = LoadedLog::default();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            loaded.lines += 1;
            match serde_json::from_str::<LogRecord>(line) {
                Ok(LogRecord {
                    key,
                    entry: Some(entry),
                }) => {
                    loaded.entries.insert(key, entry);
                }
                Ok(LogRecord { key, entry: None }) => {
                    loaded.entries.remove(&key);
                }
                Err(e) => {
                    loaded.skipped += 1;
                    warn!(line = line_no + 1, error = %e, "Skipping corrupt cache record");
                }
            }
        }

        debug!(
            entries = loaded.entries.len(),
            lines = loaded.lines,
            skipped = loaded.skipped,
            "Loaded cache log"
        );
        loaded
    }

    /// Append records in a single write
    pub async fn append(&self, records: &[LogRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        self.ensure_parent().await?;

        let buf = encode(records)?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(buf.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Replace the whole log with `records`
    pub async fn rewrite(&self, records: &[LogRecord]) -> Result<()> {
        self.ensure_parent().await?;

        let buf = encode(records)?;
        let tmp = self.path.with_extension("jsonl.tmp");
        tokio::fs::write(&tmp, buf.as_bytes()).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

fn encode(records: &[LogRecord]) -> Result<String> {
    let mut buf = String::new();
    for record in records {
        buf.push_str(&serde_json::to_string(record)?);
        buf.push('\n');
    }
    Ok(buf)
}
