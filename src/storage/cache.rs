//! Analysis Cache
//!
//! Content-addressed cache of analysis results.
//!
//! ## Validation
//!
//! A read is a hit only if, in order: the entry is in the in-memory index,
//! its schema version is current, its TTL has not elapsed, and the target's
//! current fingerprint equals the stored one. Any failed check deletes the
//! entry.
//!
//! ## Persistence
//!
//! Writes go to the index immediately and to the durable log through a
//! debounced flush: the latest record per key waits in a pending map and a
//! single task drains it once the debounce window elapses.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::fingerprint::{self, Fingerprint};
use super::fs::SharedFileSystem;
use super::log::{CacheLog, LogRecord};
use crate::constants::cache as cache_constants;
use crate::constants::result::KNOWN_SCHEMAS;
use crate::types::{AnalysisResult, Result, TargetKey, Tier};

/// Runtime cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Durable log location
    pub log_path: PathBuf,
    /// Default time-to-live for entries
    pub ttl: Duration,
    /// Maximum entries in the in-memory index
    pub max_entries: usize,
    /// Write-through debounce window
    pub debounce: Duration,
    /// Log lines per live entry that trigger a compacting rewrite
    pub compact_factor: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from(cache_constants::DEFAULT_DIR).join(cache_constants::LOG_FILE),
            ttl: Duration::from_secs(cache_constants::DEFAULT_TTL_SECS),
            max_entries: cache_constants::DEFAULT_MAX_ENTRIES,
            debounce: Duration::from_millis(cache_constants::DEFAULT_DEBOUNCE_MS),
            compact_factor: cache_constants::DEFAULT_COMPACT_FACTOR,
        }
    }
}

/// Cached result with the content identity it was computed from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub result: AnalysisResult,
    pub fingerprint: Fingerprint,
    pub cached_at: DateTime<Utc>,
    pub ttl_ms: u64,
}

impl CacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let ttl = i64::try_from(self.ttl_ms)
            .ok()
            .and_then(chrono::TimeDelta::try_milliseconds)
            .unwrap_or(chrono::TimeDelta::MAX);
        now.signed_duration_since(self.cached_at) >= ttl
    }

    fn has_current_schema(&self) -> bool {
        KNOWN_SCHEMAS.contains(&self.result.schema_version.as_str())
    }

    fn same_write(&self, other: &CacheEntry) -> bool {
        self.cached_at == other.cached_at && self.fingerprint == other.fingerprint
    }
}

/// Cached entry counts by tier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total: usize,
    pub heuristic: usize,
    pub structural: usize,
    pub model: usize,
    pub error: usize,
}

struct IndexedEntry {
    entry: CacheEntry,
    last_access: u64,
}

/// In-memory index with least-recently-used eviction
#[derive(Default)]
struct CacheIndex {
    entries: HashMap<TargetKey, IndexedEntry>,
    tick: u64,
}

impl CacheIndex {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn touch(&mut self, key: &TargetKey) -> Option<CacheEntry> {
        let tick = self.next_tick();
        let indexed = self.entries.get_mut(key)?;
        indexed.last_access = tick;
        Some(indexed.entry.clone())
    }

    /// Insert and evict down to `max_entries`; returns evicted keys
    fn insert(&mut self, key: TargetKey, entry: CacheEntry, max_entries: usize) -> Vec<TargetKey> {
        let last_access = self.next_tick();
        self.entries.insert(key.clone(), IndexedEntry { entry, last_access });

        let mut evicted = Vec::new();
        while self.entries.len() > max_entries.max(1) {
            let oldest = self
                .entries
                .iter()
                .filter(|(k, _)| **k != key)
                .min_by_key(|(_, e)| e.last_access)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(k) => {
                    self.entries.remove(&k);
                    evicted.push(k);
                }
                None => break,
            }
        }
        evicted
    }

    fn remove_if_same(&mut self, key: &TargetKey, seen: &CacheEntry) -> bool {
        let same = self
            .entries
            .get(key)
            .is_some_and(|indexed| indexed.entry.same_write(seen));
        if same {
            self.entries.remove(key);
        }
        same
    }

    fn snapshot(&self) -> Vec<LogRecord> {
        let mut ordered: Vec<_> = self.entries.iter().collect();
        ordered.sort_by_key(|(_, e)| e.last_access);
        ordered
            .into_iter()
            .map(|(key, indexed)| LogRecord {
                key: key.clone(),
                entry: Some(indexed.entry.clone()),
            })
            .collect()
    }
}

struct CacheInner {
    config: CacheConfig,
    fs: SharedFileSystem,
    log: CacheLog,
    index: Mutex<CacheIndex>,
    pending: Mutex<HashMap<TargetKey, Option<CacheEntry>>>,
    flush_scheduled: AtomicBool,
    /// Serializes log writes; holds the current line count
    log_lines: tokio::sync::Mutex<usize>,
}

/// Persistent, fingerprint-validated cache of analysis results
///
/// Cheap to clone; clones share the same index and log.
#[derive(Clone)]
pub struct AnalysisCache {
    inner: Arc<CacheInner>,
}

impl AnalysisCache {
    /// Open the cache, replaying the durable log
    pub async fn open(config: CacheConfig, fs: SharedFileSystem) -> Self {
        let log = CacheLog::new(&config.log_path);
        let loaded = log.load().await;
        let now = Utc::now();

        let mut live: Vec<_> = loaded
            .entries
            .into_iter()
            .filter(|(_, entry)| !entry.is_expired(now) && entry.has_current_schema())
            .collect();
        live.sort_by_key(|(_, entry)| entry.cached_at);

        let mut index = CacheIndex::default();
        for (key, entry) in live {
            index.insert(key, entry, config.max_entries);
        }

        info!(
            entries = index.entries.len(),
            path = %config.log_path.display(),
            "Opened analysis cache"
        );

        Self {
            inner: Arc::new(CacheInner {
                config,
                fs,
                log,
                index: Mutex::new(index),
                pending: Mutex::new(HashMap::new()),
                flush_scheduled: AtomicBool::new(false),
                log_lines: tokio::sync::Mutex::new(loaded.lines),
            }),
        }
    }

    /// Validated lookup; stale entries are deleted, never returned
    pub async fn get(&self, target: &Path) -> Option<AnalysisResult> {
        let key = TargetKey::for_path(target);
        let entry = self.inner.index().touch(&key)?;

        if !entry.has_current_schema() {
            self.invalidate(&key, &entry, "schema version");
            return None;
        }

        if entry.is_expired(Utc::now()) {
            self.invalidate(&key, &entry, "ttl expired");
            return None;
        }

        match fingerprint::compute(self.inner.fs.as_ref(), target).await {
            Ok(current) if current == entry.fingerprint => {
                debug!(target = %target.display(), tier = %entry.result.tier, "Cache hit");
                Some(entry.result)
            }
            Ok(_) => {
                self.invalidate(&key, &entry, "fingerprint mismatch");
                None
            }
            Err(e) => {
                debug!(target = %target.display(), error = %e, "Fingerprint failed");
                self.invalidate(&key, &entry, "fingerprint unavailable");
                None
            }
        }
    }

    /// Store `result` under its target, fingerprinted now
    ///
    /// Returns once the in-memory index is updated; the durable write is
    /// debounced.
    pub async fn set(&self, result: &AnalysisResult, ttl: Option<Duration>) {
        let target = Path::new(&result.target);
        let fingerprint = match fingerprint::compute(self.inner.fs.as_ref(), target).await {
            Ok(fp) => fp,
            Err(e) => {
                warn!(target = %result.target, error = %e, "Not caching: fingerprint failed");
                return;
            }
        };

        let entry = CacheEntry {
            result: result.clone(),
            fingerprint,
            cached_at: Utc::now(),
            ttl_ms: u64::try_from(ttl.unwrap_or(self.inner.config.ttl).as_millis())
                .unwrap_or(u64::MAX),
        };
        let key = TargetKey::for_path(target);

        let evicted =
            self.inner
                .index()
                .insert(key.clone(), entry.clone(), self.inner.config.max_entries);

        {
            let mut pending = self.inner.pending();
            pending.insert(key, Some(entry));
            for k in evicted {
                debug!(key = %k, "Evicted least recently used entry");
                pending.insert(k, None);
            }
        }
        self.schedule_flush();
    }

    pub fn delete(&self, target: &Path) -> bool {
        let key = TargetKey::for_path(target);
        let removed = self.inner.index().entries.remove(&key).is_some();
        if removed {
            self.inner.pending().insert(key, None);
            self.schedule_flush();
        }
        removed
    }

    /// Sweep TTL-expired entries; returns how many were removed
    pub fn cleanup(&self) -> usize {
        let now = Utc::now();
        let expired: Vec<TargetKey> = {
            let mut index = self.inner.index();
            let keys: Vec<_> = index
                .entries
                .iter()
                .filter(|(_, e)| e.entry.is_expired(now))
                .map(|(k, _)| k.clone())
                .collect();
            for key in &keys {
                index.entries.remove(key);
            }
            keys
        };

        if !expired.is_empty() {
            let mut pending = self.inner.pending();
            for key in &expired {
                pending.insert(key.clone(), None);
            }
            drop(pending);
            self.schedule_flush();
            info!(removed = expired.len(), "Swept expired cache entries");
        }
        expired.len()
    }

    /// Drop every entry and truncate the durable log
    pub async fn clear(&self) -> Result<()> {
        self.inner.index().entries.clear();
        self.inner.pending().clear();

        let mut lines = self.inner.log_lines.lock().await;
        self.inner.log.rewrite(&[]).await?;
        *lines = 0;
        info!("Cleared analysis cache");
        Ok(())
    }

    pub fn stats(&self) -> CacheStats {
        let index = self.inner.index();
        let mut stats = CacheStats {
            total: index.entries.len(),
            ..Default::default()
        };
        for indexed in index.entries.values() {
            match indexed.entry.result.tier {
                Tier::Heuristic => stats.heuristic += 1,
                Tier::Structural => stats.structural += 1,
                Tier::Model => stats.model += 1,
                Tier::Error => stats.error += 1,
            }
        }
        stats
    }

    pub fn len(&self) -> usize {
        self.inner.index().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write pending records now instead of waiting for the debounce
    pub async fn flush(&self) -> Result<()> {
        self.inner.flush_pending().await
    }

    pub fn log_path(&self) -> &Path {
        self.inner.log.path()
    }

    fn invalidate(&self, key: &TargetKey, seen: &CacheEntry, reason: &str) {
        if self.inner.index().remove_if_same(key, seen) {
            debug!(key = %key, reason, "Cache entry invalidated");
            self.inner.pending().insert(key.clone(), None);
            self.schedule_flush();
        }
    }

    fn schedule_flush(&self) {
        if self.inner.flush_scheduled.swap(true, Ordering::AcqRel) {
            return;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            // No runtime: records stay pending until an explicit flush()
            self.inner.flush_scheduled.store(false, Ordering::Release);
            return;
        };

        let inner = Arc::clone(&self.inner);
        handle.spawn(async move {
            tokio::time::sleep(inner.config.debounce).await;
            inner.flush_scheduled.store(false, Ordering::Release);
            if let Err(e) = inner.flush_pending().await {
                warn!(error = %e, "Cache write-through failed");
            }
        });
    }
}

impl CacheInner {
    fn index(&self) -> MutexGuard<'_, CacheIndex> {
        self.index.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<TargetKey, Option<CacheEntry>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn flush_pending(&self) -> Result<()> {
        let mut lines = self.log_lines.lock().await;

        let drained: Vec<LogRecord> = self
            .pending()
            .drain()
            .map(|(key, entry)| LogRecord { key, entry })
            .collect();
        if drained.is_empty() {
            return Ok(());
        }

        let (live, snapshot) = {
            let index = self.index();
            let live = index.entries.len();
            let snapshot = if *lines + drained.len() > live.max(1) * self.config.compact_factor {
                Some(index.snapshot())
            } else {
                None
            };
            (live, snapshot)
        };

        let written = match snapshot {
            Some(records) => self.log.rewrite(&records).await.map(|_| {
                debug!(live, "Compacted cache log");
                *lines = records.len();
            }),
            None => self.log.append(&drained).await.map(|_| {
                *lines += drained.len();
            }),
        };

        if let Err(e) = written {
            // Keep anything newer that arrived while writing
            let mut pending = self.pending();
            for record in drained {
                pending.entry(record.key).or_insert(record.entry);
            }
            return Err(e);
        }

        debug!(records = drained.len(), "Flushed cache records");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::fs::LocalFileSystem;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> CacheConfig {
        CacheConfig {
            log_path: dir.path().join("cache/analysis.jsonl"),
            debounce: Duration::from_millis(20),
            ..Default::default()
        }
    }

    fn result_for(path: &Path, summary: &str) -> AnalysisResult {
        AnalysisResult::new(path.display().to_string(), Tier::Heuristic, summary)
    }

    async fn open(config: CacheConfig) -> AnalysisCache {
        AnalysisCache::open(config, LocalFileSystem::shared()).await
    }

    fn log_lines(cache: &AnalysisCache) -> Vec<String> {
        std::fs::read_to_string(cache.log_path())
            .unwrap_or_default()
            .lines()
            .map(String::from)
            .collect()
    }

    #[tokio::test]
    async fn test_set_then_get_hits() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("main.rs");
        std::fs::write(&file, "fn main() {}").unwrap();

        let cache = open(config(&dir)).await;
        let result = result_for(&file, "entry point");
        cache.set(&result, None).await;

        assert_eq!(cache.get(&file).await, Some(result));
    }

    #[tokio::test]
    async fn test_fingerprint_mismatch_is_miss_and_deletes() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("lib.rs");
        std::fs::write(&file, "pub fn a() {}").unwrap();

        let cache = open(config(&dir)).await;
        cache.set(&result_for(&file, "lib"), None).await;
        std::fs::write(&file, "pub fn b() {}").unwrap();

        assert!(cache.get(&file).await.is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_zero_ttl_is_miss() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "a").unwrap();

        let cache = open(config(&dir)).await;
        cache
            .set(&result_for(&file, "a"), Some(Duration::ZERO))
            .await;
        assert!(cache.get(&file).await.is_none());
    }

    #[tokio::test]
    async fn test_sub_second_ttl_is_honored() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "a").unwrap();

        let cache = open(config(&dir)).await;
        cache
            .set(&result_for(&file, "a"), Some(Duration::from_millis(900)))
            .await;
        assert!(cache.get(&file).await.is_some());

        tokio::time::sleep(Duration::from_millis(950)).await;
        assert!(cache.get(&file).await.is_none());
    }

    #[tokio::test]
    async fn test_stale_schema_is_miss() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "a").unwrap();

        let cache = open(config(&dir)).await;
        let mut result = result_for(&file, "a");
        result.schema_version = "heuristic-v0".into();
        cache.set(&result, None).await;
        assert!(cache.get(&file).await.is_none());
    }

    #[tokio::test]
    async fn test_rapid_sets_collapse_into_one_write() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "a").unwrap();

        let cache = open(CacheConfig {
            debounce: Duration::from_millis(150),
            ..config(&dir)
        })
        .await;
        for i in 0..5 {
            cache.set(&result_for(&file, &format!("v{}", i)), None).await;
        }
        tokio::time::sleep(Duration::from_millis(600)).await;

        let lines = log_lines(&cache);
        assert_eq!(lines.len(), 1);
        let record: LogRecord = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(record.entry.unwrap().result.summary, "v4");
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "a").unwrap();

        let cache = open(config(&dir)).await;
        cache.set(&result_for(&file, "kept"), None).await;
        cache.flush().await.unwrap();

        let reopened = open(config(&dir)).await;
        assert_eq!(reopened.get(&file).await.unwrap().summary, "kept");
    }

    #[tokio::test]
    async fn test_delete_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "a").unwrap();

        let cache = open(config(&dir)).await;
        cache.set(&result_for(&file, "gone"), None).await;
        cache.flush().await.unwrap();
        assert!(cache.delete(&file));
        cache.flush().await.unwrap();

        let reopened = open(config(&dir)).await;
        assert!(reopened.get(&file).await.is_none());
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let dir = TempDir::new().unwrap();
        let paths: Vec<_> = ["a", "b", "c"]
            .iter()
            .map(|name| {
                let p = dir.path().join(name);
                std::fs::write(&p, name).unwrap();
                p
            })
            .collect();

        let cache = open(CacheConfig {
            max_entries: 2,
            ..config(&dir)
        })
        .await;
        cache.set(&result_for(&paths[0], "a"), None).await;
        cache.set(&result_for(&paths[1], "b"), None).await;
        assert!(cache.get(&paths[0]).await.is_some());
        cache.set(&result_for(&paths[2], "c"), None).await;

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&paths[0]).await.is_some());
        assert!(cache.get(&paths[1]).await.is_none());
        assert!(cache.get(&paths[2]).await.is_some());
    }

    #[tokio::test]
    async fn test_cleanup_sweeps_expired() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::fs::write(&a, "a").unwrap();
        std::fs::write(&b, "b").unwrap();

        let cache = open(config(&dir)).await;
        cache.set(&result_for(&a, "a"), Some(Duration::ZERO)).await;
        cache.set(&result_for(&b, "b"), None).await;

        assert_eq!(cache.cleanup(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_stats_by_tier() {
        let dir = TempDir::new().unwrap();
        let cache = open(config(&dir)).await;

        let a = dir.path().join("a");
        let b = dir.path().join("b");
        cache.set(&result_for(&a, "a"), None).await;
        cache
            .set(&result_for(&b, "b").promote(Tier::Model), None)
            .await;

        let stats = cache.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.heuristic, 1);
        assert_eq!(stats.model, 1);
        assert_eq!(stats.structural, 0);
    }

    #[tokio::test]
    async fn test_clear_truncates_log() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a");
        let cache = open(config(&dir)).await;
        cache.set(&result_for(&file, "a"), None).await;
        cache.flush().await.unwrap();

        cache.clear().await.unwrap();
        assert!(cache.is_empty());
        assert!(log_lines(&cache).is_empty());
    }

    #[tokio::test]
    async fn test_compaction_bounds_log() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a");
        std::fs::write(&file, "a").unwrap();

        let cache = open(CacheConfig {
            compact_factor: 2,
            ..config(&dir)
        })
        .await;
        for i in 0..10 {
            cache.set(&result_for(&file, &i.to_string()), None).await;
            cache.flush().await.unwrap();
        }
        assert!(log_lines(&cache).len() <= 2);
    }
}
