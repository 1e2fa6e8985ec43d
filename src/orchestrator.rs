//! Analysis Orchestrator
//!
//! Runs the tier pipeline for a target and owns the in-flight table:
//!
//! 1. Cache lookup (unless forced)
//! 2. Heuristic tier, cached immediately
//! 3. Structural tier; on failure the heuristic result stands
//! 4. Model tier when [`ModelGate`] allows; on failure the structural result stands
//!
//! Concurrent requests for the same target share one pipeline run. The run
//! is a spawned task, so it finishes even when every caller goes away.
//! Every tier for a target runs inside that task; `quick_analyze` only waits
//! for the first result the run publishes.

use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::ai::{BackendHealth, DirTemplateSource, ModelRouter, PromptTemplates};
use crate::analyzer::{
    HeuristicAnalyzer, ModelAnalyzer, SharedAnalyzer, StructuralAnalyzer, TierAnalyzer,
};
use crate::config::Config;
use crate::constants::analysis::{BINARY_EXTENSIONS, MAX_MODEL_BYTES};
use crate::storage::{AnalysisCache, CacheStats, FileStat, LocalFileSystem, SharedFileSystem};
use crate::types::{AnalysisResult, LensError, Result, TargetKey};

/// Handle on a running pipeline, shared by every caller for the target
#[derive(Clone)]
struct PendingAnalysis {
    result: Shared<BoxFuture<'static, AnalysisResult>>,
    /// First result the run produced: a cache hit, the heuristic tier, or
    /// the degenerate result
    first: watch::Receiver<Option<AnalysisResult>>,
}

// =============================================================================
// Model Gate
// =============================================================================

/// Decides whether a target is worth a model call
#[derive(Debug, Clone)]
pub struct ModelGate {
    pub enabled: bool,
    /// Files larger than this are never sent
    pub max_model_bytes: u64,
    /// Lowercase extensions without the dot
    pub binary_extensions: Vec<String>,
}

impl Default for ModelGate {
    fn default() -> Self {
        Self {
            enabled: true,
            max_model_bytes: MAX_MODEL_BYTES,
            binary_extensions: BINARY_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ModelGate {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Why the model tier is skipped for `target`, if it is
    pub fn skip_reason(
        &self,
        target: &Path,
        stat: Option<&FileStat>,
        structural: &AnalysisResult,
    ) -> Option<&'static str> {
        if !self.enabled {
            return Some("model tier disabled");
        }
        let Some(stat) = stat else {
            return Some("target not readable");
        };
        if !stat.is_dir && stat.size > self.max_model_bytes {
            return Some("content too large");
        }
        if let Some(ext) = target.extension() {
            let ext = ext.to_string_lossy().to_lowercase();
            if self.binary_extensions.iter().any(|b| *b == ext) {
                return Some("binary extension");
            }
        }
        if structural.is_shape_complete() {
            return Some("structural result complete");
        }
        None
    }

    pub fn should_use_model(
        &self,
        target: &Path,
        stat: Option<&FileStat>,
        structural: &AnalysisResult,
    ) -> bool {
        self.skip_reason(target, stat, structural).is_none()
    }
}

// =============================================================================
// Analyzer Set
// =============================================================================

/// The tier analyzers an orchestrator runs
#[derive(Clone)]
pub struct Analyzers {
    pub heuristic: SharedAnalyzer,
    pub structural: SharedAnalyzer,
    pub model: Option<SharedAnalyzer>,
}

impl Analyzers {
    /// Heuristic and structural tiers over `fs`, no model tier
    pub fn local(fs: SharedFileSystem) -> Self {
        Self {
            heuristic: Arc::new(HeuristicAnalyzer::new(fs.clone())),
            structural: Arc::new(StructuralAnalyzer::new(fs)),
            model: None,
        }
    }

    pub fn with_model(mut self, model: SharedAnalyzer) -> Self {
        self.model = Some(model);
        self
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

struct Inner {
    cache: AnalysisCache,
    fs: SharedFileSystem,
    analyzers: Analyzers,
    gate: ModelGate,
    router: Option<Arc<ModelRouter>>,
    in_flight: DashMap<TargetKey, PendingAnalysis>,
}

/// Removes the in-flight entry when the pipeline task ends, even by panic
struct InFlightGuard {
    inner: Arc<Inner>,
    key: TargetKey,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner.in_flight.remove(&self.key);
    }
}

/// Entry point for analysis requests
///
/// Cheap to clone; clones share the cache and the in-flight table.
#[derive(Clone)]
pub struct AnalysisOrchestrator {
    inner: Arc<Inner>,
}

impl AnalysisOrchestrator {
    pub fn new(
        cache: AnalysisCache,
        fs: SharedFileSystem,
        analyzers: Analyzers,
        gate: ModelGate,
    ) -> Self {
        Self::build(cache, fs, analyzers, gate, None)
    }

    fn build(
        cache: AnalysisCache,
        fs: SharedFileSystem,
        analyzers: Analyzers,
        gate: ModelGate,
        router: Option<Arc<ModelRouter>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                cache,
                fs,
                analyzers,
                gate,
                router,
                in_flight: DashMap::new(),
            }),
        }
    }

    /// Wire the full pipeline for `workspace` from configuration
    pub async fn from_config(workspace: &Path, config: &Config) -> Result<Self> {
        let fs = LocalFileSystem::shared();
        let cache = AnalysisCache::open(config.cache_config(workspace), fs.clone()).await;
        let router = Arc::new(ModelRouter::from_config(config)?);

        let templates = match config.template_dir(workspace) {
            Some(dir) => PromptTemplates::with_source(Arc::new(DirTemplateSource::new(dir))),
            None => PromptTemplates::builtin(),
        };

        let analyzers = Analyzers {
            heuristic: Arc::new(HeuristicAnalyzer::new(fs.clone())),
            structural: Arc::new(
                StructuralAnalyzer::new(fs.clone())
                    .with_max_bytes(config.analysis.max_structural_bytes),
            ),
            model: Some(Arc::new(ModelAnalyzer::new(
                fs.clone(),
                Arc::clone(&router),
                templates,
                config.model_settings(),
            ))),
        };

        Ok(Self::build(
            cache,
            fs,
            analyzers,
            config.model_gate(),
            Some(router),
        ))
    }

    pub fn cache(&self) -> &AnalysisCache {
        &self.inner.cache
    }

    /// Full analysis of `target`
    ///
    /// Only an empty target is an error; every other failure degrades to the
    /// best lower-tier result.
    pub async fn analyze(
        &self,
        target: impl AsRef<Path>,
        force_refresh: bool,
    ) -> Result<AnalysisResult> {
        let target = validate_target(target.as_ref())?;
        Ok(self.start(target, force_refresh).result.await)
    }

    /// Cached result or the heuristic one; full analysis continues in the
    /// background and lands in the cache
    ///
    /// Joins the run already in flight for `target` when there is one, so
    /// the heuristic tier never runs twice at once.
    pub async fn quick_analyze(&self, target: impl AsRef<Path>) -> Result<AnalysisResult> {
        let target = validate_target(target.as_ref())?;

        if let Some(hit) = self.inner.cache.get(target).await {
            return Ok(hit);
        }

        let pending = self.start(target, false);
        let mut first = pending.first.clone();
        let published = match first.wait_for(Option::is_some).await {
            Ok(result) => (*result).clone(),
            Err(_) => None,
        };

        match published {
            Some(result) => {
                debug!(target = %target.display(), tier = %result.tier, "Analysis continues in background");
                Ok(result)
            }
            // Run ended before publishing anything
            None => Ok(pending.result.await),
        }
    }

    /// Entry counts by tier, after sweeping expired entries
    pub fn get_stats(&self) -> CacheStats {
        self.inner.cache.cleanup();
        self.inner.cache.stats()
    }

    /// Forget one target, or everything when `target` is `None`
    pub async fn clear_cache(&self, target: Option<&Path>) -> Result<()> {
        match target {
            Some(path) => {
                let removed = self.inner.cache.delete(path);
                info!(target = %path.display(), removed, "Cleared cache entry");
                Ok(())
            }
            None => self.inner.cache.clear().await,
        }
    }

    /// Write pending cache records now
    pub async fn flush(&self) -> Result<()> {
        self.inner.cache.flush().await
    }

    /// Backend health, empty when no router is wired
    pub fn router_health(&self) -> Vec<BackendHealth> {
        self.inner
            .router
            .as_ref()
            .map(|router| router.health())
            .unwrap_or_default()
    }

    /// Number of targets currently being analyzed
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.len()
    }

    /// Join the running pipeline for `target` or spawn a new one
    fn start(&self, target: &Path, force_refresh: bool) -> PendingAnalysis {
        let key = TargetKey::for_path(target);
        match self.inner.in_flight.entry(key.clone()) {
            Entry::Occupied(pending) => {
                debug!(target = %target.display(), "Joining in-flight analysis");
                pending.get().clone()
            }
            Entry::Vacant(slot) => {
                let (publish, first) = watch::channel(None);
                let inner = Arc::clone(&self.inner);
                let path = target.to_path_buf();
                let task = tokio::spawn(async move {
                    let guard = InFlightGuard {
                        inner: Arc::clone(&inner),
                        key,
                    };
                    let result = inner.run_pipeline(&path, force_refresh, &publish).await;
                    drop(guard);
                    result
                });

                let fallback = target.to_path_buf();
                let result = async move {
                    task.await.unwrap_or_else(|e| {
                        error!(target = %fallback.display(), error = %e, "Analysis task failed");
                        AnalysisResult::degenerate(&fallback)
                    })
                }
                .boxed()
                .shared();
                let pending = PendingAnalysis { result, first };

                slot.insert(pending.clone());
                pending
            }
        }
    }
}

fn validate_target(target: &Path) -> Result<&Path> {
    if target.as_os_str().is_empty() || target.to_string_lossy().trim().is_empty() {
        return Err(LensError::InvalidTarget("empty target".to_string()));
    }
    Ok(target)
}

impl Inner {
    #[instrument(skip(self, target, publish), fields(target = %target.display()))]
    async fn run_pipeline(
        &self,
        target: &Path,
        force_refresh: bool,
        publish: &watch::Sender<Option<AnalysisResult>>,
    ) -> AnalysisResult {
        if !force_refresh && let Some(hit) = self.cache.get(target).await {
            publish.send_replace(Some(hit.clone()));
            return hit;
        }

        let heuristic = match self.analyzers.heuristic.analyze(target, None).await {
            Ok(result) => result,
            Err(e) => {
                error!(tier = "heuristic", error = %e, "Heuristic tier failed");
                let degenerate = AnalysisResult::degenerate(target);
                publish.send_replace(Some(degenerate.clone()));
                return degenerate;
            }
        };
        self.cache.set(&heuristic, None).await;
        publish.send_replace(Some(heuristic.clone()));
        let mut cached = heuristic.clone();

        let current = match self.analyzers.structural.analyze(target, Some(&heuristic)).await {
            Ok(structural) => {
                self.cache.set(&structural, None).await;
                cached = structural.clone();
                structural
            }
            Err(e) => {
                warn!(tier = "structural", error = %e, "Structural tier failed, keeping heuristic");
                heuristic.with_fallback(format!("structural: {}", e))
            }
        };

        let result = self.model_tier(target, current).await;
        if result != cached {
            self.cache.set(&result, None).await;
        }
        debug!(tier = %result.tier, "Analysis complete");
        result
    }

    async fn model_tier(&self, target: &Path, current: AnalysisResult) -> AnalysisResult {
        let Some(model) = &self.analyzers.model else {
            return current;
        };

        let stat = self.fs.stat(target).await.ok();
        if let Some(reason) = self.gate.skip_reason(target, stat.as_ref(), &current) {
            debug!(reason, "Skipping model tier");
            return current;
        }

        match model.analyze(target, Some(&current)).await {
            Ok(result) => result,
            Err(e) => {
                warn!(tier = "model", error = %e, "Model tier failed, keeping previous result");
                current.with_fallback(format!("model: {}", e))
            }
        }
    }
}
