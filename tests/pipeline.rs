//! End-to-end pipeline behavior: caching, deduplication, tier fallback and
//! backend failover.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use filelens::ai::PromptTemplates;
use filelens::analyzer::{ModelAnalyzer, ModelSettings};
use filelens::storage::SharedFileSystem;
use filelens::types::BackendError;
use filelens::types::ErrorCategory;
use filelens::{
    AnalysisCache, AnalysisOrchestrator, AnalysisResult, Analyzers, CacheConfig, FileSystem,
    LensError, LocalFileSystem, ModelBackend, ModelGate, ModelInput, ModelRouter, Result, Role,
    RouterConfig, SharedAnalyzer, Tier, TierAnalyzer,
};

// =============================================================================
// Test doubles
// =============================================================================

/// Delegates to another analyzer, counting calls and optionally stalling
struct Counting {
    inner: SharedAnalyzer,
    calls: Arc<AtomicUsize>,
    delay: Duration,
}

impl Counting {
    fn wrap(inner: SharedAnalyzer) -> (SharedAnalyzer, Arc<AtomicUsize>) {
        Self::slow(inner, Duration::ZERO)
    }

    fn slow(inner: SharedAnalyzer, delay: Duration) -> (SharedAnalyzer, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let analyzer = Arc::new(Self {
            inner,
            calls: Arc::clone(&calls),
            delay,
        });
        (analyzer, calls)
    }
}

#[async_trait]
impl TierAnalyzer for Counting {
    fn tier(&self) -> Tier {
        self.inner.tier()
    }

    async fn analyze(
        &self,
        target: &Path,
        previous: Option<&AnalysisResult>,
    ) -> Result<AnalysisResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.analyze(target, previous).await
    }
}

struct AlwaysFails;

#[async_trait]
impl TierAnalyzer for AlwaysFails {
    fn tier(&self) -> Tier {
        Tier::Structural
    }

    async fn analyze(
        &self,
        _target: &Path,
        _previous: Option<&AnalysisResult>,
    ) -> Result<AnalysisResult> {
        Err(LensError::analysis("structural", "parser exploded"))
    }
}

struct StubBackend {
    name: &'static str,
    configured: bool,
    reply: Option<&'static str>,
    calls: AtomicUsize,
}

impl StubBackend {
    fn replying(name: &'static str, reply: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            configured: true,
            reply: Some(reply),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            configured: true,
            reply: None,
            calls: AtomicUsize::new(0),
        })
    }

    fn unconfigured(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            configured: false,
            reply: None,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ModelBackend for StubBackend {
    fn name(&self) -> &str {
        self.name
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn call(&self, _system_prompt: &str, _inputs: &[ModelInput]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.reply {
            Some(text) => Ok(text.to_string()),
            None => Err(BackendError::with_backend(
                ErrorCategory::Transient,
                "503 service unavailable",
                self.name,
            )
            .into()),
        }
    }
}

// =============================================================================
// Fixtures
// =============================================================================

fn fs() -> SharedFileSystem {
    LocalFileSystem::shared()
}

fn cache_config(dir: &TempDir) -> CacheConfig {
    CacheConfig {
        log_path: dir.path().join(".filelens/cache/analysis.jsonl"),
        debounce: Duration::from_millis(20),
        ..CacheConfig::default()
    }
}

async fn orchestrator_with(
    config: CacheConfig,
    analyzers: Analyzers,
    gate: ModelGate,
) -> AnalysisOrchestrator {
    let cache = AnalysisCache::open(config, fs()).await;
    AnalysisOrchestrator::new(cache, fs(), analyzers, gate)
}

fn model_analyzer(primary: Arc<StubBackend>, secondary: Arc<StubBackend>) -> SharedAnalyzer {
    let router = ModelRouter::new(primary, secondary, RouterConfig::default());
    Arc::new(ModelAnalyzer::new(
        fs(),
        Arc::new(router),
        PromptTemplates::builtin(),
        ModelSettings::default(),
    ))
}

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

struct Counters {
    heuristic: Arc<AtomicUsize>,
    structural: Arc<AtomicUsize>,
}

fn counted_local(structural_delay: Duration) -> (Analyzers, Counters) {
    let local = Analyzers::local(fs());
    let (heuristic, heuristic_calls) = Counting::wrap(local.heuristic);
    let (structural, structural_calls) = Counting::slow(local.structural, structural_delay);
    (
        Analyzers {
            heuristic,
            structural,
            model: None,
        },
        Counters {
            heuristic: heuristic_calls,
            structural: structural_calls,
        },
    )
}

// =============================================================================
// Properties
// =============================================================================

#[tokio::test]
async fn repeated_analyze_is_served_from_cache() {
    let dir = TempDir::new().unwrap();
    let target = write(&dir, "lib.rs", "pub fn parse() {}\nuse regex::Regex;\n");
    let (analyzers, counters) = counted_local(Duration::ZERO);
    let orch = orchestrator_with(cache_config(&dir), analyzers, ModelGate::disabled()).await;

    let first = orch.analyze(&target, false).await.unwrap();
    let second = orch.analyze(&target, false).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.tier, Tier::Structural);
    assert_eq!(counters.heuristic.load(Ordering::SeqCst), 1);
    assert_eq!(counters.structural.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn concurrent_requests_share_one_run() {
    let dir = TempDir::new().unwrap();
    let target = write(&dir, "server.ts", "export function serve() {}\n");
    let (analyzers, counters) = counted_local(Duration::from_millis(100));
    let orch = orchestrator_with(cache_config(&dir), analyzers, ModelGate::disabled()).await;

    let calls = (0..8).map(|_| {
        let orch = orch.clone();
        let target = target.clone();
        async move { orch.analyze(&target, false).await.unwrap() }
    });
    let results = futures::future::join_all(calls).await;

    assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(counters.heuristic.load(Ordering::SeqCst), 1);
    assert_eq!(counters.structural.load(Ordering::SeqCst), 1);
    assert_eq!(orch.in_flight(), 0);
}

#[tokio::test]
async fn spawned_run_finishes_without_callers() {
    let dir = TempDir::new().unwrap();
    let target = write(&dir, "main.go", "package main\n\nfunc main() {}\n");
    let (analyzers, counters) = counted_local(Duration::from_millis(50));
    let orch = orchestrator_with(cache_config(&dir), analyzers, ModelGate::disabled()).await;

    // Abandon the request after it has started
    let abandoned = tokio::time::timeout(Duration::from_millis(10), orch.analyze(&target, false));
    assert!(abandoned.await.is_err());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(orch.in_flight(), 0);
    assert_eq!(orch.get_stats().structural, 1);

    orch.analyze(&target, false).await.unwrap();
    assert_eq!(counters.structural.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn content_change_invalidates_cached_result() {
    let dir = TempDir::new().unwrap();
    let target = write(&dir, "README.md", "# First Title\n");
    let (analyzers, counters) = counted_local(Duration::ZERO);
    let orch = orchestrator_with(cache_config(&dir), analyzers, ModelGate::disabled()).await;

    let before = orch.analyze(&target, false).await.unwrap();
    assert_eq!(before.summary, "First Title");

    std::fs::write(&target, "# Second Title\n").unwrap();
    let after = orch.analyze(&target, false).await.unwrap();

    assert_eq!(after.summary, "Second Title");
    assert_eq!(counters.structural.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn expired_entries_are_recomputed() {
    let dir = TempDir::new().unwrap();
    let target = write(&dir, "build.rs", "fn main() {}\n");
    let (analyzers, counters) = counted_local(Duration::ZERO);
    let config = CacheConfig {
        ttl: Duration::ZERO,
        ..cache_config(&dir)
    };
    let orch = orchestrator_with(config, analyzers, ModelGate::disabled()).await;

    orch.analyze(&target, false).await.unwrap();
    orch.analyze(&target, false).await.unwrap();

    assert_eq!(counters.heuristic.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn quick_analyze_joins_running_pipeline() {
    let dir = TempDir::new().unwrap();
    let target = write(&dir, "routes.ts", "export function route() {}\n");
    let local = Analyzers::local(fs());
    let (heuristic, heuristic_calls) = Counting::slow(local.heuristic, Duration::from_millis(100));
    let analyzers = Analyzers { heuristic, ..local };
    let orch = orchestrator_with(cache_config(&dir), analyzers, ModelGate::disabled()).await;

    let running = tokio::spawn({
        let orch = orch.clone();
        let target = target.clone();
        async move { orch.analyze(&target, false).await.unwrap() }
    });
    while orch.in_flight() == 0 {
        tokio::task::yield_now().await;
    }

    let quick = orch.quick_analyze(&target).await.unwrap();
    let full = running.await.unwrap();

    assert_eq!(heuristic_calls.load(Ordering::SeqCst), 1);
    assert_eq!(quick.tier, Tier::Heuristic);
    assert_eq!(full.tier, Tier::Structural);
    // The quick path never overwrites the better tier
    assert_eq!(orch.cache().get(&target).await, Some(full));
}

#[cfg(not(any(windows, target_os = "macos")))]
#[tokio::test]
async fn case_distinct_files_are_separate_targets() {
    let dir = TempDir::new().unwrap();
    let upper = write(&dir, "Foo.rs", "pub fn upper() {}\n");
    let lower = write(&dir, "foo.rs", "pub fn lower() {}\n");
    let (analyzers, counters) = counted_local(Duration::from_millis(50));
    let orch = orchestrator_with(cache_config(&dir), analyzers, ModelGate::disabled()).await;

    let (a, b) = tokio::join!(orch.analyze(&upper, false), orch.analyze(&lower, false));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.target, upper.display().to_string());
    assert_eq!(b.target, lower.display().to_string());
    assert_eq!(a.exports, vec!["upper"]);
    assert_eq!(b.exports, vec!["lower"]);
    assert_eq!(counters.structural.load(Ordering::SeqCst), 2);
    assert_eq!(orch.analyze(&lower, false).await.unwrap(), b);
}

#[tokio::test]
async fn force_refresh_bypasses_cache() {
    let dir = TempDir::new().unwrap();
    let target = write(&dir, "util.py", "def helper():\n    pass\n");
    let (analyzers, counters) = counted_local(Duration::ZERO);
    let orch = orchestrator_with(cache_config(&dir), analyzers, ModelGate::disabled()).await;

    orch.analyze(&target, false).await.unwrap();
    orch.analyze(&target, true).await.unwrap();

    assert_eq!(counters.structural.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn failing_structural_tier_falls_back_to_heuristic() {
    let dir = TempDir::new().unwrap();
    let target = write(&dir, "index.js", "module.exports = {};\n");
    let analyzers = Analyzers {
        structural: Arc::new(AlwaysFails),
        ..Analyzers::local(fs())
    };
    let orch = orchestrator_with(cache_config(&dir), analyzers, ModelGate::disabled()).await;

    let result = orch.analyze(&target, false).await.unwrap();
    let heuristic = filelens::analyzer::heuristic::classify(&target, false);

    assert_eq!(result.tier, Tier::Heuristic);
    assert_eq!(result.summary, heuristic.summary);
    assert_eq!(result.roles, heuristic.roles);
    assert!(
        result
            .fallback
            .as_deref()
            .is_some_and(|reason| reason.starts_with("structural:"))
    );

    // The tagged result is what the cache serves next time
    assert_eq!(orch.analyze(&target, false).await.unwrap(), result);
}

#[tokio::test]
async fn model_failover_reaches_secondary() {
    let dir = TempDir::new().unwrap();
    let target = write(&dir, "handler.rs", "pub fn handle() {}\n");
    let primary = StubBackend::failing("primary");
    let secondary = StubBackend::replying(
        "secondary",
        "Here you go:\n{\"summary\": \"Request handler\", \"roles\": [\"service\"]}",
    );
    let analyzers =
        Analyzers::local(fs()).with_model(model_analyzer(primary.clone(), secondary.clone()));
    let orch = orchestrator_with(cache_config(&dir), analyzers, ModelGate::default()).await;

    let result = orch.analyze(&target, false).await.unwrap();

    assert_eq!(result.tier, Tier::Model);
    assert_eq!(result.summary, "Request handler");
    assert!(result.roles.contains(&Role::Service));
    assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
    assert_eq!(secondary.calls.load(Ordering::SeqCst), 1);
    assert_eq!(orch.get_stats().model, 1);
}

#[tokio::test]
async fn cache_survives_restart() {
    let dir = TempDir::new().unwrap();
    let target = write(&dir, "Cargo.toml", "[package]\nname = \"demo\"\n");

    let first = {
        let orch =
            orchestrator_with(cache_config(&dir), Analyzers::local(fs()), ModelGate::disabled())
                .await;
        let result = orch.analyze(&target, false).await.unwrap();
        orch.flush().await.unwrap();
        result
    };

    let (analyzers, counters) = counted_local(Duration::ZERO);
    let orch = orchestrator_with(cache_config(&dir), analyzers, ModelGate::disabled()).await;
    let second = orch.analyze(&target, false).await.unwrap();

    assert_eq!(second, first);
    assert_eq!(counters.heuristic.load(Ordering::SeqCst), 0);
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn scenario_readme_model_failure_keeps_structural() {
    let dir = TempDir::new().unwrap();
    let target = write(&dir, "readme.md", "# Demo Project\n\n## Usage\n\nRun it.\n");
    let (model, model_calls) = Counting::wrap(model_analyzer(
        StubBackend::unconfigured("primary"),
        StubBackend::unconfigured("secondary"),
    ));
    let analyzers = Analyzers::local(fs()).with_model(model);
    let orch = orchestrator_with(cache_config(&dir), analyzers, ModelGate::default()).await;

    let heuristic = filelens::analyzer::heuristic::classify(&target, false);
    assert!(heuristic.roles.contains(&Role::Document));
    assert_eq!(heuristic.language.as_deref(), Some("markdown"));

    let result = orch.analyze(&target, false).await.unwrap();

    assert_eq!(model_calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.tier, Tier::Structural);
    assert_eq!(result.summary, "Demo Project");
    assert_eq!(result.exports, vec!["Usage"]);
    assert!(result.roles.contains(&Role::Document));
    assert!(result.fallback.is_some());
}

#[tokio::test]
async fn scenario_package_json_scripts() {
    let dir = TempDir::new().unwrap();
    let target = write(&dir, "package.json", r#"{"name":"demo","scripts":{"build":""}}"#);
    let orch =
        orchestrator_with(cache_config(&dir), Analyzers::local(fs()), ModelGate::disabled()).await;

    let result = orch.analyze(&target, false).await.unwrap();

    assert_eq!(result.tier, Tier::Structural);
    assert_eq!(result.exports, vec!["build"]);
    assert!(result.summary.contains("demo"));
}

#[tokio::test]
async fn scenario_binary_video_never_reaches_model() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("big")).unwrap();
    let target = dir.path().join("big/video.mp4");
    std::fs::write(&target, b"\x00\x00\x00\x18ftypmp42\x00\x00\x00\x00").unwrap();

    let (model, model_calls) = Counting::wrap(model_analyzer(
        StubBackend::replying("primary", r#"{"summary":"should not happen"}"#),
        StubBackend::unconfigured("secondary"),
    ));
    let analyzers = Analyzers::local(fs()).with_model(model);
    let orch = orchestrator_with(cache_config(&dir), analyzers, ModelGate::default()).await;

    let (a, b) = tokio::join!(orch.analyze(&target, false), orch.analyze(&target, false));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a, b);
    assert_eq!(model_calls.load(Ordering::SeqCst), 0);
    assert!(a.roles.contains(&Role::Asset));
    assert_ne!(a.tier, Tier::Model);

    let stat = fs().stat(&target).await.unwrap();
    assert_eq!(
        ModelGate::default().skip_reason(&target, Some(&stat), &a),
        Some("binary extension")
    );
}
