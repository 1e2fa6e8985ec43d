//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global (`<config_dir>/filelens/`) and project (`.filelens/`) level
//! configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ai::RouterConfig;
use crate::analyzer::ModelSettings;
use crate::constants::{analysis, cache, router};
use crate::orchestrator::ModelGate;
use crate::storage::CacheConfig;
use crate::types::{LensError, Result};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Result cache settings
    pub cache: CacheSettings,

    /// Tier analyzer settings
    pub analysis: AnalysisSettings,

    /// Backend routing settings
    pub router: RouterSettings,

    /// Preferred backend for ordinary requests
    pub primary: BackendConfig,

    /// Cheaper backend for large or batched requests
    pub secondary: BackendConfig,

    /// Prompt template overrides
    pub templates: TemplateSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            cache: CacheSettings::default(),
            analysis: AnalysisSettings::default(),
            router: RouterSettings::default(),
            primary: BackendConfig::default(),
            secondary: BackendConfig::ollama(),
            templates: TemplateSettings::default(),
        }
    }
}

fn positive(value: u64, name: &str) -> Result<()> {
    if value == 0 {
        return Err(LensError::Config(format!("{} must be greater than 0", name)));
    }
    Ok(())
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `LensError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        positive(self.cache.max_entries as u64, "cache.max_entries")?;
        positive(self.cache.ttl_secs, "cache.ttl_secs")?;
        if self.cache.compact_factor < 2 {
            return Err(LensError::Config(format!(
                "cache.compact_factor must be at least 2, got {}",
                self.cache.compact_factor
            )));
        }

        positive(self.analysis.max_structural_bytes, "analysis.max_structural_bytes")?;
        positive(self.analysis.max_model_bytes, "analysis.max_model_bytes")?;
        positive(self.analysis.max_prompt_chars as u64, "analysis.max_prompt_chars")?;

        positive(self.router.call_timeout_secs, "router.call_timeout_secs")?;
        positive(self.router.large_input_chars as u64, "router.large_input_chars")?;
        positive(self.router.batch_threshold as u64, "router.batch_threshold")?;

        for (name, backend) in [("primary", &self.primary), ("secondary", &self.secondary)] {
            if !(0.0..=2.0).contains(&backend.temperature) {
                return Err(LensError::Config(format!(
                    "{}.temperature must be between 0.0 and 2.0, got {}",
                    name, backend.temperature
                )));
            }
            positive(backend.timeout_secs, &format!("{}.timeout_secs", name))?;
        }

        Ok(())
    }

    /// Cache settings resolved against `workspace`
    pub fn cache_config(&self, workspace: &Path) -> CacheConfig {
        let dir = if self.cache.dir.is_absolute() {
            self.cache.dir.clone()
        } else {
            workspace.join(&self.cache.dir)
        };
        CacheConfig {
            log_path: dir.join(cache::LOG_FILE),
            ttl: Duration::from_secs(self.cache.ttl_secs),
            max_entries: self.cache.max_entries,
            debounce: Duration::from_millis(self.cache.debounce_ms),
            compact_factor: self.cache.compact_factor,
        }
    }

    pub fn model_gate(&self) -> ModelGate {
        ModelGate {
            enabled: self.analysis.model_enabled,
            max_model_bytes: self.analysis.max_model_bytes,
            binary_extensions: self
                .analysis
                .binary_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    pub fn model_settings(&self) -> ModelSettings {
        ModelSettings {
            max_model_bytes: self.analysis.max_model_bytes,
            max_prompt_chars: self.analysis.max_prompt_chars,
        }
    }

    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            health_check_interval: Duration::from_secs(self.router.health_check_interval_secs),
            large_input_chars: self.router.large_input_chars,
            batch_threshold: self.router.batch_threshold,
            call_timeout: Duration::from_secs(self.router.call_timeout_secs),
        }
    }

    /// Template directory resolved against `workspace`
    pub fn template_dir(&self, workspace: &Path) -> Option<PathBuf> {
        self.templates.dir.as_ref().map(|dir| {
            if dir.is_absolute() {
                dir.clone()
            } else {
                workspace.join(dir)
            }
        })
    }
}

// =============================================================================
// Cache Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Cache directory, relative to the workspace unless absolute
    pub dir: PathBuf,

    /// Entry time-to-live in seconds
    pub ttl_secs: u64,

    /// Maximum entries kept in memory
    pub max_entries: usize,

    /// Write-through debounce window in milliseconds
    pub debounce_ms: u64,

    /// Log lines per live entry before the log is compacted
    pub compact_factor: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(cache::DEFAULT_DIR),
            ttl_secs: cache::DEFAULT_TTL_SECS,
            max_entries: cache::DEFAULT_MAX_ENTRIES,
            debounce_ms: cache::DEFAULT_DEBOUNCE_MS,
            compact_factor: cache::DEFAULT_COMPACT_FACTOR,
        }
    }
}

// =============================================================================
// Analysis Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Run the model tier at all
    pub model_enabled: bool,

    /// Files above this size skip the structural tier
    pub max_structural_bytes: u64,

    /// Files above this size skip the model tier
    pub max_model_bytes: u64,

    /// Prompt content budget before head/tail truncation
    pub max_prompt_chars: usize,

    /// Extensions never sent to the model tier
    pub binary_extensions: Vec<String>,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            model_enabled: true,
            max_structural_bytes: analysis::MAX_STRUCTURAL_BYTES,
            max_model_bytes: analysis::MAX_MODEL_BYTES,
            max_prompt_chars: analysis::MAX_PROMPT_CHARS,
            binary_extensions: analysis::BINARY_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

// =============================================================================
// Router Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterSettings {
    /// Minimum seconds between backend health checks
    pub health_check_interval_secs: u64,

    /// Total input characters that make a request "large"
    pub large_input_chars: usize,

    /// Input count that makes a request "batched"
    pub batch_threshold: usize,

    /// Per-call timeout in seconds
    pub call_timeout_secs: u64,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            health_check_interval_secs: router::HEALTH_CHECK_INTERVAL_SECS,
            large_input_chars: router::LARGE_INPUT_CHARS,
            batch_threshold: router::BATCH_THRESHOLD,
            call_timeout_secs: router::CALL_TIMEOUT_SECS,
        }
    }
}

// =============================================================================
// Backend Configuration
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// OpenAI-compatible chat completions
    OpenAi,
    /// Local Ollama server
    Ollama,
}

/// Model backend settings
///
/// The API key is never serialized and is redacted in debug output.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,

    /// Model name (backend-specific default when unset)
    pub model: Option<String>,

    /// API key; prefer `api_key_env`
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Environment variable holding the API key
    pub api_key_env: Option<String>,

    /// Base URL of the API
    pub endpoint: Option<String>,

    pub temperature: f32,

    pub max_tokens: usize,

    /// HTTP client timeout in seconds
    pub timeout_secs: u64,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("kind", &self.kind)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_key_env", &self.api_key_env)
            .field("endpoint", &self.endpoint)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::OpenAi,
            model: None,
            api_key: None,
            api_key_env: Some("OPENAI_API_KEY".to_string()),
            endpoint: None,
            temperature: 0.0,
            max_tokens: 1024,
            timeout_secs: crate::constants::network::DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl BackendConfig {
    /// Ollama backend without an endpoint; configure one to enable it
    pub fn ollama() -> Self {
        Self {
            kind: BackendKind::Ollama,
            api_key_env: None,
            ..Self::default()
        }
    }
}

// =============================================================================
// Template Configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateSettings {
    /// Directory containing `file.md` and `directory.md`
    pub dir: Option<PathBuf>,
}
