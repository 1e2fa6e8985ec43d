//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (`<config_dir>/filelens/config.toml`)
//! 3. Project config (`<workspace>/.filelens/config.toml`)
//! 4. Environment variables (`FILELENS_*`, nested keys split on `__`)

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use tracing::{debug, info};

use super::types::Config;
use crate::types::{LensError, Result};

const PROJECT_DIR: &str = ".filelens";
const CONFIG_FILE: &str = "config.toml";
const ENV_PREFIX: &str = "FILELENS_";

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain using Figment:
    /// defaults → global → project → env vars
    pub fn load(workspace: &Path) -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            debug!(path = %global_path.display(), "Loading global config");
            figment = figment.merge(Toml::file(&global_path));
        }

        let project_path = Self::project_config_path(workspace);
        if project_path.exists() {
            debug!(path = %project_path.display(), "Loading project config");
            figment = figment.merge(Toml::file(&project_path));
        }

        // FILELENS_CACHE__TTL_SECS -> cache.ttl_secs
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment
            .extract()
            .map_err(|e| LensError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file only
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| LensError::Config(format!("Configuration error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Platform config directory for filelens
    pub fn global_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "filelens").map(|dirs| dirs.config_dir().to_path_buf())
    }

    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join(CONFIG_FILE))
    }

    pub fn project_dir(workspace: &Path) -> PathBuf {
        workspace.join(PROJECT_DIR)
    }

    pub fn project_config_path(workspace: &Path) -> PathBuf {
        Self::project_dir(workspace).join(CONFIG_FILE)
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Write a commented default project config; returns its path
    ///
    /// An existing file is kept unless `force` is set.
    pub fn init_project(workspace: &Path, force: bool) -> Result<PathBuf> {
        let project_dir = Self::project_dir(workspace);
        fs::create_dir_all(project_dir.join("cache"))?;

        let config_path = project_dir.join(CONFIG_FILE);
        if !config_path.exists() || force {
            fs::write(&config_path, Self::default_project_config())?;
            info!(path = %config_path.display(), "Created project config");
        } else {
            info!(path = %config_path.display(), "Project config exists");
        }
        Ok(config_path)
    }

    fn default_project_config() -> String {
        r#"# filelens project configuration
# Overrides the global config; FILELENS_* environment variables override both
# (nested keys use a double underscore, e.g. FILELENS_CACHE__TTL_SECS).

version = "1.0"

[cache]
# dir = ".filelens/cache"
ttl_secs = 604800
max_entries = 2000
debounce_ms = 500

[analysis]
model_enabled = true
max_model_bytes = 262144
max_prompt_chars = 12000

[router]
health_check_interval_secs = 60
large_input_chars = 8000
batch_threshold = 3
call_timeout_secs = 120

# Primary backend: OpenAI-compatible chat completions
[primary]
kind = "openai"
api_key_env = "OPENAI_API_KEY"
# model = "gpt-4o-mini"
# endpoint = "https://api.openai.com/v1"

# Secondary backend, preferred for large or batched requests
[secondary]
kind = "ollama"
# endpoint = "http://localhost:11434"
# model = "llama3:latest"

[templates]
# dir = ".filelens/templates"
"#
        .to_string()
    }
}
