//! CLI Common Utilities
//!
//! Shared context for command handlers.

use std::path::{Path, PathBuf};

use clap::ValueEnum;

use crate::config::{Config, ConfigLoader};
use crate::orchestrator::AnalysisOrchestrator;
use crate::types::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Command execution context
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Workspace root; cache and project config live under it
    pub workspace: PathBuf,
    /// Merged configuration
    pub config: Config,
}

impl CommandContext {
    /// Resolve the workspace (default: current directory) and load config
    pub fn load(workspace: Option<PathBuf>) -> Result<Self> {
        let workspace = match workspace {
            Some(dir) => dir,
            None => std::env::current_dir()?,
        };
        let config = ConfigLoader::load(&workspace)?;
        Ok(Self { workspace, config })
    }

    pub async fn orchestrator(&self) -> Result<AnalysisOrchestrator> {
        AnalysisOrchestrator::from_config(&self.workspace, &self.config).await
    }

    /// Relative paths are taken from the workspace
    pub fn resolve(&self, target: &Path) -> PathBuf {
        if target.is_absolute() {
            target.to_path_buf()
        } else {
            self.workspace.join(target)
        }
    }
}
