//! filelens - Progressive, Cached File Analysis
//!
//! Answers "what is this file or directory for?" in three tiers of
//! increasing cost, caching every step:
//!
//! - **Heuristic**: path and extension rules, instant
//! - **Structural**: pattern extraction of exports, imports and traits
//! - **Model**: summarization through a primary/secondary backend router
//!
//! ## Quick Start
//!
//! ```ignore
//! use filelens::{AnalysisOrchestrator, ConfigLoader};
//!
//! let config = ConfigLoader::load(&workspace)?;
//! let orchestrator = AnalysisOrchestrator::from_config(&workspace, &config).await?;
//! let result = orchestrator.analyze("src/main.rs", false).await?;
//! println!("{}", result.summary);
//! ```
//!
//! ## Modules
//!
//! - [`orchestrator`]: tier pipeline, in-flight deduplication, model gate
//! - [`analyzer`]: heuristic, structural and model tiers
//! - [`ai`]: model backends, router, prompts, response parsing
//! - [`storage`]: filesystem access, fingerprints, persistent cache
//! - [`config`]: layered configuration

pub mod ai;
pub mod analyzer;
pub mod cli;
pub mod config;
pub mod constants;
pub mod orchestrator;
pub mod storage;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

pub use config::{Config, ConfigLoader};
pub use orchestrator::{AnalysisOrchestrator, Analyzers, ModelGate};
pub use types::{AnalysisResult, LensError, Result, Role, Tier};

pub use ai::{ModelBackend, ModelInput, ModelRouter, RouterConfig};
pub use analyzer::{SharedAnalyzer, TierAnalyzer};
pub use storage::{AnalysisCache, CacheConfig, CacheStats, FileSystem, LocalFileSystem};
