//! Configuration Management
//!
//! Unified configuration system with hierarchical resolution:
//! 1. Built-in defaults
//! 2. Global config (`<config_dir>/filelens/config.toml`)
//! 3. Project config (`.filelens/config.toml`)
//! 4. Environment variables (`FILELENS_*`)

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::*;
