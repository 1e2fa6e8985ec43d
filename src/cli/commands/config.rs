//! Config Command
//!
//! Usage:
//!   filelens config show [--format json]
//!   filelens config path
//!   filelens config init [--force]

use std::path::Path;

use console::style;

use crate::cli::CommandContext;
use crate::cli::ui::Output;
use crate::config::ConfigLoader;
use crate::types::{LensError, Result};

/// Show the merged effective configuration
pub fn show(ctx: &CommandContext, as_json: bool) -> Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(&ctx.config)?);
    } else {
        let rendered = toml::to_string_pretty(&ctx.config)
            .map_err(|e| LensError::Config(format!("Failed to render config: {}", e)))?;
        println!("{}", rendered);
    }
    Ok(())
}

fn path_line(label: &str, path: &Path) {
    let marker = if path.exists() {
        style("✓").green()
    } else {
        style("✗").dim()
    };
    println!("  {} {:<8} {}", marker, label, path.display());
}

/// Show configuration file locations in resolution order
pub fn path(workspace: &Path) -> Result<()> {
    println!("Configuration files (later overrides earlier):");
    match ConfigLoader::global_config_path() {
        Some(global) => path_line("global", &global),
        None => println!("  ✗ global   (no config directory on this platform)"),
    }
    path_line("project", &ConfigLoader::project_config_path(workspace));
    println!("  Environment: FILELENS_* (nested keys joined with __)");
    Ok(())
}

/// Initialize project configuration
pub fn init(workspace: &Path, force: bool) -> Result<()> {
    let config_path = ConfigLoader::init_project(workspace, force)?;
    Output::new().success("Initialized project configuration");
    println!("  Config: {}", config_path.display());
    Ok(())
}
