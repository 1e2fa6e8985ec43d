//! Analyze Commands
//!
//! Usage:
//!   filelens analyze <PATH> [--force] [--format json]
//!   filelens quick <PATH> [--format json]

use std::path::Path;

use crate::cli::ui::Output;
use crate::cli::{CommandContext, OutputFormat};
use crate::types::{AnalysisResult, Result};

fn print(result: &AnalysisResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(result)?),
        OutputFormat::Text => Output::new().result(result),
    }
    Ok(())
}

pub async fn run(
    ctx: &CommandContext,
    target: &Path,
    force: bool,
    format: OutputFormat,
) -> Result<()> {
    let orchestrator = ctx.orchestrator().await?;
    let result = orchestrator.analyze(ctx.resolve(target), force).await?;
    orchestrator.flush().await?;
    print(&result, format)
}

/// Print the fast result, then wait for the background analysis
pub async fn quick(ctx: &CommandContext, target: &Path, format: OutputFormat) -> Result<()> {
    let orchestrator = ctx.orchestrator().await?;
    let target = ctx.resolve(target);

    let quick = orchestrator.quick_analyze(&target).await?;
    print(&quick, format)?;

    // Joins the in-flight run so the upgraded result is cached before exit
    let full = orchestrator.analyze(&target, false).await?;
    orchestrator.flush().await?;
    if format == OutputFormat::Text && full.tier != quick.tier {
        Output::new().info(&format!("Cached {} result", full.tier));
    }
    Ok(())
}
