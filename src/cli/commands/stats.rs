//! Stats Command
//!
//! Cache counts by tier and model backend health.

use crate::cli::ui::Output;
use crate::cli::{CommandContext, OutputFormat};
use crate::types::Result;

pub async fn run(ctx: &CommandContext, format: OutputFormat) -> Result<()> {
    let orchestrator = ctx.orchestrator().await?;
    let stats = orchestrator.get_stats();
    let health = orchestrator.router_health();

    if format == OutputFormat::Json {
        let status = serde_json::json!({
            "cache": stats,
            "log": orchestrator.cache().log_path(),
            "backends": health,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let out = Output::new();
    out.section("Cache");
    println!("  Entries:     {}", stats.total);
    println!("  Model:       {}", stats.model);
    println!("  Structural:  {}", stats.structural);
    println!("  Heuristic:   {}", stats.heuristic);
    println!("  Error:       {}", stats.error);
    println!("  Log:         {}", orchestrator.cache().log_path().display());

    out.section("Backends");
    for backend in &health {
        let marker = if backend.healthy { "✓" } else { "✗" };
        println!("  {} {:<10} {}", marker, backend.slot.to_string(), backend.name);
    }
    Ok(())
}
