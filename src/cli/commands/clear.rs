//! Clear Command
//!
//! Drops one cached result, or the whole cache.

use std::path::Path;

use crate::cli::CommandContext;
use crate::cli::ui::Output;
use crate::types::Result;

pub async fn run(ctx: &CommandContext, target: Option<&Path>) -> Result<()> {
    let orchestrator = ctx.orchestrator().await?;
    let out = Output::new();

    match target {
        Some(path) => {
            let path = ctx.resolve(path);
            orchestrator.clear_cache(Some(&path)).await?;
            orchestrator.flush().await?;
            out.success(&format!("Cleared {}", path.display()));
        }
        None => {
            let total = orchestrator.get_stats().total;
            orchestrator.clear_cache(None).await?;
            out.success(&format!("Cleared {} cached results", total));
        }
    }
    Ok(())
}
