//! Tier Analyzers
//!
//! Three interchangeable strategies of increasing cost:
//! - `heuristic`: path and extension rules, no content read
//! - `structural`: pattern-based extraction of exports and imports
//! - `model`: summarization through the model router
//!
//! Analyzers may fail; the orchestrator decides the fallback.

pub mod heuristic;
pub mod language;
pub mod model;
pub mod structural;

pub use heuristic::HeuristicAnalyzer;
pub use language::{Language, SourceFamily, detect_language};
pub use model::{ModelAnalyzer, ModelSettings};
pub use structural::StructuralAnalyzer;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::types::{AnalysisResult, Result, Tier};

/// One analysis strategy
#[async_trait]
pub trait TierAnalyzer: Send + Sync {
    fn tier(&self) -> Tier;

    /// Analyze `target`, building on the result of the previous tier if any
    async fn analyze(
        &self,
        target: &Path,
        previous: Option<&AnalysisResult>,
    ) -> Result<AnalysisResult>;
}

pub type SharedAnalyzer = Arc<dyn TierAnalyzer>;

/// True when the first `limit` bytes contain a NUL
pub(crate) fn looks_binary(bytes: &[u8], limit: usize) -> bool {
    bytes.iter().take(limit).any(|&b| b == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_looks_binary() {
        assert!(looks_binary(b"PK\x03\x04\x00rest", 64));
        assert!(!looks_binary(b"plain text", 64));
        assert!(!looks_binary(b"0123456789\x00", 4));
    }
}
