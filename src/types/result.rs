//! Analysis Result Model
//!
//! The unit of work passed between tiers and stored in the cache.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::result::{
    ERROR_SCHEMA, HEURISTIC_SCHEMA, MAX_LIST_ITEMS, MODEL_SCHEMA, STRUCTURAL_SCHEMA,
};

/// Analysis tier that produced a result, ordered by cost
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Degenerate fallback, produced when every tier failed
    Error,
    Heuristic,
    Structural,
    Model,
}

impl Tier {
    pub fn schema_version(&self) -> &'static str {
        match self {
            Tier::Error => ERROR_SCHEMA,
            Tier::Heuristic => HEURISTIC_SCHEMA,
            Tier::Structural => STRUCTURAL_SCHEMA,
            Tier::Model => MODEL_SCHEMA,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Error => write!(f, "error"),
            Tier::Heuristic => write!(f, "heuristic"),
            Tier::Structural => write!(f, "structural"),
            Tier::Model => write!(f, "model"),
        }
    }
}

/// Categorical tag describing what an entry is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Entry,
    Service,
    Config,
    Test,
    Document,
    Component,
    Utility,
    Style,
    Asset,
    Build,
    Types,
    Source,
    Script,
    Data,
    Directory,
    Module,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Entry => "entry",
            Role::Service => "service",
            Role::Config => "config",
            Role::Test => "test",
            Role::Document => "document",
            Role::Component => "component",
            Role::Utility => "utility",
            Role::Style => "style",
            Role::Asset => "asset",
            Role::Build => "build",
            Role::Types => "types",
            Role::Source => "source",
            Role::Script => "script",
            Role::Data => "data",
            Role::Directory => "directory",
            Role::Module => "module",
        }
    }

    /// Parse a role name as returned by a model; unknown names yield `None`
    pub fn parse(name: &str) -> Option<Self> {
        let normalized = name.trim().to_lowercase();
        let role = match normalized.as_str() {
            "entry" | "entrypoint" | "entry-point" => Role::Entry,
            "service" | "api" => Role::Service,
            "config" | "configuration" => Role::Config,
            "test" | "tests" => Role::Test,
            "document" | "documentation" | "docs" => Role::Document,
            "component" | "ui" => Role::Component,
            "utility" | "util" | "helper" => Role::Utility,
            "style" | "styles" => Role::Style,
            "asset" | "assets" => Role::Asset,
            "build" => Role::Build,
            "types" | "type" => Role::Types,
            "source" => Role::Source,
            "script" => Role::Script,
            "data" => Role::Data,
            "directory" | "folder" => Role::Directory,
            "module" | "package" => Role::Module,
            _ => return None,
        };
        Some(role)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured summary of a file or directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub target: String,
    pub summary: String,
    #[serde(default)]
    pub roles: BTreeSet<Role>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub exports: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub related: Vec<String>,
    pub schema_version: String,
    pub produced_at: DateTime<Utc>,
    pub tier: Tier,
    /// Reason a higher tier was attempted and abandoned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
}

impl AnalysisResult {
    pub fn new(target: impl Into<String>, tier: Tier, summary: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            summary: summary.into(),
            roles: BTreeSet::new(),
            language: None,
            exports: Vec::new(),
            dependencies: Vec::new(),
            related: Vec::new(),
            schema_version: tier.schema_version().to_string(),
            produced_at: Utc::now(),
            tier,
            fallback: None,
        }
    }

    /// Minimal always-safe result: the bare path, no roles
    pub fn degenerate(target: &Path) -> Self {
        let display = target.display().to_string();
        Self::new(display.clone(), Tier::Error, display)
    }

    /// Copy of `self` promoted to `tier`, with a fresh timestamp and schema
    pub fn promote(&self, tier: Tier) -> Self {
        let mut next = self.clone();
        next.tier = tier;
        next.schema_version = tier.schema_version().to_string();
        next.produced_at = Utc::now();
        next.fallback = None;
        next
    }

    pub fn with_fallback(mut self, reason: impl Into<String>) -> Self {
        self.fallback = Some(reason.into());
        self
    }

    /// Deduplicate and cap the list fields
    pub fn bounded(mut self) -> Self {
        self.exports = bound_list(std::mem::take(&mut self.exports));
        self.dependencies = bound_list(std::mem::take(&mut self.dependencies));
        self.related = bound_list(std::mem::take(&mut self.related));
        self
    }

    /// Summary, exports and dependencies are all present.
    ///
    /// A shape-complete structural result is not worth a model call.
    pub fn is_shape_complete(&self) -> bool {
        !self.summary.trim().is_empty() && !self.exports.is_empty() && !self.dependencies.is_empty()
    }
}

/// Keep the first occurrence of each non-empty item, up to `MAX_LIST_ITEMS`
pub fn bound_list(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty() && seen.insert(item.clone()))
        .take(MAX_LIST_ITEMS)
        .collect()
}
