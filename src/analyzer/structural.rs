//! Structural Tier
//!
//! Lightweight extraction of exports, imports and traits using regular
//! expressions, plus manifest parsing for `package.json` and `Cargo.toml`.
//! This is not a parser: patterns are line-oriented and tolerate code that
//! would not compile.
//!
//! Traits found in the content ("contains tests", "async code", "has entry
//! point") are appended to the heuristic summary rather than replacing it.

use std::path::Path;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use super::heuristic::classify;
use super::language::{Language, SourceFamily};
use super::{TierAnalyzer, looks_binary};
use crate::constants::analysis::{BINARY_SNIFF_BYTES, MAX_STRUCTURAL_BYTES};
use crate::storage::{DirEntryInfo, SharedFileSystem};
use crate::types::{AnalysisResult, LensError, Result, Role, Tier};

const TRAIT_TESTS: &str = "contains tests";
const TRAIT_ASYNC: &str = "async code";
const TRAIT_ENTRY: &str = "has entry point";

// =============================================================================
// Source Patterns
// =============================================================================

fn pattern(re: &str) -> Regex {
    Regex::new(re).expect("static pattern compiles")
}

struct SourcePatterns {
    exports: Vec<Regex>,
    imports: Vec<Regex>,
    tests: Regex,
    asynchronous: Regex,
    entry: Regex,
    /// Imports ignored as dependencies
    internal: &'static [&'static str],
}

static RUST: LazyLock<SourcePatterns> = LazyLock::new(|| SourcePatterns {
    exports: vec![pattern(
        r"(?m)^\s*pub\s+(?:async\s+)?(?:unsafe\s+)?(?:fn|struct|enum|trait|type|const|static|mod)\s+([A-Za-z_][A-Za-z0-9_]*)",
    )],
    imports: vec![
        pattern(r"(?m)^\s*(?:pub\s+)?use\s+([A-Za-z_][A-Za-z0-9_]*)"),
        pattern(r"(?m)^\s*extern\s+crate\s+([A-Za-z_][A-Za-z0-9_]*)"),
    ],
    tests: pattern(r"#\[(?:cfg\(test\)|test|tokio::test)\]"),
    asynchronous: pattern(r"\basync\s+(?:fn|move|\{)|\.await\b"),
    entry: pattern(r"(?m)^\s*(?:pub\s+)?(?:async\s+)?fn\s+main\s*\("),
    internal: &["crate", "self", "super", "std", "core", "alloc"],
});

static SCRIPT: LazyLock<SourcePatterns> = LazyLock::new(|| SourcePatterns {
    exports: vec![
        pattern(
            r"(?m)^\s*export\s+(?:default\s+)?(?:declare\s+)?(?:abstract\s+)?(?:async\s+)?(?:function\*?|class|const|let|var|interface|type|enum)\s+([A-Za-z_$][A-Za-z0-9_$]*)",
        ),
        pattern(r"(?m)^\s*export\s+\{\s*([A-Za-z_$][A-Za-z0-9_$]*)"),
        pattern(r"(?m)^\s*module\.exports\.([A-Za-z_$][A-Za-z0-9_$]*)\s*="),
    ],
    imports: vec![
        pattern(r#"(?m)^\s*import\s+(?:type\s+)?(?:[^'"]*?\s+from\s+)?['"]([^'"]+)['"]"#),
        pattern(r#"\brequire\(\s*['"]([^'"]+)['"]\s*\)"#),
        pattern(r#"(?m)^\s*export\s+(?:\*|\{[^}]*\})\s+from\s+['"]([^'"]+)['"]"#),
    ],
    tests: pattern(r"(?m)^\s*(?:describe|it|test)\s*\("),
    asynchronous: pattern(r"\basync\s|\bawait\s|\.then\("),
    entry: pattern(r"\.listen\s*\(|createRoot\s*\(|ReactDOM\.render\s*\("),
    internal: &[],
});

static PYTHON: LazyLock<SourcePatterns> = LazyLock::new(|| SourcePatterns {
    exports: vec![pattern(
        r"(?m)^(?:async\s+)?(?:def|class)\s+([A-Za-z][A-Za-z0-9_]*)",
    )],
    imports: vec![
        pattern(r"(?m)^\s*from\s+(\.*[A-Za-z0-9_.]*)\s+import\b"),
        pattern(r"(?m)^\s*import\s+([A-Za-z_][A-Za-z0-9_.]*)"),
    ],
    tests: pattern(r"(?m)^\s*(?:async\s+)?def\s+test_|\bimport\s+pytest\b|\bunittest\b"),
    asynchronous: pattern(r"\basync\s+def\b|\bawait\s|\basyncio\b"),
    entry: pattern(r#"__name__\s*==\s*['"]__main__['"]"#),
    internal: &[],
});

static GO: LazyLock<SourcePatterns> = LazyLock::new(|| SourcePatterns {
    exports: vec![
        pattern(r"(?m)^func\s+(?:\([^)]*\)\s*)?([A-Z][A-Za-z0-9_]*)"),
        pattern(r"(?m)^type\s+([A-Z][A-Za-z0-9_]*)"),
    ],
    imports: vec![
        pattern(r#"(?m)^import\s+(?:[A-Za-z_.]+\s+)?"([^"]+)""#),
        pattern(r#"(?m)^\s+(?:[A-Za-z_.]+\s+)?"([^"]+)"\s*$"#),
    ],
    tests: pattern(r"(?m)^func\s+(?:Test|Benchmark)[A-Z_]"),
    asynchronous: pattern(r"\bgo\s+(?:func\b|[A-Za-z_][A-Za-z0-9_.]*\()|\bchan\s"),
    entry: pattern(r"(?m)^func\s+main\s*\(\s*\)"),
    internal: &[],
});

static JVM: LazyLock<SourcePatterns> = LazyLock::new(|| SourcePatterns {
    exports: vec![
        pattern(
            r"(?m)^\s*(?:public\s+)?(?:abstract\s+|final\s+|sealed\s+|open\s+|data\s+|enum\s+|case\s+)*(?:class|interface|object|record|trait|enum)\s+([A-Z][A-Za-z0-9_]*)",
        ),
        pattern(r"(?m)^(?:suspend\s+)?fun\s+([A-Za-z_][A-Za-z0-9_]*)"),
    ],
    imports: vec![pattern(r"(?m)^\s*import\s+(?:static\s+)?([A-Za-z_][A-Za-z0-9_.]*)")],
    tests: pattern(r"@Test\b|\bextends\s+TestCase\b"),
    asynchronous: pattern(r"\bsuspend\s+fun\b|\bCompletableFuture\b|\blaunch\s*\{|\bFuture<"),
    entry: pattern(r"(?m)\bstatic\s+void\s+main\s*\(|^fun\s+main\s*\("),
    internal: &[],
});

static HEADING: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?m)^[ \t]{0,3}(#{1,6})[ \t]+(.+?)[ \t]*#*[ \t]*$"));
static LINK: LazyLock<Regex> = LazyLock::new(|| pattern(r"\[[^\]]*\]\(\s*<?([^)\s>]+)>?[^)]*\)"));
static RUST_MOD: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?mod\s+([a-z_][a-z0-9_]*)\s*;"));

fn patterns_for(family: SourceFamily) -> Option<&'static SourcePatterns> {
    match family {
        SourceFamily::Rust => Some(&*RUST),
        SourceFamily::Script => Some(&*SCRIPT),
        SourceFamily::Python => Some(&*PYTHON),
        SourceFamily::Go => Some(&*GO),
        SourceFamily::Jvm => Some(&*JVM),
        SourceFamily::Markdown | SourceFamily::Plain => None,
    }
}

// =============================================================================
// Extraction
// =============================================================================

/// Fields found in one file
#[derive(Debug, Default)]
struct Extraction {
    /// Replaces the heuristic summary when present
    summary: Option<String>,
    exports: Vec<String>,
    dependencies: Vec<String>,
    related: Vec<String>,
    traits: Vec<&'static str>,
    roles: Vec<Role>,
}

fn captures(re: &Regex, content: &str) -> Vec<String> {
    re.captures_iter(content)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

fn is_relative_link(link: &str) -> bool {
    !(link.starts_with('#')
        || link.starts_with('/')
        || link.contains("://")
        || link.starts_with("mailto:"))
}

fn extract_markdown(content: &str) -> Extraction {
    let mut out = Extraction::default();

    for caps in HEADING.captures_iter(content) {
        let level = caps.get(1).map_or(0, |m| m.as_str().len());
        let text = caps.get(2).map_or("", |m| m.as_str()).trim().to_string();
        if text.is_empty() {
            continue;
        }
        if out.summary.is_none() {
            out.summary = Some(text.clone());
        }
        if level == 2 {
            out.exports.push(text);
        }
    }

    out.related = captures(&LINK, content)
        .into_iter()
        .filter(|link| is_relative_link(link))
        .map(|link| match link.split_once('#') {
            Some((path, _)) => path.to_string(),
            None => link,
        })
        .collect();
    out
}

fn extract_package_json(content: &str) -> Result<Extraction> {
    let manifest: serde_json::Value = serde_json::from_str(content)?;
    let mut out = Extraction::default();

    let name = manifest.get("name").and_then(|v| v.as_str());
    let description = manifest.get("description").and_then(|v| v.as_str());
    out.summary = match (name, description) {
        (Some(n), Some(d)) if !d.trim().is_empty() => Some(format!("{}: {}", n, d.trim())),
        (Some(n), _) => Some(format!("{} package manifest", n)),
        (None, Some(d)) => Some(d.trim().to_string()),
        (None, None) => None,
    };

    let keys = |field: &str| -> Vec<String> {
        manifest
            .get(field)
            .and_then(|v| v.as_object())
            .map(|obj| obj.keys().cloned().collect())
            .unwrap_or_default()
    };
    out.exports = keys("scripts");
    out.dependencies = keys("dependencies");
    out.dependencies.extend(keys("devDependencies"));

    if let Some(main) = manifest.get("main").and_then(|v| v.as_str()) {
        out.related.push(main.to_string());
    }
    Ok(out)
}

fn extract_cargo_toml(content: &str) -> Result<Extraction> {
    let manifest: toml::Table = toml::from_str(content)
        .map_err(|e| LensError::analysis(Tier::Structural.to_string(), e.to_string()))?;
    let mut out = Extraction::default();

    let package = manifest.get("package").and_then(|v| v.as_table());
    let str_field = |table: Option<&toml::Table>, key: &str| {
        table
            .and_then(|t| t.get(key))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    };
    let name = str_field(package, "name");
    let description = str_field(package, "description");
    out.summary = match (name, description) {
        (Some(n), Some(d)) => Some(format!("{}: {}", n, d)),
        (Some(n), None) => Some(format!("{} crate manifest", n)),
        (None, _) if manifest.contains_key("workspace") => Some("Cargo workspace manifest".into()),
        (None, d) => d,
    };

    if let Some(lib) = manifest.get("lib").and_then(|v| v.as_table()) {
        out.exports
            .push(str_field(Some(lib), "name").unwrap_or_else(|| "lib".to_string()));
    }
    if let Some(bins) = manifest.get("bin").and_then(|v| v.as_array()) {
        out.exports.extend(
            bins.iter()
                .filter_map(|b| b.as_table())
                .filter_map(|b| str_field(Some(b), "name")),
        );
    }

    if let Some(deps) = manifest.get("dependencies").and_then(|v| v.as_table()) {
        out.dependencies.extend(deps.keys().cloned());
    }

    if let Some(members) = manifest
        .get("workspace")
        .and_then(|w| w.get("members"))
        .and_then(|m| m.as_array())
    {
        out.related
            .extend(members.iter().filter_map(|m| m.as_str().map(str::to_string)));
    }
    Ok(out)
}

fn extract_source(content: &str, patterns: &SourcePatterns, family: SourceFamily) -> Extraction {
    let mut out = Extraction::default();

    for re in &patterns.exports {
        out.exports.extend(
            captures(re, content)
                .into_iter()
                .filter(|name| family != SourceFamily::Python || !name.starts_with('_')),
        );
    }

    for re in &patterns.imports {
        for import in captures(re, content) {
            if import.starts_with('.') {
                out.related.push(import);
            } else if !patterns.internal.contains(&import.as_str()) {
                out.dependencies.push(import);
            }
        }
    }

    if family == SourceFamily::Rust {
        out.related.extend(
            captures(&RUST_MOD, content)
                .into_iter()
                .map(|m| format!("{}.rs", m)),
        );
    }

    if patterns.tests.is_match(content) {
        out.traits.push(TRAIT_TESTS);
        out.roles.push(Role::Test);
    }
    if patterns.asynchronous.is_match(content) {
        out.traits.push(TRAIT_ASYNC);
    }
    if patterns.entry.is_match(content) {
        out.traits.push(TRAIT_ENTRY);
        out.roles.push(Role::Entry);
    }
    out
}

fn extract_file(target: &Path, content: &str) -> Result<Extraction> {
    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match file_name.as_str() {
        "package.json" => return extract_package_json(content),
        "cargo.toml" => return extract_cargo_toml(content),
        _ => {}
    }

    let family = Language::from_path(target).family();
    Ok(match (family, patterns_for(family)) {
        (SourceFamily::Markdown, _) => extract_markdown(content),
        (_, Some(patterns)) => extract_source(content, patterns, family),
        (_, None) => Extraction::default(),
    })
}

fn append_traits(summary: &str, traits: &[&str]) -> String {
    if traits.is_empty() {
        summary.to_string()
    } else {
        format!("{} ({})", summary, traits.join(", "))
    }
}

// =============================================================================
// Directories
// =============================================================================

const COMPONENT_DIRS: &[&str] = &["components", "widgets", "views", "pages"];
const TEST_DIRS: &[&str] = &["test", "tests", "__tests__", "spec", "e2e"];
const CONFIG_FILES: &[&str] = &[
    "package.json",
    "cargo.toml",
    "tsconfig.json",
    "pyproject.toml",
    "go.mod",
    "pom.xml",
    "build.gradle",
    ".env",
    "config",
];
const NOTABLE_PREFIXES: &[&str] = &["readme", "main.", "index.", "lib.rs", "mod.rs", "__init__.py", "app."];

fn is_test_file(name: &str) -> bool {
    name.contains(".test.") || name.contains(".spec.") || name.contains("_test.") || name.starts_with("test_")
}

fn extract_directory(children: &[DirEntryInfo]) -> Extraction {
    let mut out = Extraction::default();
    let lower: Vec<(String, bool)> = children
        .iter()
        .map(|c| (c.name.to_lowercase(), c.is_dir))
        .collect();

    let files = children.iter().filter(|c| !c.is_dir).count();
    let dirs = children.len() - files;

    if lower
        .iter()
        .any(|(n, is_dir)| *is_dir && COMPONENT_DIRS.contains(&n.as_str()))
    {
        out.traits.push("has components");
    }
    if lower.iter().any(|(n, is_dir)| {
        (*is_dir && TEST_DIRS.contains(&n.as_str())) || (!*is_dir && is_test_file(n))
    }) {
        out.traits.push("has tests");
    }
    if lower.iter().any(|(n, is_dir)| {
        CONFIG_FILES.contains(&n.as_str())
            || n.contains(".config.")
            || (!*is_dir && n.starts_with('.') && n.ends_with("rc"))
    }) {
        out.traits.push("has config");
    }

    let notable: Vec<String> = children
        .iter()
        .filter(|c| {
            let name = c.name.to_lowercase();
            CONFIG_FILES.contains(&name.as_str())
                || NOTABLE_PREFIXES.iter().any(|p| name.starts_with(p))
        })
        .map(|c| c.name.clone())
        .collect();
    out.exports = if notable.is_empty() {
        children.iter().map(|c| c.name.clone()).collect()
    } else {
        notable
    };
    out.related = children
        .iter()
        .filter(|c| c.is_dir)
        .map(|c| format!("{}/", c.name))
        .collect();

    out.summary = Some(format!("{} files, {} directories", files, dirs));
    out
}

// =============================================================================
// Analyzer
// =============================================================================

/// Pattern-based extraction of exports, imports and traits
pub struct StructuralAnalyzer {
    fs: SharedFileSystem,
    max_bytes: u64,
}

impl StructuralAnalyzer {
    pub fn new(fs: SharedFileSystem) -> Self {
        Self {
            fs,
            max_bytes: MAX_STRUCTURAL_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    async fn analyze_directory(&self, target: &Path, base: AnalysisResult) -> Result<AnalysisResult> {
        let children = self.fs.read_dir(target).await?;
        let extraction = extract_directory(&children);

        let counts = extraction.summary.unwrap_or_default();
        let mut details = vec![counts.as_str()];
        details.extend(extraction.traits.iter().copied());

        let mut result = base.promote(Tier::Structural);
        result.summary = append_traits(&result.summary, &details);
        result.roles.insert(Role::Directory);
        result.exports = extraction.exports;
        result.related = extraction.related;
        Ok(result.bounded())
    }

    async fn analyze_file(
        &self,
        target: &Path,
        size: u64,
        base: AnalysisResult,
    ) -> Result<AnalysisResult> {
        if size > self.max_bytes {
            return Err(LensError::skipped(format!(
                "{} bytes exceeds structural limit of {}",
                size, self.max_bytes
            )));
        }

        let bytes = self.fs.read_file(target).await?;
        if looks_binary(&bytes, BINARY_SNIFF_BYTES) {
            return Err(LensError::analysis(
                Tier::Structural.to_string(),
                "binary content",
            ));
        }
        let content = String::from_utf8_lossy(&bytes);
        let extraction = extract_file(target, &content)?;

        debug!(
            target = %target.display(),
            exports = extraction.exports.len(),
            dependencies = extraction.dependencies.len(),
            traits = extraction.traits.len(),
            "Structural extraction"
        );

        let mut result = base.promote(Tier::Structural);
        let summary = extraction.summary.unwrap_or(result.summary);
        result.summary = append_traits(&summary, &extraction.traits);
        result.roles.extend(extraction.roles);
        result.exports = extraction.exports;
        result.dependencies = extraction.dependencies;
        result.related = extraction.related;
        Ok(result.bounded())
    }
}

#[async_trait]
impl TierAnalyzer for StructuralAnalyzer {
    fn tier(&self) -> Tier {
        Tier::Structural
    }

    async fn analyze(
        &self,
        target: &Path,
        previous: Option<&AnalysisResult>,
    ) -> Result<AnalysisResult> {
        let stat = self.fs.stat(target).await?;
        let base = previous
            .cloned()
            .unwrap_or_else(|| classify(target, stat.is_dir));

        if stat.is_dir {
            self.analyze_directory(target, base).await
        } else {
            self.analyze_file(target, stat.size, base).await
        }
    }
}
