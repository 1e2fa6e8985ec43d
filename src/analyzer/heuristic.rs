//! Heuristic Tier
//!
//! Classifies a target from its path alone. Rules are checked in priority
//! order (exact file name, then path fragment, then extension) and the first
//! match wins. Only one `stat` is performed, to tell files from directories.

use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use super::TierAnalyzer;
use super::language::{Language, detect_language};
use crate::storage::SharedFileSystem;
use crate::types::{AnalysisResult, Result, Role, Tier};

enum Matcher {
    FileName(&'static [&'static str]),
    PathFragment(&'static [&'static str]),
    Extension(&'static [&'static str]),
}

struct Rule {
    matcher: Matcher,
    summary: &'static str,
    roles: &'static [Role],
}

const fn rule(matcher: Matcher, summary: &'static str, roles: &'static [Role]) -> Rule {
    Rule {
        matcher,
        summary,
        roles,
    }
}

use Matcher::{Extension, FileName, PathFragment};

const FILE_RULES: &[Rule] = &[
    // Exact file names
    rule(FileName(&["readme.md", "readme", "readme.txt", "readme.rst"]), "Project documentation", &[Role::Document]),
    rule(FileName(&["changelog.md", "contributing.md", "license", "license.md"]), "Project documentation", &[Role::Document]),
    rule(FileName(&["package.json"]), "Node.js package manifest", &[Role::Config, Role::Build]),
    rule(FileName(&["cargo.toml"]), "Rust crate manifest", &[Role::Config, Role::Build]),
    rule(FileName(&["go.mod", "pyproject.toml", "pom.xml", "build.gradle", "build.gradle.kts", "requirements.txt"]), "Package manifest", &[Role::Config, Role::Build]),
    rule(FileName(&["dockerfile", "makefile", "justfile", "docker-compose.yml", "docker-compose.yaml"]), "Build definition", &[Role::Build]),
    rule(FileName(&["tsconfig.json", ".gitignore", ".editorconfig", ".env", ".env.example"]), "Project configuration", &[Role::Config]),
    rule(FileName(&["main.rs", "main.go", "main.py", "__main__.py", "main.ts", "main.js"]), "Program entry point", &[Role::Entry]),
    rule(FileName(&["index.ts", "index.js", "index.tsx", "app.tsx", "app.ts", "server.ts", "server.js"]), "Application entry point", &[Role::Entry]),
    rule(FileName(&["lib.rs", "mod.rs", "__init__.py"]), "Module root", &[Role::Module]),
    // Path fragments
    rule(PathFragment(&["/test/", "/tests/", "/__tests__/", ".test.", ".spec.", "_test.", "/test_"]), "Test code", &[Role::Test]),
    rule(PathFragment(&[".d.ts", "/types/", "/typings/"]), "Type definitions", &[Role::Types]),
    rule(PathFragment(&["/components/", "/widgets/"]), "UI component", &[Role::Component]),
    rule(PathFragment(&["/services/", "/api/", "/handlers/", "/routes/"]), "Service layer", &[Role::Service]),
    rule(PathFragment(&["/utils/", "/util/", "/helpers/", "/lib/"]), "Utility code", &[Role::Utility]),
    rule(PathFragment(&["/config/", "/configs/", ".config."]), "Configuration", &[Role::Config]),
    rule(PathFragment(&["/scripts/", "/bin/"]), "Script", &[Role::Script]),
    rule(PathFragment(&["/docs/", "/doc/"]), "Documentation", &[Role::Document]),
    rule(PathFragment(&["/assets/", "/public/", "/static/"]), "Static asset", &[Role::Asset]),
    // Extensions
    rule(Extension(&["md", "markdown", "mdx", "rst", "txt", "adoc"]), "Documentation", &[Role::Document]),
    rule(Extension(&["css", "scss", "sass", "less"]), "Stylesheet", &[Role::Style]),
    rule(Extension(&["json", "yaml", "yml", "toml", "ini", "cfg", "env", "xml"]), "Configuration or data file", &[Role::Config]),
    rule(Extension(&["csv", "tsv", "sql", "parquet", "db", "sqlite"]), "Data file", &[Role::Data]),
    rule(Extension(&["png", "jpg", "jpeg", "gif", "svg", "ico", "webp", "bmp"]), "Image asset", &[Role::Asset]),
    rule(Extension(&["mp4", "mov", "avi", "mkv", "webm", "mp3", "wav", "flac", "ogg"]), "Media asset", &[Role::Asset]),
    rule(Extension(&["woff", "woff2", "ttf", "otf", "eot"]), "Font asset", &[Role::Asset]),
    rule(Extension(&["zip", "tar", "gz", "7z", "rar", "pdf", "exe", "dll", "so", "dylib", "wasm", "bin"]), "Binary artifact", &[Role::Asset]),
    rule(Extension(&["sh", "bash", "zsh", "ps1", "bat"]), "Shell script", &[Role::Script]),
    rule(Extension(&["html", "htm", "vue", "svelte", "jsx", "tsx"]), "UI template", &[Role::Component]),
    rule(Extension(&["rs", "go", "py", "ts", "js", "mjs", "cjs", "java", "kt", "scala", "c", "h", "cpp", "cc", "hpp", "rb", "php", "swift", "cs"]), "Source file", &[Role::Source]),
];

const DIR_RULES: &[Rule] = &[
    rule(FileName(&["src", "lib", "pkg", "internal", "app"]), "Source directory", &[Role::Directory, Role::Source]),
    rule(FileName(&["test", "tests", "__tests__", "spec", "e2e"]), "Test directory", &[Role::Directory, Role::Test]),
    rule(FileName(&["docs", "doc", "documentation"]), "Documentation directory", &[Role::Directory, Role::Document]),
    rule(FileName(&["components", "widgets", "views", "pages"]), "Component directory", &[Role::Directory, Role::Component]),
    rule(FileName(&["config", "configs", ".github", ".vscode"]), "Configuration directory", &[Role::Directory, Role::Config]),
    rule(FileName(&["scripts", "bin", "tools"]), "Scripts directory", &[Role::Directory, Role::Script]),
    rule(FileName(&["assets", "public", "static", "images"]), "Asset directory", &[Role::Directory, Role::Asset]),
    rule(FileName(&["utils", "util", "helpers", "common", "shared"]), "Utility directory", &[Role::Directory, Role::Utility]),
    rule(FileName(&["services", "api", "handlers", "routes"]), "Service directory", &[Role::Directory, Role::Service]),
    rule(FileName(&["types", "typings", "models"]), "Type definitions directory", &[Role::Directory, Role::Types]),
];

impl Rule {
    fn matches(&self, file_name: &str, path: &str, extension: &str) -> bool {
        match self.matcher {
            FileName(names) => names.contains(&file_name),
            PathFragment(fragments) => fragments.iter().any(|f| path.contains(f)),
            Extension(exts) => exts.contains(&extension),
        }
    }
}

/// Path-only classification
pub fn classify(target: &Path, is_dir: bool) -> AnalysisResult {
    let display = target.display().to_string();
    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    // Leading slash lets fragments like "/tests/" match relative paths
    let path = format!("/{}", display.replace('\\', "/").to_lowercase());
    let extension = target
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let rules = if is_dir { DIR_RULES } else { FILE_RULES };
    let matched = rules
        .iter()
        .find(|r| r.matches(&file_name, &path, &extension));

    let mut result = match matched {
        Some(r) => {
            let mut result = AnalysisResult::new(display.clone(), Tier::Heuristic, r.summary);
            result.roles.extend(r.roles.iter().copied());
            result
        }
        None if is_dir => {
            let mut result = AnalysisResult::new(display.clone(), Tier::Heuristic, "Directory");
            result.roles.insert(Role::Directory);
            result
        }
        None => {
            let lang = Language::from_path(target);
            let summary = if lang.is_known() {
                format!("{} file", lang)
            } else {
                "File".to_string()
            };
            AnalysisResult::new(display.clone(), Tier::Heuristic, summary)
        }
    };

    if !is_dir {
        result.language = detect_language(target).map(str::to_string);
    }
    result
}

/// Name and extension rules; sub-millisecond
pub struct HeuristicAnalyzer {
    fs: SharedFileSystem,
}

impl HeuristicAnalyzer {
    pub fn new(fs: SharedFileSystem) -> Self {
        Self { fs }
    }

    async fn is_dir(&self, target: &Path) -> bool {
        match self.fs.stat(target).await {
            Ok(stat) => stat.is_dir,
            Err(e) => {
                debug!(target = %target.display(), error = %e, "Stat failed, guessing kind from extension");
                target.extension().is_none()
            }
        }
    }
}

#[async_trait]
impl TierAnalyzer for HeuristicAnalyzer {
    fn tier(&self) -> Tier {
        Tier::Heuristic
    }

    async fn analyze(
        &self,
        target: &Path,
        _previous: Option<&AnalysisResult>,
    ) -> Result<AnalysisResult> {
        let is_dir = self.is_dir(target).await;
        Ok(classify(target, is_dir))
    }
}
