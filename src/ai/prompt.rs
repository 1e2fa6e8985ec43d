//! Prompt Templates
//!
//! Templates are looked up by kind through a [`TemplateSource`]. A missing,
//! unreadable or blank template falls back to a built-in default, so a
//! prompt can always be rendered.
//!
//! Placeholders: `{{path}}`, `{{language}}`, `{{summary}}`, `{{content}}`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

/// System prompt sent with every model request
pub const SYSTEM_PROMPT: &str = "You are a code analysis assistant. \
Respond ONLY with a single JSON object with these fields: \
\"summary\" (one or two sentences on what the entry is for), \
\"roles\" (list of: entry, service, config, test, document, component, utility, style, asset, build, types, source, script, data, directory, module), \
\"exports\" (public names it provides), \
\"dependencies\" (external packages or modules it uses), \
\"related\" (paths of closely related files). \
Keep each list to at most 10 items. No explanation outside the JSON.";

const DEFAULT_FILE_TEMPLATE: &str = "\
Analyze the file `{{path}}` (language: {{language}}).

Current understanding: {{summary}}

## Content

```
{{content}}
```
";

const DEFAULT_DIRECTORY_TEMPLATE: &str = "\
Analyze the directory `{{path}}`.

Current understanding: {{summary}}

## Entries

{{content}}
";

/// What is being analyzed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    File,
    Directory,
}

impl TemplateKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            TemplateKind::File => "file.md",
            TemplateKind::Directory => "directory.md",
        }
    }

    fn builtin(&self) -> &'static str {
        match self {
            TemplateKind::File => DEFAULT_FILE_TEMPLATE,
            TemplateKind::Directory => DEFAULT_DIRECTORY_TEMPLATE,
        }
    }
}

/// Provider of user-supplied templates
#[async_trait]
pub trait TemplateSource: Send + Sync {
    /// Template text for `kind`, `None` when unavailable
    async fn template(&self, kind: TemplateKind) -> Option<String>;
}

/// Reads `<dir>/file.md` and `<dir>/directory.md`
#[derive(Debug, Clone)]
pub struct DirTemplateSource {
    dir: PathBuf,
}

impl DirTemplateSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl TemplateSource for DirTemplateSource {
    async fn template(&self, kind: TemplateKind) -> Option<String> {
        let path = self.dir.join(kind.file_name());
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Some(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Template unreadable, using default");
                None
            }
        }
    }
}

/// Values substituted into a template
#[derive(Debug, Clone, Default)]
pub struct PromptVars<'a> {
    pub path: &'a str,
    pub language: &'a str,
    pub summary: &'a str,
    pub content: &'a str,
}

/// Template resolution with built-in fallbacks
#[derive(Clone, Default)]
pub struct PromptTemplates {
    source: Option<Arc<dyn TemplateSource>>,
}

impl PromptTemplates {
    /// Built-in templates only
    pub fn builtin() -> Self {
        Self::default()
    }

    pub fn with_source(source: Arc<dyn TemplateSource>) -> Self {
        Self {
            source: Some(source),
        }
    }

    /// Template for `kind`; never empty
    pub async fn resolve(&self, kind: TemplateKind) -> String {
        if let Some(source) = &self.source
            && let Some(text) = source.template(kind).await
        {
            if !text.trim().is_empty() {
                return text;
            }
            debug!(kind = kind.file_name(), "Blank template, using default");
        }
        kind.builtin().to_string()
    }

    /// Resolve and fill the template for `kind`
    pub async fn render(&self, kind: TemplateKind, vars: &PromptVars<'_>) -> String {
        fill(&self.resolve(kind).await, vars)
    }
}

/// Substitute placeholders in a single pass
///
/// Placeholder text that appears inside substituted values is left alone.
pub fn fill(template: &str, vars: &PromptVars<'_>) -> String {
    let mut out = String::with_capacity(template.len() + vars.content.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        let value = match after[..end].trim() {
            "path" => Some(vars.path),
            "language" => Some(vars.language),
            "summary" => Some(vars.summary),
            "content" => Some(vars.content),
            _ => None,
        };
        match value {
            Some(v) => out.push_str(v),
            None => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    out
}
