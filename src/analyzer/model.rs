//! Model Tier
//!
//! Renders a prompt for the target, sends it through the [`ModelRouter`] and
//! merges the parsed answer over the previous tier's result.

use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::heuristic::classify;
use super::{TierAnalyzer, looks_binary};
use crate::ai::{
    ModelInput, ModelResponse, ModelRouter, PromptTemplates, PromptVars, SYSTEM_PROMPT,
    TemplateKind, parse_model_response,
};
use crate::constants::analysis::{
    BINARY_SNIFF_BYTES, MAX_MODEL_BYTES, MAX_PROMPT_CHARS, MAX_PROMPT_CHILDREN,
};
use crate::storage::SharedFileSystem;
use crate::types::{AnalysisResult, LensError, Result, Role, Tier};

/// Fallback tag for a response that could not be parsed
pub const UNPARSEABLE_FALLBACK: &str = "model: unparseable response";

#[derive(Debug, Clone)]
pub struct ModelSettings {
    /// Larger files are never sent
    pub max_model_bytes: u64,
    /// Content beyond this is truncated head/tail
    pub max_prompt_chars: usize,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            max_model_bytes: MAX_MODEL_BYTES,
            max_prompt_chars: MAX_PROMPT_CHARS,
        }
    }
}

/// Keep the first two thirds and last third of `content` within `max_chars`
pub fn truncate_middle(content: &str, max_chars: usize) -> Cow<'_, str> {
    let total = content.chars().count();
    if total <= max_chars {
        return Cow::Borrowed(content);
    }
    let head_chars = max_chars * 2 / 3;
    let tail_chars = max_chars - head_chars;

    let head_end = content
        .char_indices()
        .nth(head_chars)
        .map_or(content.len(), |(i, _)| i);
    let tail_start = content
        .char_indices()
        .nth(total - tail_chars)
        .map_or(content.len(), |(i, _)| i);

    Cow::Owned(format!(
        "{}\n... [{} characters omitted] ...\n{}",
        &content[..head_end],
        total - head_chars - tail_chars,
        &content[tail_start..]
    ))
}

pub struct ModelAnalyzer {
    fs: SharedFileSystem,
    router: Arc<ModelRouter>,
    templates: PromptTemplates,
    settings: ModelSettings,
}

impl ModelAnalyzer {
    pub fn new(
        fs: SharedFileSystem,
        router: Arc<ModelRouter>,
        templates: PromptTemplates,
        settings: ModelSettings,
    ) -> Self {
        Self {
            fs,
            router,
            templates,
            settings,
        }
    }

    async fn directory_listing(&self, target: &Path) -> Result<String> {
        let children = self.fs.read_dir(target).await?;
        let mut lines: Vec<String> = children
            .iter()
            .take(MAX_PROMPT_CHILDREN)
            .map(|c| {
                if c.is_dir {
                    format!("- {}/", c.name)
                } else {
                    format!("- {}", c.name)
                }
            })
            .collect();
        if children.len() > MAX_PROMPT_CHILDREN {
            lines.push(format!("- ... and {} more", children.len() - MAX_PROMPT_CHILDREN));
        }
        Ok(lines.join("\n"))
    }

    async fn file_content(&self, target: &Path, size: u64) -> Result<String> {
        if size > self.settings.max_model_bytes {
            return Err(LensError::skipped(format!(
                "{} bytes exceeds model limit of {}",
                size, self.settings.max_model_bytes
            )));
        }
        let bytes = self.fs.read_file(target).await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(LensError::skipped("empty file"));
        }
        if looks_binary(&bytes, BINARY_SNIFF_BYTES) {
            return Err(LensError::skipped("binary content"));
        }
        let text = String::from_utf8_lossy(&bytes);
        Ok(truncate_middle(&text, self.settings.max_prompt_chars).into_owned())
    }

    fn merge(base: &AnalysisResult, response: ModelResponse) -> AnalysisResult {
        let mut result = base.promote(Tier::Model);
        result.summary = response.summary.trim().to_string();

        let roles: Vec<Role> = response.roles.iter().filter_map(|r| Role::parse(r)).collect();
        if !roles.is_empty() {
            result.roles = roles.into_iter().collect();
        }
        if !response.exports.is_empty() {
            result.exports = response.exports;
        }
        if !response.dependencies.is_empty() {
            result.dependencies = response.dependencies;
        }
        if !response.related.is_empty() {
            result.related = response.related;
        }
        result.bounded()
    }
}

#[async_trait]
impl TierAnalyzer for ModelAnalyzer {
    fn tier(&self) -> Tier {
        Tier::Model
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

        let (kind, content) = if stat.is_dir {
            (TemplateKind::Directory, self.directory_listing(target).await?)
        } else {
            (TemplateKind::File, self.file_content(target, stat.size).await?)
        };

        let path = target.display().to_string();
        let vars = PromptVars {
            path: &path,
            language: base.language.as_deref().unwrap_or("unknown"),
            summary: &base.summary,
            content: &content,
        };
        let prompt = self.templates.render(kind, &vars).await;
        debug!(target = %path, prompt_chars = prompt.len(), "Sending model prompt");

        let raw = self
            .router
            .call(SYSTEM_PROMPT, &[ModelInput::new(path.clone(), prompt)])
            .await?;

        match parse_model_response(&raw) {
            Ok(response) => Ok(Self::merge(&base, response)),
            Err(LensError::UnparseableResponse { preview }) => {
                warn!(target = %path, preview = %preview, "Unparseable model response");
                Ok(base.with_fallback(UNPARSEABLE_FALLBACK))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{ModelBackend, RouterConfig, TemplateSource};
    use crate::storage::LocalFileSystem;
    use crate::types::{BackendError, ErrorCategory};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct ScriptedBackend {
        reply: Option<&'static str>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn new(reply: Option<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn last_prompt(&self) -> String {
            self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl ModelBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        fn is_configured(&self) -> bool {
            true
        }

        async fn call(&self, _system: &str, inputs: &[ModelInput]) -> Result<String> {
            self.prompts
                .lock()
                .unwrap()
                .extend(inputs.iter().map(|i| i.content.clone()));
            self.reply.map(String::from).ok_or_else(|| {
                BackendError::with_backend(ErrorCategory::Transient, "down", "scripted").into()
            })
        }
    }

    struct Unconfigured;

    #[async_trait]
    impl ModelBackend for Unconfigured {
        fn name(&self) -> &str {
            "none"
        }

        fn is_configured(&self) -> bool {
            false
        }

        async fn call(&self, _system: &str, _inputs: &[ModelInput]) -> Result<String> {
            Err(LensError::NoBackendAvailable)
        }
    }

    fn analyzer(backend: Arc<ScriptedBackend>, templates: PromptTemplates) -> ModelAnalyzer {
        let router = ModelRouter::new(backend, Arc::new(Unconfigured), RouterConfig::default());
        ModelAnalyzer::new(
            LocalFileSystem::shared(),
            Arc::new(router),
            templates,
            ModelSettings::default(),
        )
    }

    fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_truncate_middle() {
        assert_eq!(truncate_middle("short", 10), "short");

        let content: String = ('a'..='z').collect();
        let truncated = truncate_middle(&content, 9);
        assert!(truncated.starts_with("abcdef\n"));
        assert!(truncated.ends_with("\nxyz"));
        assert!(truncated.contains("[17 characters omitted]"));
    }

    #[test]
    fn test_truncate_middle_multibyte() {
        let content = "é".repeat(30);
        let truncated = truncate_middle(&content, 12);
        assert!(truncated.starts_with(&"é".repeat(8)));
        assert!(truncated.ends_with(&"é".repeat(4)));
    }

    #[tokio::test]
    async fn test_model_result_merged() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "server.rs", "pub fn start() {}");
        let backend = ScriptedBackend::new(Some(
            r#"{"summary":"HTTP server bootstrap","roles":["service","bogus"],"exports":["start"]}"#,
        ));
        let previous = AnalysisResult::new("server.rs", Tier::Structural, "Rust file")
            .with_fallback("stale");

        let result = analyzer(backend.clone(), PromptTemplates::builtin())
            .analyze(&path, Some(&previous))
            .await
            .unwrap();

        assert_eq!(result.tier, Tier::Model);
        assert_eq!(result.summary, "HTTP server bootstrap");
        assert_eq!(result.roles.iter().copied().collect::<Vec<_>>(), vec![Role::Service]);
        assert_eq!(result.exports, vec!["start"]);
        assert!(result.fallback.is_none());
        assert!(backend.last_prompt().contains("pub fn start() {}"));
    }

    #[tokio::test]
    async fn test_unparseable_keeps_previous() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "lib.rs", "pub mod a;");
        let backend = ScriptedBackend::new(Some("Sorry, I cannot help with that."));
        let mut previous = AnalysisResult::new("lib.rs", Tier::Structural, "Library root");
        previous.exports = vec!["a".to_string()];

        let result = analyzer(backend, PromptTemplates::builtin())
            .analyze(&path, Some(&previous))
            .await
            .unwrap();

        assert_eq!(result.tier, Tier::Structural);
        assert_eq!(result.summary, "Library root");
        assert_eq!(result.exports, vec!["a"]);
        assert_eq!(result.fallback.as_deref(), Some(UNPARSEABLE_FALLBACK));
    }

    #[tokio::test]
    async fn test_backend_error_propagates() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "main.py", "print('hi')");
        let err = analyzer(ScriptedBackend::new(None), PromptTemplates::builtin())
            .analyze(&path, None)
            .await
            .unwrap_err();
        assert!(matches!(err, LensError::Backend(_)));
    }

    #[tokio::test]
    async fn test_skips_empty_large_and_binary() {
        let dir = TempDir::new().unwrap();
        let backend = ScriptedBackend::new(Some(r#"{"summary":"x"}"#));
        let mut model = analyzer(backend.clone(), PromptTemplates::builtin());

        let empty = write(&dir, "empty.txt", "  \n");
        assert!(matches!(
            model.analyze(&empty, None).await,
            Err(LensError::Skipped { .. })
        ));

        let binary = dir.path().join("blob.dat");
        std::fs::write(&binary, b"abc\x00def").unwrap();
        assert!(matches!(
            model.analyze(&binary, None).await,
            Err(LensError::Skipped { .. })
        ));

        model.settings.max_model_bytes = 4;
        let large = write(&dir, "large.txt", "more than four bytes");
        assert!(matches!(
            model.analyze(&large, None).await,
            Err(LensError::Skipped { .. })
        ));

        assert!(backend.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_directory_prompt_lists_children() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.rs", "fn a() {}");
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        let backend = ScriptedBackend::new(Some(r#"{"summary":"Sources"}"#));

        let result = analyzer(backend.clone(), PromptTemplates::builtin())
            .analyze(dir.path(), None)
            .await
            .unwrap();

        assert_eq!(result.summary, "Sources");
        let prompt = backend.last_prompt();
        assert!(prompt.contains("- a.rs"));
        assert!(prompt.contains("- nested/"));
    }

    struct FixedTemplate;

    #[async_trait]
    impl TemplateSource for FixedTemplate {
        async fn template(&self, _kind: TemplateKind) -> Option<String> {
            Some("Describe {{path}} ({{language}})".to_string())
        }
    }

    #[tokio::test]
    async fn test_custom_template_used() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "app.ts", "export const x = 1;");
        let backend = ScriptedBackend::new(Some(r#"{"summary":"App"}"#));

        analyzer(backend.clone(), PromptTemplates::with_source(Arc::new(FixedTemplate)))
            .analyze(&path, None)
            .await
            .unwrap();

        let prompt = backend.last_prompt();
        assert!(prompt.starts_with("Describe "));
        assert!(prompt.ends_with("(typescript)"));
    }
}
