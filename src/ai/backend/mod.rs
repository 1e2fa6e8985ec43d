//! Model Backends
//!
//! A backend turns a system prompt plus named inputs into raw response text.
//! Parsing is left to the caller so every backend is interchangeable.

mod ollama;
mod openai;

pub use ollama::OllamaBackend;
pub use openai::OpenAiBackend;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{BackendConfig, BackendKind};
use crate::types::Result;

/// One named piece of content sent to a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInput {
    pub name: String,
    pub content: String,
}

impl ModelInput {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn chars(&self) -> usize {
        self.content.chars().count()
    }
}

#[async_trait]
pub trait ModelBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the backend has what it needs to make calls
    fn is_configured(&self) -> bool;

    /// Raw response text for `inputs`
    async fn call(&self, system_prompt: &str, inputs: &[ModelInput]) -> Result<String>;
}

pub type SharedBackend = Arc<dyn ModelBackend>;

/// Concatenate inputs into a single user message
///
/// A lone input is sent as-is.
pub fn render_inputs(inputs: &[ModelInput]) -> String {
    if let [only] = inputs {
        return only.content.clone();
    }
    inputs
        .iter()
        .map(|input| format!("### {}\n{}", input.name, input.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Build a backend from configuration
pub fn create_backend(config: &BackendConfig) -> Result<SharedBackend> {
    match config.kind {
        BackendKind::OpenAi => Ok(Arc::new(OpenAiBackend::new(config)?)),
        BackendKind::Ollama => Ok(Arc::new(OllamaBackend::new(config)?)),
    }
}
