//! Model Integration Layer
//!
//! Backends, routing, prompt rendering and response parsing for the model tier.

pub mod backend;
pub mod prompt;
pub mod response;
pub mod router;
pub mod timeout;

pub use backend::{
    ModelBackend, ModelInput, OllamaBackend, OpenAiBackend, SharedBackend, create_backend,
};
pub use prompt::{
    DirTemplateSource, PromptTemplates, PromptVars, SYSTEM_PROMPT, TemplateKind, TemplateSource,
};
pub use response::{ModelResponse, parse_model_response};
pub use router::{BackendHealth, BackendSlot, ModelRouter, RouterConfig};
pub use timeout::with_timeout;
