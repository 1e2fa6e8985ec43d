//! Ollama Local Backend
//!
//! Calls `/api/generate` on a locally running Ollama server.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{ModelBackend, ModelInput, render_inputs};
use crate::config::BackendConfig;
use crate::types::{BackendError, ErrorCategory, ErrorClassifier, LensError, Result};

const NAME: &str = "ollama";
const DEFAULT_MODEL: &str = "llama3:latest";

/// Ollama backend; configured once an endpoint is set
pub struct OllamaBackend {
    api_base: Option<String>,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl OllamaBackend {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let api_base = config
            .endpoint
            .as_deref()
            .map(Self::validate_endpoint)
            .transpose()?;

        let model = config
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LensError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_base,
            model,
            temperature: config.temperature,
            client,
        })
    }

    /// Only http/https; warns for non-localhost hosts
    fn validate_endpoint(endpoint: &str) -> Result<String> {
        let url = url::Url::parse(endpoint).map_err(|e| {
            LensError::Config(format!("Invalid Ollama endpoint URL '{}': {}", endpoint, e))
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(LensError::Config(format!(
                "Ollama endpoint must use http or https scheme, got: {}",
                url.scheme()
            )));
        }

        if let Some(host) = url.host_str()
            && !matches!(host, "localhost" | "127.0.0.1" | "::1" | "[::1]")
        {
            warn!(host, "Ollama endpoint is not localhost");
        }

        let mut result = url.to_string();
        if result.ends_with('/') {
            result.pop();
        }
        Ok(result)
    }

    fn build_request(&self, system_prompt: &str, inputs: &[ModelInput]) -> OllamaRequest {
        OllamaRequest {
            model: self.model.clone(),
            system: system_prompt.to_string(),
            prompt: render_inputs(inputs),
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
            },
            format: "json".to_string(),
        }
    }
}

#[async_trait]
impl ModelBackend for OllamaBackend {
    fn name(&self) -> &str {
        NAME
    }

    fn is_configured(&self) -> bool {
        self.api_base.is_some()
    }

    async fn call(&self, system_prompt: &str, inputs: &[ModelInput]) -> Result<String> {
        let Some(api_base) = &self.api_base else {
            return Err(BackendError::with_backend(
                ErrorCategory::Unavailable,
                "endpoint not configured",
                NAME,
            )
            .into());
        };

        info!(model = %self.model, inputs = inputs.len(), "Calling Ollama");

        let start_time = Instant::now();
        let request = self.build_request(system_prompt, inputs);
        let url = format!("{}/api/generate", api_base);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    BackendError::with_backend(
                        ErrorCategory::Unavailable,
                        format!("Failed to connect to {}. Is Ollama running?", api_base),
                        NAME,
                    )
                } else {
                    ErrorClassifier::classify(&format!("request failed: {}", e), NAME)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ErrorClassifier::classify_http_status(
                status.as_u16(),
                &format!("API error ({}): {}", status, body),
                NAME,
            )
            .into());
        }

        let body: OllamaResponse = response.json().await.map_err(|e| {
            BackendError::with_backend(
                ErrorCategory::Unknown,
                format!("Failed to decode response: {}", e),
                NAME,
            )
        })?;

        debug!(elapsed_ms = start_time.elapsed().as_millis() as u64, "Ollama responded");
        Ok(body.response)
    }
}

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    system: String,
    prompt: String,
    stream: bool,
    options: OllamaOptions,
    format: String,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}
