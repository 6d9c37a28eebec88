//! Ollama API client implementation
//!
//! This module implements the LlmClient trait for a locally hosted model served
//! by Ollama (`POST /api/generate`, non-streaming).

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::llm::client::{LlmClient, LlmError};
use crate::llm::types::{ErrorBody, GenerateRequest, GenerateResponse, Usage};

/// Default Ollama server address
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Default model to use
pub const DEFAULT_MODEL: &str = "llama3.2";

/// Default HTTP timeout; local models can take a while on a cold start
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Configuration for the Ollama client
#[derive(Debug, Clone, PartialEq)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub temperature: Option<f32>,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            temperature: None,
        }
    }
}

impl OllamaConfig {
    /// Create a new config with a specific model
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }
}

/// Ollama API client
pub struct OllamaClient {
    client: Client,
    config: OllamaConfig,
    usage: Arc<Mutex<Usage>>,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(config: OllamaConfig) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            config,
            usage: Arc::new(Mutex::new(Usage::default())),
        })
    }

    /// Full URL of the generate endpoint
    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.config.base_url.trim_end_matches('/'))
    }

    /// Build the request body for one prompt
    fn build_request(&self, prompt: &str) -> GenerateRequest {
        GenerateRequest::new(&self.config.model, prompt).with_temperature(self.config.temperature)
    }

    /// Turn a decoded response into completion text, tracking usage
    fn parse_response(&self, body: GenerateResponse) -> Result<String, LlmError> {
        if !body.done && body.response.is_empty() {
            return Err(LlmError::InvalidResponse(
                "server returned an unfinished, empty generation".to_string(),
            ));
        }

        if let Ok(mut total) = self.usage.lock() {
            total.add(&body.usage());
        }

        Ok(body.response)
    }

    /// Map a non-2xx response to an API error, preferring Ollama's `{"error": ...}` body
    fn api_error(status: u16, body: &str) -> LlmError {
        let message = serde_json::from_str::<ErrorBody>(body)
            .map(|e| e.error)
            .unwrap_or_else(|_| {
                if body.trim().is_empty() {
                    "Unknown error".to_string()
                } else {
                    body.trim().to_string()
                }
            });
        LlmError::Api { status, message }
    }

    /// Send a request to the Ollama server
    async fn send_request(&self, body: &GenerateRequest) -> Result<GenerateResponse, LlmError> {
        let response = self
            .client
            .post(self.generate_url())
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.config.timeout)
                } else {
                    LlmError::Network(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(Self::api_error(status.as_u16(), &error_body));
        }

        response
            .json::<GenerateResponse>()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse response: {}", e)))
    }

    /// Get cumulative token usage
    pub fn total_usage(&self) -> Usage {
        self.usage.lock().map(|u| *u).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let body = self.build_request(prompt);
        log::debug!(
            "Requesting completion from {} ({} prompt chars)",
            self.config.model,
            prompt.len()
        );
        let response = self.send_request(&body).await?;
        self.parse_response(response)
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

impl std::fmt::Debug for OllamaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaClient")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .finish()
    }
}
