//! Core completion service trait, its error type, and a scripted mock

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

/// Stateless text-completion service - each call is independent (fresh context)
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Single completion (blocking until the whole text is available)
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    /// Model name, for logs and reports
    fn model(&self) -> &str;
}

/// Errors that can occur while talking to the completion service
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Completion timed out after {0:?}")]
    Timeout(Duration),

    #[error("No scripted response left")]
    Exhausted,
}

impl LlmError {
    /// Whether the backend itself looks unreachable (as opposed to misbehaving)
    pub fn is_unreachable(&self) -> bool {
        match self {
            LlmError::Network(e) => e.is_connect() || e.is_timeout(),
            LlmError::Timeout(_) => true,
            LlmError::Api { .. } | LlmError::InvalidResponse(_) | LlmError::Exhausted => false,
        }
    }
}

/// Scripted completion service for tests and dry runs.
///
/// Returns the queued responses in order and records every prompt it receives.
/// A queued `Err` text becomes an `LlmError::Api { status: 500 }`.
#[derive(Debug, Default)]
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
    repeat_last: bool,
}

impl MockLlmClient {
    /// Answer with `responses` in order, then fail with `LlmError::Exhausted`
    pub fn new<S: Into<String>>(responses: Vec<S>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(|r| Ok(r.into())).collect()),
            ..Default::default()
        }
    }

    /// Answer every prompt with the same text
    pub fn repeating(response: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::from([Ok(response.into())])),
            repeat_last: true,
            ..Default::default()
        }
    }

    /// Mix of successful responses and backend failures
    pub fn scripted(script: Vec<Result<String, String>>) -> Self {
        Self {
            responses: Mutex::new(script.into_iter().collect()),
            ..Default::default()
        }
    }

    /// Every prompt received so far, in call order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Number of completion calls made
    pub fn call_count(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        let mut responses = self
            .responses
            .lock()
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let next = if self.repeat_last && responses.len() == 1 {
            responses.front().cloned()
        } else {
            responses.pop_front()
        };

        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(LlmError::Api { status: 500, message }),
            None => Err(LlmError::Exhausted),
        }
    }

    fn model(&self) -> &str {
        "mock-model"
    }
}
