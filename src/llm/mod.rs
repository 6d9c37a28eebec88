//! Completion Service Layer - Ollama integration behind a narrow trait
//!
//! This module provides:
//! - LlmClient trait: `complete(prompt) -> text`
//! - OllamaClient implementation for a locally hosted model
//! - MockLlmClient with scripted responses
//! - Wire types for the Ollama generate endpoint

pub mod client;
pub mod ollama;
pub mod types;

pub use client::{LlmClient, LlmError, MockLlmClient};
pub use ollama::{OllamaClient, OllamaConfig};
pub use types::{GenerateRequest, GenerateResponse, Usage};
