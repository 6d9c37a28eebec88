//! Prompt System - Built-in templates and rendering
//!
//! This module provides the prompt templates for every action and renders
//! them with context variables using Handlebars.

mod render;
pub mod templates;

pub use render::PromptRenderer;
