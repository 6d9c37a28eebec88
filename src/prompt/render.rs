//! Prompt Renderer - Render templates with context variables using Handlebars
//!
//! This module provides the PromptRenderer struct which uses Handlebars to
//! render the built-in prompt templates. Rendering is a pure function of its
//! inputs, so the same failure always produces the same repair prompt.

use handlebars::Handlebars;
use serde::Serialize;
use serde_json::json;

use super::templates;
use crate::domain::{GenerationRequest, TargetLanguage};
use crate::error::{CodemaxError, Result};

/// Renders prompt templates using Handlebars templating
#[derive(Debug, Clone)]
pub struct PromptRenderer {
    handlebars: Handlebars<'static>,
}

impl Default for PromptRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptRenderer {
    /// Create a renderer with every built-in template registered
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        // Missing variables render as empty strings
        handlebars.set_strict_mode(false);
        // Prompts are plain text; code must reach the model untouched
        handlebars.register_escape_fn(handlebars::no_escape);

        let mut renderer = Self { handlebars };
        for (name, template) in templates::BUILTIN {
            if let Err(e) = renderer.register_template(name, template) {
                log::error!("Built-in template '{}' failed to register: {}", name, e);
            }
        }
        renderer
    }

    /// Register (or replace) a named template
    pub fn register_template(&mut self, name: &str, template: &str) -> Result<()> {
        self.handlebars
            .register_template_string(name, template)
            .map_err(|e| CodemaxError::Template(format!("Failed to register template '{}': {}", name, e)))
    }

    /// Check if a named template is registered
    pub fn has_template(&self, name: &str) -> bool {
        self.handlebars.get_template(name).is_some()
    }

    /// Render a registered template with any serializable context
    pub fn render_named<T: Serialize>(&self, name: &str, context: &T) -> Result<String> {
        self.handlebars
            .render(name, context)
            .map_err(|e| CodemaxError::Template(format!("Failed to render template '{}': {}", name, e)))
    }

    /// Prompt for round 1 of a repair loop
    pub fn initial_code_prompt(&self, request: &GenerationRequest) -> Result<String> {
        self.render_named(
            templates::INITIAL_CODE,
            &json!({
                "instruction": request.instruction(),
                "language": request.target_language().label(),
            }),
        )
    }

    /// Prompt for round n+1, built only from round n's source and error
    pub fn repair_prompt(&self, language: TargetLanguage, source: &str, error_message: &str) -> Result<String> {
        self.render_named(
            templates::REPAIR,
            &json!({
                "language": language.label(),
                "code": source,
                "error": error_message,
            }),
        )
    }

    pub fn modify_prompt(&self, instructions: &str, code: &str) -> Result<String> {
        self.render_named(
            templates::MODIFY,
            &json!({ "instructions": instructions, "code": code }),
        )
    }

    pub fn instructions_prompt(&self, context: &str, stories: &str, instructions: &str) -> Result<String> {
        self.render_named(
            templates::INSTRUCTIONS,
            &json!({
                "context": context,
                "stories": stories,
                "instructions": instructions,
            }),
        )
    }

    pub fn document_prompt(&self, code: &str) -> Result<String> {
        self.render_named(templates::DOCUMENT, &json!({ "code": code }))
    }

    pub fn unit_tests_prompt(&self, code: &str) -> Result<String> {
        self.render_named(templates::UNIT_TESTS, &json!({ "code": code }))
    }

    pub fn explain_prompt(&self, question: &str, code: &str) -> Result<String> {
        self.render_named(
            templates::EXPLAIN,
            &json!({ "question": question, "code": code }),
        )
    }
}
