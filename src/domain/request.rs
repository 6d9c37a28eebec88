//! The immutable input to one repair loop.

use serde::Serialize;

use super::language::TargetLanguage;
use crate::error::{CodemaxError, Result};

/// What to generate, in which language, and how many rounds the loop may spend.
///
/// Fields are private and [`GenerationRequest::new`] is the only constructor,
/// so every request holds a non-blank instruction and at least one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationRequest {
    instruction: String,
    target_language: TargetLanguage,
    max_rounds: u32,
}

impl GenerationRequest {
    /// Build a validated request.
    ///
    /// Rejects a blank instruction and a round ceiling of zero.
    pub fn new(
        instruction: impl Into<String>,
        target_language: TargetLanguage,
        max_rounds: u32,
    ) -> Result<Self> {
        let instruction = instruction.into();
        if instruction.trim().is_empty() {
            return Err(CodemaxError::InvalidRequest(
                "instruction must not be empty".to_string(),
            ));
        }
        if max_rounds == 0 {
            return Err(CodemaxError::InvalidRequest(
                "max_rounds must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            instruction,
            target_language,
            max_rounds,
        })
    }

    /// Parse the language by name, then validate like [`GenerationRequest::new`].
    pub fn parse(instruction: impl Into<String>, target_language: &str, max_rounds: u32) -> Result<Self> {
        Self::new(instruction, target_language.parse()?, max_rounds)
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn target_language(&self) -> TargetLanguage {
        self.target_language
    }

    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }
}
