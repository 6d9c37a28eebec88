//! Program briefs: context, personas and user stories for drafting instructions

use serde::{Deserialize, Serialize};

use crate::error::{CodemaxError, Result};

pub const MAX_CONTEXT_CHARS: usize = 1000;
pub const MAX_PERSONAS: usize = 3;
pub const MAX_STORIES: usize = 5;

/// Someone the program is for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    pub description: String,
}

/// "As a {persona} I want to {action} so that {benefit}"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStory {
    pub persona: String,
    pub action: String,
    pub benefit: String,
}

impl UserStory {
    pub fn to_line(&self) -> String {
        format!(
            "As a {} I want to {} so that {}",
            self.persona, self.action, self.benefit
        )
    }
}

/// Everything needed to draft build instructions for a new program.
///
/// Usually loaded from a YAML file:
///
/// ```yaml
/// context: A command-line tool that tracks reading habits.
/// personas:
///   - name: Reader
///     description: Reads a few books a month
/// stories:
///   - persona: Reader
///     action: log the book I finished
///     benefit: I can see my yearly total
/// instructions: Store data in a local JSON file.
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgramBrief {
    pub context: String,
    pub personas: Vec<Persona>,
    pub stories: Vec<UserStory>,
    pub instructions: String,
}

impl ProgramBrief {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            ..Default::default()
        }
    }

    pub fn persona(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.personas.push(Persona {
            name: name.into(),
            description: description.into(),
        });
        self
    }

    pub fn story(mut self, persona: impl Into<String>, action: impl Into<String>, benefit: impl Into<String>) -> Self {
        self.stories.push(UserStory {
            persona: persona.into(),
            action: action.into(),
            benefit: benefit.into(),
        });
        self
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Parse a brief from YAML text
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| CodemaxError::InvalidRequest(format!("invalid program brief: {}", e)))
    }

    /// Check the limits and that every story names a declared persona.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(CodemaxError::InvalidRequest(msg));

        if self.context.trim().is_empty() {
            return invalid("program context must not be empty".to_string());
        }
        let context_chars = self.context.chars().count();
        if context_chars > MAX_CONTEXT_CHARS {
            return invalid(format!(
                "program context is {} characters; the limit is {}",
                context_chars, MAX_CONTEXT_CHARS
            ));
        }
        if self.personas.len() > MAX_PERSONAS {
            return invalid(format!("at most {} personas are allowed", MAX_PERSONAS));
        }
        if self.stories.len() > MAX_STORIES {
            return invalid(format!("at most {} user stories are allowed", MAX_STORIES));
        }
        for persona in &self.personas {
            if persona.name.trim().is_empty() || persona.description.trim().is_empty() {
                return invalid("every persona needs a name and a description".to_string());
            }
        }
        for (i, story) in self.stories.iter().enumerate() {
            if story.action.trim().is_empty() || story.benefit.trim().is_empty() {
                return invalid(format!("user story {} needs an action and a benefit", i + 1));
            }
            if !self.personas.iter().any(|p| p.name == story.persona) {
                return invalid(format!(
                    "user story {} names unknown persona '{}'",
                    i + 1,
                    story.persona
                ));
            }
        }
        Ok(())
    }

    /// One line per story, newline separated
    pub fn story_lines(&self) -> String {
        self.stories
            .iter()
            .map(UserStory::to_line)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
