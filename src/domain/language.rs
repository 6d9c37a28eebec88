//! Target languages the loop can generate and execute.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CodemaxError;

/// A language the model is asked to write and the sandbox knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetLanguage {
    Python,
    JavaScript,
    Java,
    Cpp,
    Go,
    Shell,
}

impl TargetLanguage {
    /// Every supported language, in menu order.
    pub const ALL: [TargetLanguage; 6] = [
        TargetLanguage::Python,
        TargetLanguage::JavaScript,
        TargetLanguage::Java,
        TargetLanguage::Cpp,
        TargetLanguage::Go,
        TargetLanguage::Shell,
    ];

    /// Display name used in prompts ("Output must have only Python code").
    pub fn label(&self) -> &'static str {
        match self {
            TargetLanguage::Python => "Python",
            TargetLanguage::JavaScript => "JavaScript",
            TargetLanguage::Java => "Java",
            TargetLanguage::Cpp => "C++",
            TargetLanguage::Go => "Go",
            TargetLanguage::Shell => "Shell",
        }
    }

    /// Stable lowercase key, used in configuration maps.
    pub fn slug(&self) -> &'static str {
        match self {
            TargetLanguage::Python => "python",
            TargetLanguage::JavaScript => "javascript",
            TargetLanguage::Java => "java",
            TargetLanguage::Cpp => "cpp",
            TargetLanguage::Go => "go",
            TargetLanguage::Shell => "shell",
        }
    }

    /// Other names models commonly put on a fence or label line.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            TargetLanguage::Python => &["python", "python3", "py"],
            TargetLanguage::JavaScript => &["javascript", "js", "node", "nodejs"],
            TargetLanguage::Java => &["java"],
            TargetLanguage::Cpp => &["c++", "cpp", "cxx"],
            TargetLanguage::Go => &["go", "golang"],
            TargetLanguage::Shell => &["shell", "sh", "bash"],
        }
    }

    /// Whether `candidate` names this language (case-insensitive).
    pub fn matches_label(&self, candidate: &str) -> bool {
        let candidate = candidate.trim();
        !candidate.is_empty()
            && self
                .aliases()
                .iter()
                .any(|alias| alias.eq_ignore_ascii_case(candidate))
    }
}

impl fmt::Display for TargetLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TargetLanguage {
    type Err = CodemaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TargetLanguage::ALL
            .into_iter()
            .find(|lang| lang.matches_label(s))
            .ok_or_else(|| {
                CodemaxError::InvalidRequest(format!(
                    "unsupported target language '{}' (expected one of: {})",
                    s.trim(),
                    TargetLanguage::ALL
                        .iter()
                        .map(|l| l.slug())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })
    }
}
