//! Per-round values: the raw completion and the code extracted from it.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::language::TargetLanguage;

/// Raw text returned by the completion service for one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub raw_text: String,
    pub round: u32,
}

impl Completion {
    pub fn new(raw_text: impl Into<String>, round: u32) -> Self {
        Self {
            raw_text: raw_text.into(),
            round,
        }
    }
}

/// Source code extracted from a completion, not yet known to work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCode {
    pub source: String,
    pub round: u32,
    pub language: TargetLanguage,
}

impl CandidateCode {
    pub fn new(source: impl Into<String>, round: u32, language: TargetLanguage) -> Self {
        Self {
            source: source.into(),
            round,
            language,
        }
    }

    /// True when nothing but whitespace was extracted.
    pub fn is_blank(&self) -> bool {
        self.source.trim().is_empty()
    }

    /// Short content hash, used to spot a model repeating the same candidate.
    ///
    /// Format: first 8 bytes of SHA-256 as 16 hex chars.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.source.as_bytes());
        let result = hasher.finalize();
        hex::encode(&result[..8])
    }
}
