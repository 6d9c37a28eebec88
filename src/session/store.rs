//! Result store trait and the record it keeps

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{LoopResult, TargetLanguage};
use crate::error::{CodemaxError, Result};

/// The most recent converged program, kept for follow-up questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastSuccess {
    pub code: String,
    pub stdout: String,
    pub language: TargetLanguage,
    pub instruction: String,
    pub rounds_used: u32,
    pub recorded_at: DateTime<Utc>,
}

impl LastSuccess {
    pub fn new(code: impl Into<String>, stdout: impl Into<String>, language: TargetLanguage) -> Self {
        Self {
            code: code.into(),
            stdout: stdout.into(),
            language,
            instruction: String::new(),
            rounds_used: 1,
            recorded_at: Utc::now(),
        }
    }

    /// Build from a loop result; `None` unless it converged.
    pub fn from_result(result: &LoopResult, language: TargetLanguage, instruction: &str) -> Option<Self> {
        match result {
            LoopResult::Converged {
                code,
                stdout,
                rounds_used,
            } => Some(Self {
                code: code.clone(),
                stdout: stdout.clone(),
                language,
                instruction: instruction.to_string(),
                rounds_used: *rounds_used,
                recorded_at: Utc::now(),
            }),
            LoopResult::Exhausted { .. } => None,
        }
    }
}

/// Narrow session store: remembers only the latest success.
pub trait ResultStore: Send + Sync {
    fn put_last_success(&self, success: LastSuccess) -> Result<()>;

    fn get_last_success(&self) -> Result<Option<LastSuccess>>;
}

/// In-process store; lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryResultStore {
    last: RwLock<Option<LastSuccess>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResultStore for MemoryResultStore {
    fn put_last_success(&self, success: LastSuccess) -> Result<()> {
        let mut last = self.last.write().map_err(|e| CodemaxError::Storage(e.to_string()))?;
        *last = Some(success);
        Ok(())
    }

    fn get_last_success(&self) -> Result<Option<LastSuccess>> {
        let last = self.last.read().map_err(|e| CodemaxError::Storage(e.to_string()))?;
        Ok(last.clone())
    }
}
