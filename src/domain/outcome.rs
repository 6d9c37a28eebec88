//! Execution and loop outcome types.

use serde::{Deserialize, Serialize};

/// Result of executing exactly one candidate in the sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// The program ran to completion; stdout is verbatim
    Success { stdout: String },
    /// Parse error, runtime error, non-zero exit or timeout
    Failure { error_message: String },
}

impl ExecutionOutcome {
    pub fn success(stdout: impl Into<String>) -> Self {
        ExecutionOutcome::Success {
            stdout: stdout.into(),
        }
    }

    pub fn failure(error_message: impl Into<String>) -> Self {
        ExecutionOutcome::Failure {
            error_message: error_message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success { .. })
    }

    /// The error message if this is a failure.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            ExecutionOutcome::Success { .. } => None,
            ExecutionOutcome::Failure { error_message } => Some(error_message),
        }
    }
}

/// Terminal value of one repair loop invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum LoopResult {
    /// A candidate ran cleanly
    Converged {
        code: String,
        stdout: String,
        rounds_used: u32,
    },
    /// The round ceiling was reached; best attempt with its unresolved error
    Exhausted {
        last_code: String,
        last_error: String,
        rounds_used: u32,
    },
}

impl LoopResult {
    pub fn is_converged(&self) -> bool {
        matches!(self, LoopResult::Converged { .. })
    }

    pub fn rounds_used(&self) -> u32 {
        match self {
            LoopResult::Converged { rounds_used, .. } | LoopResult::Exhausted { rounds_used, .. } => {
                *rounds_used
            }
        }
    }

    /// The final code, working or not.
    pub fn code(&self) -> &str {
        match self {
            LoopResult::Converged { code, .. } => code,
            LoopResult::Exhausted { last_code, .. } => last_code,
        }
    }
}
