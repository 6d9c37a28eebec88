//! Error types for codemax
//!
//! Centralized error handling using thiserror. Execution failures of generated
//! code are NOT errors: they are `ExecutionOutcome::Failure` values that the
//! repair loop feeds back to the model. Everything here terminates a call.

use thiserror::Error;

use crate::llm::LlmError;

/// All error types that can occur in codemax
#[derive(Debug, Error)]
pub enum CodemaxError {
    /// Request rejected before any work started
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The completion service failed; never retried by the repair loop
    #[error("Completion service error in round {round}: {source}")]
    Completion {
        round: u32,
        #[source]
        source: LlmError,
    },

    /// The caller cancelled the loop between rounds
    #[error("Loop cancelled after {rounds_completed} completed round(s)")]
    Cancelled { rounds_completed: u32 },

    /// A follow-up question was asked before any code converged
    #[error("No successful code has been recorded yet")]
    NoSuccessYet,

    /// Prompt template registration or rendering failed
    #[error("Template error: {0}")]
    Template(String),

    /// Result store error
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CodemaxError {
    /// Wrap a completion service failure with the round it happened in.
    pub fn completion(round: u32, source: LlmError) -> Self {
        CodemaxError::Completion { round, source }
    }
}

/// Result type alias for codemax operations
pub type Result<T> = std::result::Result<T, CodemaxError>;
