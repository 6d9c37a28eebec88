//! Loop state owned by the repair loop, and the report handed back to callers.

use serde::{Deserialize, Serialize};

use super::candidate::{CandidateCode, Completion};
use super::outcome::{ExecutionOutcome, LoopResult};

/// One full generate -> extract -> execute cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round: u32,
    /// Prompt sent to the completion service this round
    pub prompt: String,
    pub completion: Completion,
    pub candidate: CandidateCode,
    pub outcome: ExecutionOutcome,
    /// Short SHA-256 of the candidate source
    pub source_digest: String,
    pub duration_ms: u64,
}

impl RoundRecord {
    /// One-line summary for diagnostic display.
    pub fn summary(&self) -> String {
        match &self.outcome {
            ExecutionOutcome::Success { .. } => format!("round {} succeeded", self.round),
            ExecutionOutcome::Failure { error_message } => {
                let first_line = error_message.lines().next().unwrap_or("");
                format!("round {} failed with: {}", self.round, first_line)
            }
        }
    }
}

/// Mutable state of one loop invocation.
///
/// `round` starts at 1 and only moves forward; `history` is append-only.
#[derive(Debug, Clone)]
pub struct LoopState {
    round: u32,
    last_prompt: String,
    history: Vec<RoundRecord>,
}

impl LoopState {
    pub fn new(initial_prompt: impl Into<String>) -> Self {
        Self {
            round: 1,
            last_prompt: initial_prompt.into(),
            history: Vec::new(),
        }
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn last_prompt(&self) -> &str {
        &self.last_prompt
    }

    pub fn history(&self) -> &[RoundRecord] {
        &self.history
    }

    /// Most recent entry, if any round has finished.
    pub fn last(&self) -> Option<&RoundRecord> {
        self.history.last()
    }

    /// Number of rounds that produced an outcome.
    pub fn rounds_completed(&self) -> u32 {
        self.history.len() as u32
    }

    /// Append the outcome of the current round.
    pub fn record(&mut self, record: RoundRecord) {
        debug_assert_eq!(record.round, self.round, "history must be recorded in round order");
        self.history.push(record);
    }

    /// Move to the next round with the prompt built from this round's failure.
    pub fn advance(&mut self, next_prompt: impl Into<String>) {
        self.round += 1;
        self.last_prompt = next_prompt.into();
    }

    /// Close the loop, keeping the history for the caller.
    pub fn into_report(self, result: LoopResult) -> LoopReport {
        LoopReport {
            result,
            history: self.history,
        }
    }
}

/// What a loop invocation returns: the terminal result plus its history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopReport {
    pub result: LoopResult,
    pub history: Vec<RoundRecord>,
}

impl LoopReport {
    /// Rounds that ended in failure, in order.
    pub fn failures(&self) -> impl Iterator<Item = &RoundRecord> {
        self.history.iter().filter(|r| !r.outcome.is_success())
    }

    /// "round N failed with: ..." lines for every failed round.
    pub fn diagnostics(&self) -> Vec<String> {
        self.failures().map(RoundRecord::summary).collect()
    }
}
