//! Core sandbox interface and a scripted implementation for tests

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{CandidateCode, ExecutionOutcome};

/// Runs one candidate in a fresh, disposable context.
///
/// Infallible by contract: anything that goes wrong (including the sandbox
/// itself failing to start) is an `ExecutionOutcome::Failure`. Implementations
/// must be safe for concurrent, independent calls.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Execute `candidate`, giving up and cleaning up after `timeout`
    async fn execute(&self, candidate: &CandidateCode, timeout: Duration) -> ExecutionOutcome;

    /// Human-readable name for logs
    fn description(&self) -> &str {
        "sandbox"
    }
}

/// Sandbox that returns queued outcomes without running anything.
///
/// Once the queue is empty the last outcome repeats. Records every candidate.
#[derive(Debug, Default)]
pub struct ScriptedSandbox {
    outcomes: Mutex<VecDeque<ExecutionOutcome>>,
    executed: Mutex<Vec<CandidateCode>>,
}

impl ScriptedSandbox {
    pub fn new(outcomes: Vec<ExecutionOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            executed: Mutex::new(Vec::new()),
        }
    }

    /// Every candidate executed so far, in order
    pub fn executed(&self) -> Vec<CandidateCode> {
        self.executed.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Sandbox for ScriptedSandbox {
    async fn execute(&self, candidate: &CandidateCode, _timeout: Duration) -> ExecutionOutcome {
        if let Ok(mut executed) = self.executed.lock() {
            executed.push(candidate.clone());
        }
        let Ok(mut outcomes) = self.outcomes.lock() else {
            return ExecutionOutcome::failure("SpawnError: scripted sandbox poisoned");
        };
        match outcomes.len() {
            0 => ExecutionOutcome::failure("SpawnError: no scripted outcome"),
            1 => outcomes.front().cloned().unwrap_or_else(|| ExecutionOutcome::failure("SpawnError: no scripted outcome")),
            _ => outcomes
                .pop_front()
                .unwrap_or_else(|| ExecutionOutcome::failure("SpawnError: no scripted outcome")),
        }
    }

    fn description(&self) -> &str {
        "scripted"
    }
}
