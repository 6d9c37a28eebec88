//! Repair loop implementation - generate, execute, feed the error back.
//!
//! Each round sends one fresh prompt to the completion service, extracts the
//! candidate, runs it in the sandbox and either converges or builds the next
//! prompt from the candidate and its error. Rounds are bounded by the request.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::domain::{Completion, ExecutionOutcome, GenerationRequest, LoopReport, LoopResult, LoopState, RoundRecord};
use crate::error::{CodemaxError, Result};
use crate::extract::extract;
use crate::llm::{LlmClient, LlmError};
use crate::prompt::PromptRenderer;
use crate::runner::event::LoopEvent;
use crate::runner::signal::{CancelSignal, NeverCancel};
use crate::sandbox::Sandbox;

/// Configuration for the RepairLoop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepairLoopConfig {
    /// Wall-clock limit for one sandbox execution
    pub execution_timeout: Duration,
    /// Limit for one completion service call
    pub completion_timeout: Duration,
}

impl Default for RepairLoopConfig {
    fn default() -> Self {
        Self {
            execution_timeout: Duration::from_secs(10),
            completion_timeout: Duration::from_secs(120),
        }
    }
}

/// Bounded generate-execute-repair state machine.
///
/// Holds no per-run state, so one instance can serve concurrent `run` calls.
pub struct RepairLoop<L, S>
where
    L: LlmClient + ?Sized,
    S: Sandbox + ?Sized,
{
    llm: Arc<L>,
    sandbox: Arc<S>,
    prompts: PromptRenderer,
    config: RepairLoopConfig,
    events: Option<mpsc::Sender<LoopEvent>>,
}

impl<L, S> RepairLoop<L, S>
where
    L: LlmClient + ?Sized,
    S: Sandbox + ?Sized,
{
    pub fn new(llm: Arc<L>, sandbox: Arc<S>, prompts: PromptRenderer) -> Self {
        Self::with_config(llm, sandbox, prompts, RepairLoopConfig::default())
    }

    pub fn with_config(llm: Arc<L>, sandbox: Arc<S>, prompts: PromptRenderer, config: RepairLoopConfig) -> Self {
        Self {
            llm,
            sandbox,
            prompts,
            config,
            events: None,
        }
    }

    /// Send progress events to `sender`; a dropped or full receiver is ignored.
    pub fn with_events(mut self, sender: mpsc::Sender<LoopEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    pub fn config(&self) -> &RepairLoopConfig {
        &self.config
    }

    /// Run until a candidate executes cleanly or `max_rounds` is reached.
    pub async fn run(&self, request: &GenerationRequest) -> Result<LoopReport> {
        self.run_with_cancel(request, &NeverCancel).await
    }

    /// Like [`run`](Self::run), checking `cancel` before every round.
    pub async fn run_with_cancel(&self, request: &GenerationRequest, cancel: &dyn CancelSignal) -> Result<LoopReport> {
        let language = request.target_language();
        let max_rounds = request.max_rounds();
        let mut state = LoopState::new(self.prompts.initial_code_prompt(request)?);

        tracing::info!(
            language = %language,
            max_rounds,
            model = self.llm.model(),
            sandbox = self.sandbox.description(),
            "Repair loop started"
        );

        loop {
            let round = state.round();
            if cancel.is_cancelled() {
                tracing::info!(round, "Repair loop cancelled");
                return Err(CodemaxError::Cancelled {
                    rounds_completed: state.rounds_completed(),
                });
            }

            self.emit(LoopEvent::RoundStarted {
                round,
                max_rounds,
                language,
            });
            let started = Instant::now();

            let prompt = state.last_prompt().to_string();
            let raw_text = self.complete(round, &prompt).await?;
            let completion = Completion::new(raw_text, round);
            let candidate = extract(&completion, language);
            let source_digest = candidate.digest();

            if state.last().is_some_and(|prev| prev.source_digest == source_digest) {
                tracing::warn!(round, digest = %source_digest, "Model returned the same failing candidate again");
            }

            let outcome = self.sandbox.execute(&candidate, self.config.execution_timeout).await;
            let duration_ms = started.elapsed().as_millis() as u64;
            let source = candidate.source.clone();

            state.record(RoundRecord {
                round,
                prompt,
                completion,
                candidate,
                outcome: outcome.clone(),
                source_digest,
                duration_ms,
            });

            match outcome {
                ExecutionOutcome::Success { stdout } => {
                    tracing::info!(round, duration_ms, "Candidate executed successfully");
                    self.emit(LoopEvent::Converged { rounds_used: round });
                    return Ok(state.into_report(LoopResult::Converged {
                        code: source,
                        stdout,
                        rounds_used: round,
                    }));
                }
                ExecutionOutcome::Failure { error_message } => {
                    tracing::debug!(round, duration_ms, error = %first_line(&error_message), "Candidate failed");
                    self.emit(LoopEvent::RoundFailed {
                        round,
                        error_message: error_message.clone(),
                    });

                    if round >= max_rounds {
                        tracing::warn!(rounds_used = round, "Round ceiling reached without a working candidate");
                        self.emit(LoopEvent::Exhausted { rounds_used: round });
                        return Ok(state.into_report(LoopResult::Exhausted {
                            last_code: source,
                            last_error: error_message,
                            rounds_used: round,
                        }));
                    }

                    let next_prompt = self.prompts.repair_prompt(language, &source, &error_message)?;
                    state.advance(next_prompt);
                }
            }
        }
    }

    /// One completion service call, bounded by `completion_timeout`; never retried.
    async fn complete(&self, round: u32, prompt: &str) -> Result<String> {
        let limit = self.config.completion_timeout;
        match tokio::time::timeout(limit, self.llm.complete(prompt)).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => {
                tracing::error!(round, error = %e, "Completion service failed");
                Err(CodemaxError::completion(round, e))
            }
            Err(_) => {
                tracing::error!(round, timeout_ms = limit.as_millis() as u64, "Completion service timed out");
                Err(CodemaxError::completion(round, LlmError::Timeout(limit)))
            }
        }
    }

    /// Never waits on the receiver; a lagging display loses events instead.
    fn emit(&self, event: LoopEvent) {
        let Some(sender) = &self.events else {
            return;
        };
        match sender.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::debug!(?event, "Event receiver is not keeping up, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TargetLanguage;
    use crate::llm::MockLlmClient;
    use crate::runner::signal::CancelFlag;
    use crate::sandbox::ScriptedSandbox;
    use async_trait::async_trait;

    fn request(max_rounds: u32) -> GenerationRequest {
        GenerationRequest::new("print a greeting", TargetLanguage::Python, max_rounds).unwrap()
    }

    fn repair_loop(llm: MockLlmClient, sandbox: ScriptedSandbox) -> (RepairLoop<MockLlmClient, ScriptedSandbox>, Arc<MockLlmClient>, Arc<ScriptedSandbox>) {
        let llm = Arc::new(llm);
        let sandbox = Arc::new(sandbox);
        let runner = RepairLoop::new(llm.clone(), sandbox.clone(), PromptRenderer::new());
        (runner, llm, sandbox)
    }

    #[test]
    fn test_config_default() {
        let config = RepairLoopConfig::default();
        assert_eq!(config.execution_timeout, Duration::from_secs(10));
        assert_eq!(config.completion_timeout, Duration::from_secs(120));
    }

    #[tokio::test]
    async fn test_converges_in_first_round() {
        let (runner, llm, _) = repair_loop(
            MockLlmClient::repeating("```python\nprint('hi')\n```"),
            ScriptedSandbox::new(vec![ExecutionOutcome::success("hi\n")]),
        );
        let report = runner.run(&request(3)).await.unwrap();
        assert_eq!(
            report.result,
            LoopResult::Converged {
                code: "print('hi')\n".to_string(),
                stdout: "hi\n".to_string(),
                rounds_used: 1,
            }
        );
        assert_eq!(report.history.len(), 1);
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_exhausts_after_max_rounds() {
        let (runner, llm, sandbox) = repair_loop(
            MockLlmClient::repeating("print(1/0)"),
            ScriptedSandbox::new(vec![ExecutionOutcome::failure("RuntimeError: division by zero")]),
        );
        let report = runner.run(&request(4)).await.unwrap();
        match &report.result {
            LoopResult::Exhausted {
                last_code,
                last_error,
                rounds_used,
            } => {
                assert_eq!(last_code, "print(1/0)");
                assert_eq!(last_error, "RuntimeError: division by zero");
                assert_eq!(*rounds_used, 4);
            }
            other => panic!("expected Exhausted, got {:?}", other),
        }
        assert_eq!(report.history.len(), 4);
        assert!(report.history.iter().all(|r| !r.outcome.is_success()));
        assert_eq!(llm.call_count(), 4);
        assert_eq!(sandbox.executed().len(), 4);
    }

    #[tokio::test]
    async fn test_history_rounds_are_ordered_from_one() {
        let (runner, _, _) = repair_loop(
            MockLlmClient::repeating("x"),
            ScriptedSandbox::new(vec![ExecutionOutcome::failure("RuntimeError: x")]),
        );
        let report = runner.run(&request(3)).await.unwrap();
        let rounds: Vec<u32> = report.history.iter().map(|r| r.round).collect();
        assert_eq!(rounds, vec![1, 2, 3]);
        assert_eq!(report.diagnostics()[2], "round 3 failed with: RuntimeError: x");
    }

    #[tokio::test]
    async fn test_repair_prompt_carries_error_verbatim() {
        let error = "Traceback (most recent call last):\n  File \"main.py\", line 1\nZeroDivisionError: division by zero";
        let (runner, llm, _) = repair_loop(
            MockLlmClient::new(vec!["print(1/0)", "print('ok')"]),
            ScriptedSandbox::new(vec![ExecutionOutcome::failure(error), ExecutionOutcome::success("ok")]),
        );
        let report = runner.run(&request(2)).await.unwrap();
        assert_eq!(
            report.result,
            LoopResult::Converged {
                code: "print('ok')".to_string(),
                stdout: "ok".to_string(),
                rounds_used: 2,
            }
        );
        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].contains(error));
        assert!(prompts[1].contains("print(1/0)"));
        assert_eq!(report.history[1].prompt, prompts[1]);
    }

    #[tokio::test]
    async fn test_repair_prompt_is_deterministic() {
        let make = || {
            repair_loop(
                MockLlmClient::repeating("bad()"),
                ScriptedSandbox::new(vec![ExecutionOutcome::failure("NameError: bad")]),
            )
        };
        let (a, llm_a, _) = make();
        let (b, llm_b, _) = make();
        a.run(&request(2)).await.unwrap();
        b.run(&request(2)).await.unwrap();
        assert_eq!(llm_a.prompts(), llm_b.prompts());
    }

    #[tokio::test]
    async fn test_completion_error_is_terminal() {
        let (runner, llm, sandbox) = repair_loop(
            MockLlmClient::scripted(vec![Err("model not loaded".to_string())]),
            ScriptedSandbox::new(vec![ExecutionOutcome::success("unused")]),
        );
        let err = runner.run(&request(5)).await.unwrap_err();
        assert!(matches!(err, CodemaxError::Completion { round: 1, .. }));
        assert_eq!(llm.call_count(), 1);
        assert!(sandbox.executed().is_empty());
    }

    #[tokio::test]
    async fn test_completion_error_in_later_round_names_round() {
        let (runner, llm, _) = repair_loop(
            MockLlmClient::scripted(vec![Ok("bad()".to_string()), Err("connection reset".to_string())]),
            ScriptedSandbox::new(vec![ExecutionOutcome::failure("NameError: bad")]),
        );
        let err = runner.run(&request(5)).await.unwrap_err();
        assert!(matches!(err, CodemaxError::Completion { round: 2, .. }));
        assert_eq!(llm.call_count(), 2);
    }

    struct SlowLlm;

    #[async_trait]
    impl LlmClient for SlowLlm {
        async fn complete(&self, _prompt: &str) -> std::result::Result<String, LlmError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("too late".to_string())
        }

        fn model(&self) -> &str {
            "slow"
        }
    }

    #[tokio::test]
    async fn test_completion_timeout() {
        let runner = RepairLoop::with_config(
            Arc::new(SlowLlm),
            Arc::new(ScriptedSandbox::new(vec![ExecutionOutcome::success("x")])),
            PromptRenderer::new(),
            RepairLoopConfig {
                completion_timeout: Duration::from_millis(50),
                ..Default::default()
            },
        );
        let err = runner.run(&request(3)).await.unwrap_err();
        match err {
            CodemaxError::Completion {
                round: 1,
                source: LlmError::Timeout(limit),
            } => assert_eq!(limit, Duration::from_millis(50)),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancelled_before_first_round() {
        let (runner, llm, _) = repair_loop(
            MockLlmClient::repeating("x"),
            ScriptedSandbox::new(vec![ExecutionOutcome::success("x")]),
        );
        let flag = CancelFlag::new();
        flag.cancel();
        let err = runner.run_with_cancel(&request(3), &flag).await.unwrap_err();
        assert!(matches!(err, CodemaxError::Cancelled { rounds_completed: 0 }));
        assert_eq!(llm.call_count(), 0);
    }

    /// Cancels the shared flag after its first execution
    struct CancellingSandbox {
        flag: CancelFlag,
    }

    #[async_trait]
    impl Sandbox for CancellingSandbox {
        async fn execute(&self, _candidate: &crate::domain::CandidateCode, _timeout: Duration) -> ExecutionOutcome {
            self.flag.cancel();
            ExecutionOutcome::failure("RuntimeError: nope")
        }
    }

    #[tokio::test]
    async fn test_cancelled_between_rounds() {
        let flag = CancelFlag::new();
        let llm = Arc::new(MockLlmClient::repeating("x"));
        let runner = RepairLoop::new(
            llm.clone(),
            Arc::new(CancellingSandbox { flag: flag.clone() }),
            PromptRenderer::new(),
        );
        let err = runner.run_with_cancel(&request(5), &flag).await.unwrap_err();
        assert!(matches!(err, CodemaxError::Cancelled { rounds_completed: 1 }));
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_events_in_order() {
        let (tx, mut rx) = mpsc::channel(16);
        let llm = Arc::new(MockLlmClient::new(vec!["a", "b"]));
        let sandbox = Arc::new(ScriptedSandbox::new(vec![
            ExecutionOutcome::failure("RuntimeError: a"),
            ExecutionOutcome::success("b"),
        ]));
        let runner = RepairLoop::new(llm, sandbox, PromptRenderer::new()).with_events(tx);
        runner.run(&request(3)).await.unwrap();
        drop(runner);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], LoopEvent::RoundStarted { round: 1, max_rounds: 3, .. }));
        assert!(matches!(&events[1], LoopEvent::RoundFailed { round: 1, error_message } if error_message == "RuntimeError: a"));
        assert!(matches!(events[2], LoopEvent::RoundStarted { round: 2, .. }));
        assert_eq!(events[3], LoopEvent::Converged { rounds_used: 2 });
    }

    #[tokio::test]
    async fn test_dropped_event_receiver_does_not_stop_loop() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let runner = RepairLoop::new(
            Arc::new(MockLlmClient::repeating("x")),
            Arc::new(ScriptedSandbox::new(vec![ExecutionOutcome::failure("RuntimeError: x")])),
            PromptRenderer::new(),
        )
        .with_events(tx);
        let report = runner.run(&request(3)).await.unwrap();
        assert_eq!(report.result.rounds_used(), 3);
    }

    #[tokio::test]
    async fn test_stalled_event_receiver_does_not_block_loop() {
        let (tx, _rx) = mpsc::channel(1);
        let runner = RepairLoop::new(
            Arc::new(MockLlmClient::repeating("x")),
            Arc::new(ScriptedSandbox::new(vec![ExecutionOutcome::failure("RuntimeError: x")])),
            PromptRenderer::new(),
        )
        .with_events(tx);
        let report = tokio::time::timeout(Duration::from_secs(5), runner.run(&request(4)))
            .await
            .expect("loop blocked on a full event channel")
            .unwrap();
        assert_eq!(report.result.rounds_used(), 4);
    }

    #[tokio::test]
    async fn test_repeated_candidate_still_counts_as_round() {
        let (runner, _, _) = repair_loop(
            MockLlmClient::repeating("same()"),
            ScriptedSandbox::new(vec![ExecutionOutcome::failure("NameError: same")]),
        );
        let report = runner.run(&request(3)).await.unwrap();
        assert_eq!(report.history.len(), 3);
        let digests: Vec<&str> = report.history.iter().map(|r| r.source_digest.as_str()).collect();
        assert!(digests.windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test]
    async fn test_empty_extraction_flows_to_sandbox() {
        let (runner, _, sandbox) = repair_loop(
            MockLlmClient::repeating("```\n```"),
            ScriptedSandbox::new(vec![ExecutionOutcome::failure("EmptySource: no code")]),
        );
        let report = runner.run(&request(1)).await.unwrap();
        assert!(!report.result.is_converged());
        assert!(sandbox.executed()[0].is_blank());
    }

    #[tokio::test]
    async fn test_works_with_trait_objects() {
        let llm: Arc<dyn LlmClient> = Arc::new(MockLlmClient::repeating("ok"));
        let sandbox: Arc<dyn Sandbox> = Arc::new(ScriptedSandbox::new(vec![ExecutionOutcome::success("ok")]));
        let runner = RepairLoop::new(llm, sandbox, PromptRenderer::new());
        let report = runner.run(&request(1)).await.unwrap();
        assert!(report.result.is_converged());
    }

    #[test]
    fn test_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RepairLoop<MockLlmClient, ScriptedSandbox>>();
        assert_send_sync::<RepairLoop<dyn LlmClient, dyn Sandbox>>();
    }
}
