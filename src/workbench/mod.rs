//! Workbench - the caller-facing API
//!
//! Wraps the repair loop and the result store, and adds the one-shot coding
//! actions (modify, document, unit tests, drafting instructions, follow-up
//! questions) that go straight to the completion service without a loop.

mod brief;

pub use brief::{MAX_CONTEXT_CHARS, MAX_PERSONAS, MAX_STORIES, Persona, ProgramBrief, UserStory};

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::domain::{GenerationRequest, LoopReport, TargetLanguage};
use crate::error::{CodemaxError, Result};
use crate::llm::{LlmClient, LlmError};
use crate::prompt::PromptRenderer;
use crate::runner::{CancelSignal, LoopEvent, NeverCancel, RepairLoop, RepairLoopConfig};
use crate::sandbox::Sandbox;
use crate::session::{LastSuccess, ResultStore};

/// Instructions drafted from a brief, and the loop run on them
#[derive(Debug, Clone)]
pub struct BriefRun {
    pub instructions: String,
    pub report: LoopReport,
}

pub struct Workbench<L, S>
where
    L: LlmClient + ?Sized,
    S: Sandbox + ?Sized,
{
    llm: Arc<L>,
    repair: RepairLoop<L, S>,
    prompts: PromptRenderer,
    store: Arc<dyn ResultStore>,
}

impl<L, S> Workbench<L, S>
where
    L: LlmClient + ?Sized,
    S: Sandbox + ?Sized,
{
    pub fn new(llm: Arc<L>, sandbox: Arc<S>, store: Arc<dyn ResultStore>) -> Self {
        Self::with_config(llm, sandbox, store, RepairLoopConfig::default())
    }

    pub fn with_config(llm: Arc<L>, sandbox: Arc<S>, store: Arc<dyn ResultStore>, config: RepairLoopConfig) -> Self {
        let prompts = PromptRenderer::new();
        Self {
            repair: RepairLoop::with_config(llm.clone(), sandbox, prompts.clone(), config),
            llm,
            prompts,
            store,
        }
    }

    /// Forward repair loop progress to `sender`
    pub fn with_events(mut self, sender: mpsc::Sender<LoopEvent>) -> Self {
        self.repair = self.repair.with_events(sender);
        self
    }

    /// Run the repair loop for `instruction` and remember a converged result.
    pub async fn generate(&self, instruction: &str, language: &str, max_rounds: u32) -> Result<LoopReport> {
        let request = GenerationRequest::parse(instruction, language, max_rounds)?;
        self.run(&request).await
    }

    pub async fn run(&self, request: &GenerationRequest) -> Result<LoopReport> {
        self.run_with_cancel(request, &NeverCancel).await
    }

    /// Run the loop, checking `cancel` between rounds.
    ///
    /// A store failure is logged and does not cost the caller the report.
    pub async fn run_with_cancel(&self, request: &GenerationRequest, cancel: &dyn CancelSignal) -> Result<LoopReport> {
        let report = self.repair.run_with_cancel(request, cancel).await?;
        if let Some(success) = LastSuccess::from_result(&report.result, request.target_language(), request.instruction())
            && let Err(e) = self.store.put_last_success(success)
        {
            log::warn!("Failed to record the last working program: {}", e);
        }
        Ok(report)
    }

    /// Rewrite `code` following `instructions`.
    pub async fn modify_code(&self, instructions: &str, code: &str) -> Result<String> {
        require("instructions", instructions)?;
        require("code", code)?;
        let prompt = self.prompts.modify_prompt(instructions, code)?;
        self.complete_once(&prompt).await
    }

    /// Turn a program brief into bulleted, step-by-step build instructions.
    pub async fn draft_instructions(&self, brief: &ProgramBrief) -> Result<String> {
        brief.validate()?;
        let prompt = self
            .prompts
            .instructions_prompt(&brief.context, &brief.story_lines(), &brief.instructions)?;
        self.complete_once(&prompt).await
    }

    /// Draft instructions from `brief`, then run the repair loop on them.
    pub async fn generate_from_brief(&self, brief: &ProgramBrief, language: TargetLanguage, max_rounds: u32) -> Result<BriefRun> {
        self.generate_from_brief_with_cancel(brief, language, max_rounds, &NeverCancel)
            .await
    }

    /// Like [`generate_from_brief`](Self::generate_from_brief), checking `cancel` between rounds.
    pub async fn generate_from_brief_with_cancel(
        &self,
        brief: &ProgramBrief,
        language: TargetLanguage,
        max_rounds: u32,
        cancel: &dyn CancelSignal,
    ) -> Result<BriefRun> {
        let instructions = self.draft_instructions(brief).await?;
        let request = GenerationRequest::new(instructions.clone(), language, max_rounds)?;
        let report = self.run_with_cancel(&request, cancel).await?;
        Ok(BriefRun { instructions, report })
    }

    /// Introduction plus a detailed explanation of `code`.
    pub async fn document_code(&self, code: &str) -> Result<String> {
        require("code", code)?;
        let prompt = self.prompts.document_prompt(code)?;
        self.complete_once(&prompt).await
    }

    /// Unit tests for `code`, in the same language.
    pub async fn unit_tests(&self, code: &str) -> Result<String> {
        require("code", code)?;
        let prompt = self.prompts.unit_tests_prompt(code)?;
        self.complete_once(&prompt).await
    }

    /// Answer a question about the last program that converged.
    pub async fn explain(&self, question: &str) -> Result<String> {
        require("question", question)?;
        let last = self.store.get_last_success()?.ok_or(CodemaxError::NoSuccessYet)?;
        let prompt = self.prompts.explain_prompt(question, &last.code)?;
        self.complete_once(&prompt).await
    }

    /// The completion service, e.g. for usage totals after a run
    pub fn llm(&self) -> &L {
        &self.llm
    }

    /// Single completion outside any loop, reported as round 1.
    async fn complete_once(&self, prompt: &str) -> Result<String> {
        let limit = self.repair.config().completion_timeout;
        match tokio::time::timeout(limit, self.llm.complete(prompt)).await {
            Ok(Ok(text)) => Ok(text.trim().to_string()),
            Ok(Err(e)) => Err(CodemaxError::completion(1, e)),
            Err(_) => Err(CodemaxError::completion(1, LlmError::Timeout(limit))),
        }
    }
}

fn require(what: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CodemaxError::InvalidRequest(format!("{} must not be empty", what)));
    }
    Ok(())
}
