//! Domain types for codemax
//!
//! This module contains the values that flow through one repair loop:
//! - GenerationRequest: what to build, in which language, with a round ceiling
//! - Completion / CandidateCode: per-round model text and the code extracted from it
//! - ExecutionOutcome: Success or Failure for exactly one candidate
//! - LoopState / RoundRecord: the loop's private, append-only history
//! - LoopResult / LoopReport: what the caller gets back

pub mod candidate;
pub mod language;
pub mod outcome;
pub mod request;
pub mod state;

pub use candidate::{CandidateCode, Completion};
pub use language::TargetLanguage;
pub use outcome::{ExecutionOutcome, LoopResult};
pub use request::GenerationRequest;
pub use state::{LoopReport, LoopState, RoundRecord};
