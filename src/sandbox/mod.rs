//! Execution Sandbox - runs untrusted candidates in disposable contexts
//!
//! This module provides:
//! - Sandbox trait: `execute(candidate, timeout) -> ExecutionOutcome`
//! - ProcessSandbox: child process per candidate in a fresh temp directory
//! - RunPlan: per-language file name and compile/run commands
//! - FailureKind/FailureDetail: uniform `<Kind>: <detail>` error messages
//! - ScriptedSandbox for tests

pub mod failure;
pub mod plan;
pub mod process;
pub mod traits;

pub use failure::{FailureDetail, FailureKind};
pub use plan::{Phase, RunPlan, RunStep};
pub use process::{ProcessSandbox, SandboxConfig};
pub use traits::{Sandbox, ScriptedSandbox};
