//! Codemax - generate, execute and repair code with a local model
//!
//! A request goes through bounded rounds: the completion service writes a
//! candidate, the extractor pulls the code out of the reply, the sandbox runs
//! it, and any error is fed back into the next prompt until the program runs
//! or the round ceiling is reached.

pub mod domain;
pub mod error;
pub mod extract;
pub mod llm;
pub mod prompt;
pub mod runner;
pub mod sandbox;
pub mod session;
pub mod workbench;

pub use error::{CodemaxError, Result};
