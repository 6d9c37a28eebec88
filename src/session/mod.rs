//! Result Store - the session's memory of the last working program
//!
//! This module provides:
//! - ResultStore trait: `put_last_success` / `get_last_success`
//! - MemoryResultStore for a single process
//! - JsonlResultStore persisting to `successes.jsonl`

mod jsonl;
mod store;

pub use jsonl::JsonlResultStore;
pub use store::{LastSuccess, MemoryResultStore, ResultStore};
