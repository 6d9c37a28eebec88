//! Repair Loop Controller - bounded generate/execute/repair rounds.
//!
//! This module provides:
//! - RepairLoop, the round state machine
//! - CancelSignal/CancelFlag for stopping a loop between rounds
//! - LoopEvent progress notifications

mod event;
mod repair_loop;
mod signal;

pub use event::LoopEvent;
pub use repair_loop::{RepairLoop, RepairLoopConfig};
pub use signal::{CancelFlag, CancelSignal, NeverCancel};
