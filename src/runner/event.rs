//! Progress events emitted while a repair loop runs

use serde::Serialize;

use crate::domain::TargetLanguage;

/// Live progress of one loop, for display only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LoopEvent {
    RoundStarted {
        round: u32,
        max_rounds: u32,
        language: TargetLanguage,
    },
    RoundFailed {
        round: u32,
        error_message: String,
    },
    Converged {
        rounds_used: u32,
    },
    Exhausted {
        rounds_used: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = LoopEvent::RoundFailed {
            round: 2,
            error_message: "RuntimeError: boom".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "round_failed");
        assert_eq!(json["round"], 2);
    }
}
