//! Failure categories and error-message formatting for sandbox executions.
//!
//! The repair loop forwards `error_message` to the model verbatim, so the
//! message leads with a category and keeps the tail of the interpreter's own
//! error output (where tracebacks put the exception type and text).

use std::fmt;

/// Longest error detail forwarded to the model, in chars.
pub const MAX_ERROR_CHARS: usize = 4000;

/// Category of an execution failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Nothing was extracted from the completion
    EmptySource,
    /// The sandbox could not be prepared or the program could not be started
    SpawnError,
    /// A compile step exited non-zero
    CompileError,
    /// The program exited non-zero or was killed by a signal
    RuntimeError,
    /// The wall-clock deadline expired
    Timeout,
}

impl FailureKind {
    /// Get the name used as the message prefix.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::EmptySource => "EmptySource",
            FailureKind::SpawnError => "SpawnError",
            FailureKind::CompileError => "CompileError",
            FailureKind::RuntimeError => "RuntimeError",
            FailureKind::Timeout => "Timeout",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detailed information about one failed execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureDetail {
    pub kind: FailureKind,
    /// One-line description ("`python3` exited with status 1")
    pub summary: String,
    /// Captured diagnostic output, if any
    pub output: Option<String>,
}

impl FailureDetail {
    pub fn new(kind: FailureKind, summary: impl Into<String>) -> Self {
        Self {
            kind,
            summary: summary.into(),
            output: None,
        }
    }

    /// Attach diagnostic output; blank output is ignored.
    pub fn with_output(mut self, output: impl AsRef<str>) -> Self {
        let trimmed = output.as_ref().trim();
        if !trimmed.is_empty() {
            self.output = Some(tail_chars(trimmed, MAX_ERROR_CHARS));
        }
        self
    }

    /// Render as `<Kind>: <summary>` followed by the output on later lines.
    pub fn to_message(&self) -> String {
        match &self.output {
            Some(output) => format!("{}: {}\n{}", self.kind, self.summary, output),
            None => format!("{}: {}", self.kind, self.summary),
        }
    }
}

/// Keep the last `max` chars of `text`, marking the cut.
fn tail_chars(text: &str, max: usize) -> String {
    let total = text.chars().count();
    if total <= max {
        return text.to_string();
    }
    let skip = total - max;
    let start = text
        .char_indices()
        .nth(skip)
        .map(|(i, _)| i)
        .unwrap_or(0);
    format!("[... {} chars omitted]\n{}", skip, &text[start..])
}
