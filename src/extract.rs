//! Code extraction from raw completions.
//!
//! Models wrap code in markdown fences, put the language name on a line of its
//! own, and surround it with prose. This is a best-effort strip, not a parser:
//! it never fails and never reformats what it keeps.

use crate::domain::{CandidateCode, Completion, TargetLanguage};

/// Markdown code fence delimiter.
const FENCE: &str = "```";

/// Derive the candidate for one round from its completion.
pub fn extract(completion: &Completion, language: TargetLanguage) -> CandidateCode {
    CandidateCode::new(
        extract_source(&completion.raw_text, language),
        completion.round,
        language,
    )
}

/// Strip fences, a leading language label and surrounding prose from `raw_text`.
///
/// - Line-delimited fenced blocks: keep only their inner content, verbatim.
/// - Inline fences that never start a line: remove the delimiters.
/// - A first non-blank line that is just the language name (or an alias) is dropped.
///
/// Returns an empty string when nothing recognizable remains.
pub fn extract_source(raw_text: &str, language: TargetLanguage) -> String {
    let body = match fenced_blocks(raw_text) {
        Some(blocks) => join_blocks(&blocks),
        None if raw_text.contains(FENCE) => raw_text.replace(FENCE, ""),
        None => raw_text.to_string(),
    };
    strip_label_line(&body, language)
}

/// A line that opens or closes a block: starts with a fence and carries at most
/// an info string after it (a line like "```x = 1```" is inline code instead).
fn is_fence_line(line: &str) -> bool {
    line.trim_start()
        .strip_prefix(FENCE)
        .is_some_and(|rest| !rest.contains(FENCE))
}

/// Inner contents of every fenced block, or None when no line opens a fence.
///
/// An unterminated block runs to the end of the text.
fn fenced_blocks(text: &str) -> Option<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut saw_fence = false;
    let mut block_start: Option<usize> = None;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        if is_fence_line(line) {
            saw_fence = true;
            match block_start.take() {
                Some(start) => blocks.push(&text[start..offset]),
                None => block_start = Some(offset + line.len()),
            }
        }
        offset += line.len();
    }

    if let Some(start) = block_start {
        blocks.push(&text[start..]);
    }

    saw_fence.then_some(blocks)
}

fn join_blocks(blocks: &[&str]) -> String {
    let mut joined = String::new();
    for (i, block) in blocks.iter().enumerate() {
        joined.push_str(block);
        let is_last = i + 1 == blocks.len();
        if !is_last && !block.is_empty() && !block.ends_with('\n') {
            joined.push('\n');
        }
    }
    joined
}

/// Drop the first non-blank line if it only names the language.
fn strip_label_line(text: &str, language: TargetLanguage) -> String {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            offset += line.len();
            continue;
        }
        if language.matches_label(trimmed.trim_end_matches(':')) {
            let mut stripped = String::with_capacity(text.len() - line.len());
            stripped.push_str(&text[..offset]);
            stripped.push_str(&text[offset + line.len()..]);
            return stripped;
        }
        break;
    }
    text.to_string()
}
