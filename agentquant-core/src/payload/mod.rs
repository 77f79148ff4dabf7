//! Payload sub-parser for function-completion records.
//!
//! A payload is free text that may embed two fenced blocks:
//!
//! ~~~text
//! **Function Input:**
//! ```json
//! {"task_id": "..."}
//! ```
//! **Function Output:**
//! ```python
//! ToolMessage(content='{"storage_key": "..."}')
//! ```
//! ~~~
//!
//! Each side resolves independently. The input side gets one strict attempt;
//! the output side falls through [`extract::OUTPUT_EXTRACTORS`] and finally
//! keeps the block text, so it is never null once a block exists.

pub mod extract;
pub mod literal;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::record::{ParsedValue, ResolvedPayload};
use extract::OUTPUT_EXTRACTORS;
use literal::parse_structured;

/// Which labeled block to locate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockLabel {
    Input,
    Output,
}

static INPUT_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\*\*Function Input:\*\*\s*```(?:json|python)\s*(.*?)\s*```")
        .expect("valid regex")
});
static OUTPUT_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\*\*Function Output:\*\*\s*```(?:json|python)\s*(.*?)\s*```")
        .expect("valid regex")
});

/// Body of the first block under `label`, without fences.
pub fn find_block(text: &str, label: BlockLabel) -> Option<&str> {
    let re = match label {
        BlockLabel::Input => &*INPUT_BLOCK,
        BlockLabel::Output => &*OUTPUT_BLOCK,
    };
    re.captures(text)?.get(1).map(|m| m.as_str())
}

/// Split a payload string into its resolved input and output.
pub fn parse_payload(text: &str) -> ResolvedPayload {
    ResolvedPayload {
        input: resolve_input(text),
        output: resolve_output(text),
    }
}

fn resolve_input(text: &str) -> ParsedValue {
    let Some(block) = find_block(text, BlockLabel::Input) else {
        return ParsedValue::Absent;
    };
    match parse_structured(block) {
        Some(v) => ParsedValue::Structured(v),
        None => {
            tracing::warn!(block_len = block.len(), "function input block is not parseable");
            ParsedValue::Absent
        }
    }
}

fn resolve_output(text: &str) -> ParsedValue {
    let Some(block) = find_block(text, BlockLabel::Output) else {
        return ParsedValue::Absent;
    };
    if let Some(v) = parse_structured(block) {
        return ParsedValue::Structured(v);
    }
    for extractor in OUTPUT_EXTRACTORS {
        if let Some(v) = extractor.extract(block) {
            tracing::debug!(extractor = extractor.name(), "function output recovered");
            return ParsedValue::Structured(v);
        }
    }
    tracing::debug!(block_len = block.len(), "function output kept as raw text");
    ParsedValue::Raw(block.to_string())
}
