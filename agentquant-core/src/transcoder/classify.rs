// Per-line classification for the upstream chat stream.
//
// Precedence, first match wins:
//   1. blank or `[DONE]`           -> skip
//   2. `intermediate_data:` + `Function Complete:` in the line -> record
//   3. `data:`                      -> token delta
//   4. anything else                -> ignored

use serde::Deserialize;

use crate::record::{FUNCTION_COMPLETE_PREFIX, FunctionRecord};
use crate::stream::StreamEvent;

pub const DONE_SENTINEL: &str = "[DONE]";
pub const SIDE_CHANNEL_PREFIX: &str = "intermediate_data:";
pub const DATA_PREFIX: &str = "data:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind<'a> {
    Skip,
    /// Remainder after `intermediate_data:`.
    FunctionComplete(&'a str),
    /// Remainder after `data:`.
    Delta(&'a str),
    Ignored,
}

pub fn classify_line(line: &str) -> LineKind<'_> {
    if line.trim().is_empty() || line.contains(DONE_SENTINEL) {
        return LineKind::Skip;
    }
    if let Some(rest) = line.strip_prefix(SIDE_CHANNEL_PREFIX) {
        if line.contains(FUNCTION_COMPLETE_PREFIX) {
            return LineKind::FunctionComplete(rest);
        }
        return LineKind::Ignored;
    }
    if let Some(rest) = line.strip_prefix(DATA_PREFIX) {
        return LineKind::Delta(rest);
    }
    LineKind::Ignored
}

/// What a single line turned into.
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    Emit(StreamEvent),
    /// Blank line or end sentinel.
    Skipped,
    /// JSON that failed to parse.
    Dropped,
    /// Parsed fine, nothing to show.
    Ignored,
}

#[derive(Debug, Deserialize)]
struct ChunkEnvelope {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkContent>,
    #[serde(default)]
    message: Option<ChunkContent>,
}

#[derive(Debug, Deserialize)]
struct ChunkContent {
    #[serde(default)]
    content: Option<String>,
}

/// Text carried by an OpenAI-style chunk: `delta.content`, else
/// `message.content`. Empty strings count as absent.
fn chunk_text(envelope: ChunkEnvelope) -> Option<String> {
    let first = envelope.choices.into_iter().next()?;
    let pick = |c: Option<ChunkContent>| c.and_then(|c| c.content).filter(|s| !s.is_empty());
    pick(first.delta).or_else(|| pick(first.message))
}

pub fn process_line(line: &str) -> LineOutcome {
    match classify_line(line) {
        LineKind::Skip => LineOutcome::Skipped,
        LineKind::Ignored => LineOutcome::Ignored,
        LineKind::FunctionComplete(rest) => match serde_json::from_str::<FunctionRecord>(rest) {
            Ok(mut record) => {
                record.resolve_payload();
                LineOutcome::Emit(StreamEvent::DataJson { data: record })
            }
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed function record");
                LineOutcome::Dropped
            }
        },
        LineKind::Delta(rest) => match serde_json::from_str::<ChunkEnvelope>(rest) {
            Ok(envelope) => match chunk_text(envelope) {
                Some(text) => LineOutcome::Emit(StreamEvent::Text { text }),
                None => LineOutcome::Ignored,
            },
            Err(e) => {
                tracing::trace!(error = %e, "dropping malformed delta line");
                LineOutcome::Dropped
            }
        },
    }
}
