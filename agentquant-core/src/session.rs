//! Per-turn bookkeeping over the event stream.
//!
//! The browser derives chart and result lookups from the `data-json` events
//! it has seen; `ToolLedger` does the same for non-browser consumers.

use std::collections::HashMap;

use crate::record::{FunctionRecord, ParsedValue, ResolvedPayload};
use crate::stream::StreamEvent;

pub const TOOL_QUERY_SAVE: &str = "yh_query_save";
pub const TOOL_CODE_EXECUTOR: &str = "code_executor";
pub const TOOL_QUICK_PREVIEW: &str = "quick_preview";

#[derive(Debug, Default, Clone)]
pub struct ToolLedger {
    transcript: String,
    first: HashMap<String, ResolvedPayload>,
    latest: HashMap<String, ResolvedPayload>,
    order: Vec<String>,
}

impl ToolLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::Text { text } => self.transcript.push_str(text),
            StreamEvent::DataJson { data } => self.observe_record(data),
        }
    }

    fn observe_record(&mut self, record: &FunctionRecord) {
        let Some(tool) = record.tool_name() else {
            return;
        };
        let payload = record.resolved_or_wire().unwrap_or_default();
        tracing::debug!(tool, "tool completed");
        // chart lookups read the first completion, the backtest id the latest
        if !self.first.contains_key(tool) {
            self.first.insert(tool.to_string(), payload.clone());
            self.order.push(tool.to_string());
        }
        self.latest.insert(tool.to_string(), payload);
    }

    /// Assistant text streamed so far.
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// Tool names in first-completion order.
    pub fn completed_tools(&self) -> &[String] {
        &self.order
    }

    pub fn has_completed(&self, tool: &str) -> bool {
        self.first.contains_key(tool)
    }

    /// Payload of the first completion of `tool`.
    pub fn payload(&self, tool: &str) -> Option<&ResolvedPayload> {
        self.first.get(tool)
    }

    /// Payload of the most recent completion of `tool`.
    pub fn latest_payload(&self, tool: &str) -> Option<&ResolvedPayload> {
        self.latest.get(tool)
    }

    /// Key of the saved price bars, once the query tool has run.
    pub fn storage_key(&self) -> Option<&str> {
        self.payload(TOOL_QUERY_SAVE)?.output.str_field("storage_key")
    }

    /// Backtest task id. Only reported once the backtest itself has completed.
    pub fn task_id(&self) -> Option<&str> {
        if !self.has_completed(TOOL_CODE_EXECUTOR) {
            return None;
        }
        let saved = self.latest_payload(TOOL_QUERY_SAVE)?;
        saved
            .input
            .str_field("task_id")
            .or_else(|| saved.output.str_field("task_id"))
    }

    /// Output of the quick-preview tool, structured or raw.
    pub fn preview(&self) -> Option<&ParsedValue> {
        self.payload(TOOL_QUICK_PREVIEW)
            .map(|p| &p.output)
            .filter(|v| !v.is_absent())
    }
}
