/// Span/log attribute keys for one transcoding operation.
/// Keep these stable; dashboards filter on them.
pub const KEY_REQUEST_ID: &str = "req.id";
pub const KEY_UPSTREAM: &str = "upstream";

pub const KEY_LINES_TOTAL: &str = "lines.total";
pub const KEY_LINES_SKIPPED: &str = "lines.skipped";
pub const KEY_LINES_DROPPED: &str = "lines.dropped";
pub const KEY_LINES_IGNORED: &str = "lines.ignored";
pub const KEY_EVENTS_TEXT: &str = "events.text";
pub const KEY_EVENTS_DATA: &str = "events.data";
pub const KEY_TAIL_FLUSHED: &str = "tail.flushed";

pub const KEY_END_REASON: &str = "end.reason";
pub const KEY_LATENCY_MS: &str = "latency.ms";

/// Error-related (if applicable)
pub const KEY_ERROR_KIND: &str = "error.kind";
