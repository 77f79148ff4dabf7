use serde::{Deserialize, Serialize};

/// How a transcoding operation came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Upstream closed its body normally.
    #[default]
    Complete,
    /// Upstream body failed mid-stream.
    UpstreamError,
    /// The browser side went away.
    ClientGone,
    /// `max_duration_secs` elapsed.
    TimedOut,
}

impl EndReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::UpstreamError => "upstream_error",
            Self::ClientGone => "client_gone",
            Self::TimedOut => "timed_out",
        }
    }
}

/// Summary of one transcoding operation, emitted once when it ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TranscodeTrace {
    /// Correlation id of the originating chat request.
    pub request_id: Option<String>,

    /// Upstream identifier, e.g. "agent".
    pub upstream: Option<String>,

    /// Complete lines classified, including a flushed tail.
    pub lines_total: u64,
    /// Blank lines and `[DONE]` sentinels.
    pub lines_skipped: u64,
    /// Lines whose JSON did not parse.
    pub lines_dropped: u64,
    /// Well-formed lines with nothing to show.
    pub lines_ignored: u64,

    pub events_text: u64,
    pub events_data: u64,

    pub tail_flushed: bool,
    pub end_reason: EndReason,

    pub latency_ms: Option<u64>,

    /// Short error label when the upstream failed, see `GatewayError::kind`.
    pub error_kind: Option<String>,
}

impl TranscodeTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_id(mut self, rid: &str) -> Self {
        self.request_id = Some(rid.to_string());
        self
    }

    pub fn upstream(mut self, name: &str) -> Self {
        self.upstream = Some(name.to_string());
        self
    }

    pub fn latency_ms(mut self, ms: u64) -> Self {
        self.latency_ms = Some(ms);
        self
    }

    pub fn end_reason(mut self, reason: EndReason) -> Self {
        self.end_reason = reason;
        self
    }

    pub fn error_kind_opt(mut self, kind: Option<&str>) -> Self {
        self.error_kind = kind.map(|s| s.to_string());
        self
    }

    pub fn events(&self) -> u64 {
        self.events_text + self.events_data
    }
}
