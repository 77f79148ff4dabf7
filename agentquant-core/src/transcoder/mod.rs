//! Stream transcoder: upstream chat bytes in, `StreamEvent`s out.
//!
//! Contract:
//! - Output order follows input line order; each event comes from exactly one complete line.
//! - Chunk boundaries never change the output (lines and code points are reassembled).
//! - A partial trailing line is only surfaced on a clean upstream end, and only
//!   when `StreamCfg::flush_trailing_line` is set.
//! - Dropping the returned stream stops the task and, with it, the upstream read.

pub mod classify;
pub mod line;

use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{Instrument, field::Empty};

use crate::config::StreamCfg;
use crate::error::CoreResult;
use crate::stream::{BoxEventStream, StreamEvent};
use crate::telemetry::{self, EndReason, TranscodeTrace, keys as k};
use classify::{LineOutcome, process_line};
use line::LineBuffer;

/// Per-request counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TranscodeStats {
    pub lines: u64,
    pub skipped: u64,
    pub dropped: u64,
    pub ignored: u64,
    pub text_events: u64,
    pub data_events: u64,
    pub tail_flushed: bool,
}

/// Synchronous core of one transcoding operation.
#[derive(Debug, Default)]
pub struct TranscodeState {
    buffer: LineBuffer,
    stats: TranscodeStats,
}

impl TranscodeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one upstream chunk; returns the events of every line it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let lines = self.buffer.push(chunk);
        lines.iter().filter_map(|l| self.classify(l)).collect()
    }

    /// Clean end of input: classify the unterminated remainder, if any.
    pub fn finish(&mut self) -> Option<StreamEvent> {
        let tail = self.buffer.finish()?;
        self.stats.tail_flushed = true;
        self.classify(&tail)
    }

    /// Abnormal end of input: forget the remainder.
    pub fn discard(&mut self) {
        let bytes = self.buffer.discard();
        if bytes > 0 {
            tracing::debug!(bytes, "discarding partial trailing line");
        }
    }

    pub fn stats(&self) -> TranscodeStats {
        self.stats
    }

    fn classify(&mut self, line: &str) -> Option<StreamEvent> {
        self.stats.lines += 1;
        match process_line(line) {
            LineOutcome::Emit(event) => {
                match event {
                    StreamEvent::Text { .. } => self.stats.text_events += 1,
                    StreamEvent::DataJson { .. } => self.stats.data_events += 1,
                }
                Some(event)
            }
            LineOutcome::Skipped => {
                self.stats.skipped += 1;
                None
            }
            LineOutcome::Dropped => {
                self.stats.dropped += 1;
                None
            }
            LineOutcome::Ignored => {
                self.stats.ignored += 1;
                None
            }
        }
    }
}

/// Drives `TranscodeState` over an async byte stream on its own task.
#[derive(Debug, Clone, Default)]
pub struct Transcoder {
    cfg: StreamCfg,
}

impl Transcoder {
    pub fn new(cfg: StreamCfg) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &StreamCfg {
        &self.cfg
    }

    /// Spawn the transcoding task and hand back its event stream.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn events<S>(&self, input: S, request_id: &str) -> BoxEventStream
    where
        S: Stream<Item = CoreResult<Bytes>> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(self.cfg.channel_capacity.max(1));
        let span = tracing::info_span!(
            "transcode",
            req.id = %request_id,
            lines.total = Empty,
            lines.skipped = Empty,
            lines.dropped = Empty,
            lines.ignored = Empty,
            events.text = Empty,
            events.data = Empty,
            tail.flushed = Empty,
            end.reason = Empty,
            latency.ms = Empty,
            error.kind = Empty,
        );
        let job = Job {
            cfg: self.cfg.clone(),
            request_id: request_id.to_string(),
        };
        tokio::spawn(job.run(input, tx).instrument(span));
        ReceiverStream::new(rx).boxed()
    }
}

struct Job {
    cfg: StreamCfg,
    request_id: String,
}

enum Ended {
    Complete,
    ClientGone,
    Upstream(&'static str),
}

impl Job {
    async fn run<S>(self, input: S, tx: mpsc::Sender<StreamEvent>)
    where
        S: Stream<Item = CoreResult<Bytes>> + Send + 'static,
    {
        let started = Instant::now();
        let mut state = TranscodeState::new();
        let limit = Duration::from_secs(self.cfg.max_duration_secs);

        let ended = tokio::time::timeout(limit, self.pump(input, &tx, &mut state)).await;
        let (reason, error_kind) = match ended {
            Ok(Ended::Complete) => (EndReason::Complete, None),
            Ok(Ended::ClientGone) => {
                tracing::debug!("client went away, stopping upstream read");
                (EndReason::ClientGone, None)
            }
            Ok(Ended::Upstream(kind)) => (EndReason::UpstreamError, Some(kind)),
            Err(_) => {
                tracing::warn!(
                    max_duration_secs = self.cfg.max_duration_secs,
                    "transcode exceeded max duration"
                );
                (EndReason::TimedOut, None)
            }
        };

        let stats = state.stats();
        let latency_ms = started.elapsed().as_millis() as u64;
        let span = tracing::Span::current();
        span.record(k::KEY_LINES_TOTAL, stats.lines);
        span.record(k::KEY_LINES_SKIPPED, stats.skipped);
        span.record(k::KEY_LINES_DROPPED, stats.dropped);
        span.record(k::KEY_LINES_IGNORED, stats.ignored);
        span.record(k::KEY_EVENTS_TEXT, stats.text_events);
        span.record(k::KEY_EVENTS_DATA, stats.data_events);
        span.record(k::KEY_TAIL_FLUSHED, stats.tail_flushed);
        span.record(k::KEY_END_REASON, reason.as_str());
        span.record(k::KEY_LATENCY_MS, latency_ms);
        if let Some(kind) = error_kind {
            span.record(k::KEY_ERROR_KIND, kind);
        }
        tracing::debug!(
            lines = stats.lines,
            events = stats.text_events + stats.data_events,
            "transcode finished"
        );

        telemetry::emit(
            TranscodeTrace {
                lines_total: stats.lines,
                lines_skipped: stats.skipped,
                lines_dropped: stats.dropped,
                lines_ignored: stats.ignored,
                events_text: stats.text_events,
                events_data: stats.data_events,
                tail_flushed: stats.tail_flushed,
                ..TranscodeTrace::new()
            }
            .request_id(&self.request_id)
            .upstream("agent")
            .latency_ms(latency_ms)
            .end_reason(reason)
            .error_kind_opt(error_kind),
        );
    }

    async fn pump<S>(
        &self,
        input: S,
        tx: &mpsc::Sender<StreamEvent>,
        state: &mut TranscodeState,
    ) -> Ended
    where
        S: Stream<Item = CoreResult<Bytes>> + Send + 'static,
    {
        let mut input = Box::pin(input);
        loop {
            // a silent upstream must not outlive the client
            let item = tokio::select! {
                _ = tx.closed() => return Ended::ClientGone,
                item = input.next() => item,
            };
            let Some(item) = item else {
                break;
            };
            match item {
                Ok(chunk) => {
                    for event in state.feed(&chunk) {
                        if tx.send(event).await.is_err() {
                            return Ended::ClientGone;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "upstream stream failed mid-body");
                    state.discard();
                    return Ended::Upstream(e.kind());
                }
            }
        }

        if self.cfg.flush_trailing_line {
            if let Some(event) = state.finish()
                && tx.send(event).await.is_err()
            {
                return Ended::ClientGone;
            }
        } else {
            state.discard();
        }
        Ended::Complete
    }
}

#[cfg(test)]
mod tests;
