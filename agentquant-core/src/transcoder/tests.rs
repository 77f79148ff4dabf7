use super::*;
use crate::error::GatewayError;
use crate::telemetry::{TelemetrySink, test_set_capture_enabled, test_span};
use futures::stream;
use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex};

const HELLO: &str = concat!(r#"data:{"choices":[{"delta":{"content":"Hello"}}]}"#, "\n");
const SAVE: &str = concat!(
    r#"intermediate_data:{"id":"1","parent_id":"0","type":"t","name":"Function Complete: yh_query_save","payload":"**Function Output:**\n```json\n{\"storage_key\":\"abc123\"}\n```"}"#,
    "\n"
);

fn fixture() -> String {
    [
        HELLO,
        "\n",
        concat!(r#"data: {"choices":[{"delta":{"content":" price €42 📈"}}]}"#, "\r\n"),
        ": keep-alive\n",
        concat!(r#"intermediate_data:{"name":"Function Start: yh_query_save"}"#, "\n"),
        SAVE,
        "data: {not json\n",
        concat!(r#"data: {"choices":[{"message":{"content":"done."}}]}"#, "\n"),
        "data: [DONE]\n",
    ]
    .concat()
}

fn transcode_sync(chunks: &[&[u8]]) -> (Vec<StreamEvent>, TranscodeStats) {
    let mut state = TranscodeState::new();
    let mut out = Vec::new();
    for c in chunks {
        out.extend(state.feed(c));
    }
    out.extend(state.finish());
    (out, state.stats())
}

fn chunked(parts: Vec<&'static str>) -> impl Stream<Item = CoreResult<Bytes>> + Send + 'static {
    stream::iter(parts.into_iter().map(|p| Ok(Bytes::from_static(p.as_bytes()))))
}

#[test]
fn fixture_yields_expected_events_and_counters() {
    let text = fixture();
    let (events, stats) = transcode_sync(&[text.as_bytes()]);
    assert_eq!(events.len(), 4);
    assert_eq!(events[0], StreamEvent::text("Hello"));
    assert_eq!(events[1], StreamEvent::text(" price €42 📈"));
    assert_eq!(
        events[2].as_record().unwrap().tool_name(),
        Some("yh_query_save")
    );
    assert_eq!(events[3], StreamEvent::text("done."));

    assert_eq!(
        stats,
        TranscodeStats {
            lines: 9,
            skipped: 2,
            dropped: 1,
            ignored: 2,
            text_events: 3,
            data_events: 1,
            tail_flushed: false,
        }
    );
}

#[test]
fn chunk_boundaries_do_not_change_output() {
    let text = fixture();
    let bytes = text.as_bytes();
    let (whole, _) = transcode_sync(&[bytes]);

    for cut in 0..=bytes.len() {
        let (split, _) = transcode_sync(&[&bytes[..cut], &bytes[cut..]]);
        assert_eq!(split, whole, "split at byte {cut}");
    }

    let singles: Vec<&[u8]> = bytes.chunks(1).collect();
    assert_eq!(transcode_sync(&singles).0, whole);

    let sevens: Vec<&[u8]> = bytes.chunks(7).collect();
    assert_eq!(transcode_sync(&sevens).0, whole);
}

#[test]
fn blank_and_done_lines_emit_nothing() {
    let (events, stats) = transcode_sync(&[b"\n\n   \r\ndata: [DONE]\n[DONE]\n"]);
    assert!(events.is_empty());
    assert_eq!(stats.skipped, 5);
    assert_eq!(stats.lines, 5);
}

#[test]
fn partial_line_is_not_surfaced_before_newline() {
    let mut state = TranscodeState::new();
    let (head, tail) = HELLO.split_at(20);
    assert!(state.feed(head.as_bytes()).is_empty());
    assert_eq!(state.feed(tail.as_bytes()), vec![StreamEvent::text("Hello")]);
}

#[tokio::test]
async fn end_to_end_text_then_record() {
    let events: Vec<_> = Transcoder::default()
        .events(chunked(vec![HELLO, SAVE]), "req-e2e")
        .collect()
        .await;

    assert_eq!(events.len(), 2);
    assert_eq!(events[0], StreamEvent::text("Hello"));
    let record = events[1].as_record().expect("data-json event");
    assert_eq!(
        record.resolved().unwrap().output.str_field("storage_key"),
        Some("abc123")
    );

    let wire = serde_json::to_value(&events[1]).unwrap();
    assert_eq!(wire["type"], "data-json");
    assert_eq!(wire["data"]["payload"]["output"]["storage_key"], "abc123");
    assert_eq!(wire["data"]["payload"]["input"], serde_json::Value::Null);
}

#[tokio::test]
async fn trailing_line_flushed_on_clean_end() {
    let unterminated = HELLO.trim_end();
    let events: Vec<_> = Transcoder::default()
        .events(chunked(vec![unterminated]), "req-tail")
        .collect()
        .await;
    assert_eq!(events, vec![StreamEvent::text("Hello")]);
}

#[tokio::test]
async fn trailing_line_dropped_when_flush_disabled() {
    let cfg = StreamCfg {
        flush_trailing_line: false,
        ..StreamCfg::default()
    };
    let unterminated = HELLO.trim_end();
    let events: Vec<_> = Transcoder::new(cfg)
        .events(chunked(vec![HELLO, unterminated]), "req-noflush")
        .collect()
        .await;
    assert_eq!(events, vec![StreamEvent::text("Hello")]);
}

#[tokio::test]
async fn upstream_error_ends_stream_and_drops_partial_line() {
    let partial = r#"data:{"choices":[{"delta":{"content":"lost"}}]}"#;
    let input = stream::iter(vec![
        Ok(Bytes::from(format!("{HELLO}{partial}"))),
        Err(GatewayError::Unavailable {
            service: "agent".into(),
        }),
        Ok(Bytes::from_static(HELLO.as_bytes())),
    ]);
    let events: Vec<_> = Transcoder::default()
        .events(input, "req-err")
        .collect()
        .await;
    assert_eq!(events, vec![StreamEvent::text("Hello")]);
}

#[tokio::test]
async fn dropping_the_receiver_releases_upstream() {
    let (in_tx, in_rx) = mpsc::channel::<CoreResult<Bytes>>(1);
    let mut events = Transcoder::default().events(ReceiverStream::new(in_rx), "req-gone");

    in_tx
        .send(Ok(Bytes::from_static(HELLO.as_bytes())))
        .await
        .unwrap();
    assert_eq!(events.next().await, Some(StreamEvent::text("Hello")));
    drop(events);

    // the task notices on its next send and lets go of the input
    in_tx
        .send(Ok(Bytes::from_static(HELLO.as_bytes())))
        .await
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), in_tx.closed())
        .await
        .expect("transcoder should drop the upstream stream");
}

#[tokio::test]
async fn dropping_the_receiver_releases_idle_upstream() {
    let (in_tx, in_rx) = mpsc::channel::<CoreResult<Bytes>>(1);
    let mut events = Transcoder::default().events(ReceiverStream::new(in_rx), "req-idle");

    in_tx
        .send(Ok(Bytes::from_static(HELLO.as_bytes())))
        .await
        .unwrap();
    assert_eq!(events.next().await, Some(StreamEvent::text("Hello")));

    // upstream goes quiet (long tool run) and the client leaves
    drop(events);
    tokio::time::timeout(Duration::from_secs(2), in_tx.closed())
        .await
        .expect("idle upstream should be released once the client is gone");
}

#[tokio::test(start_paused = true)]
async fn stops_after_max_duration() {
    let cfg = StreamCfg {
        max_duration_secs: 2,
        ..StreamCfg::default()
    };
    let input = chunked(vec![HELLO]).chain(stream::pending());
    let events: Vec<_> = Transcoder::new(cfg)
        .events(input, "req-slow")
        .collect()
        .await;
    assert_eq!(events, vec![StreamEvent::text("Hello")]);
}

#[tokio::test]
async fn span_records_counters() {
    let store = test_span::install_capture();
    let input = chunked(vec![HELLO, "\n", "data: [DONE]\n", "data: {bad\n"]);
    let events: Vec<_> = Transcoder::default()
        .events(input, "req-span")
        .collect()
        .await;
    assert_eq!(events.len(), 1);

    let span = store.by_name("transcode").expect("transcode span captured");
    assert_eq!(span.field(k::KEY_REQUEST_ID).as_deref(), Some("req-span"));
    assert_eq!(span.field(k::KEY_LINES_TOTAL).as_deref(), Some("4"));
    assert_eq!(span.field(k::KEY_LINES_SKIPPED).as_deref(), Some("2"));
    assert_eq!(span.field(k::KEY_LINES_DROPPED).as_deref(), Some("1"));
    assert_eq!(span.field(k::KEY_EVENTS_TEXT).as_deref(), Some("1"));
    assert_eq!(span.field(k::KEY_TAIL_FLUSHED).as_deref(), Some("false"));
    assert_eq!(span.field(k::KEY_END_REASON).as_deref(), Some("complete"));
    assert!(span.field(k::KEY_ERROR_KIND).is_none());
}

#[derive(Default)]
struct CollectSink {
    traces: Mutex<Vec<TranscodeTrace>>,
}

impl TelemetrySink for CollectSink {
    fn record(&self, trace: TranscodeTrace) {
        self.traces.lock().unwrap().push(trace);
    }
}

static SINK: Lazy<Arc<CollectSink>> = Lazy::new(|| Arc::new(CollectSink::default()));

#[tokio::test]
async fn trace_delivered_to_sink() {
    let _ = telemetry::set_telemetry_sink(SINK.clone());
    test_set_capture_enabled(true);

    let _: Vec<_> = Transcoder::default()
        .events(chunked(vec![HELLO, SAVE]), "req-telemetry")
        .collect()
        .await;
    test_set_capture_enabled(false);

    let traces = SINK.traces.lock().unwrap();
    let trace = traces
        .iter()
        .find(|t| t.request_id.as_deref() == Some("req-telemetry"))
        .expect("trace for request");
    assert_eq!(trace.upstream.as_deref(), Some("agent"));
    assert_eq!(trace.lines_total, 2);
    assert_eq!(trace.events_text, 1);
    assert_eq!(trace.events_data, 1);
    assert_eq!(trace.end_reason, EndReason::Complete);
    assert!(trace.latency_ms.is_some());
}
