//! Events emitted to the browser and their wire framing.
//!
//! Contract:
//! - One `StreamEvent` per completed upstream line that carried something worth showing.
//! - A response uses exactly one `Framing` for all its events.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::record::FunctionRecord;

/// What the browser receives incrementally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    /// Assistant token delta.
    #[serde(rename = "text")]
    Text { text: String },
    /// A completed tool call with its payload already sub-parsed.
    #[serde(rename = "data-json")]
    DataJson { data: FunctionRecord },
}

impl StreamEvent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Convenience accessor for `Text` contents.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&FunctionRecord> {
        match self {
            Self::DataJson { data } => Some(data),
            _ => None,
        }
    }
}

/// How events are laid out on the response body.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Framing {
    /// `data: {"type":...}\n\n`
    #[default]
    Sse,
    /// `0:"text"\n` and `2:{record}\n`
    Legacy,
}

impl Framing {
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Sse => "text/event-stream",
            Self::Legacy => "text/plain; charset=utf-8",
        }
    }

    /// Render one event as a self-contained frame.
    pub fn encode(self, event: &StreamEvent) -> serde_json::Result<Bytes> {
        let frame = match self {
            Self::Sse => format!("data: {}\n\n", serde_json::to_string(event)?),
            Self::Legacy => match event {
                StreamEvent::Text { text } => format!("0:{}\n", serde_json::to_string(text)?),
                StreamEvent::DataJson { data } => format!("2:{}\n", serde_json::to_string(data)?),
            },
        };
        Ok(Bytes::from(frame))
    }
}

/// Boxed stream of events. The transcoder returns this.
pub type BoxEventStream = futures::stream::BoxStream<'static, StreamEvent>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::PayloadValue;

    fn record() -> FunctionRecord {
        FunctionRecord {
            id: "1".into(),
            parent_id: "0".into(),
            kind: "t".into(),
            name: "Function Complete: quick_preview".into(),
            payload: PayloadValue::Pending("raw".into()),
        }
    }

    #[test]
    fn helpers_work() {
        let t = StreamEvent::text("hi");
        assert_eq!(t.as_text(), Some("hi"));
        assert!(t.as_record().is_none());

        let d = StreamEvent::DataJson { data: record() };
        assert_eq!(d.as_text(), None);
        assert_eq!(d.as_record().unwrap().id, "1");
    }

    #[test]
    fn sse_frames_carry_type_tag() {
        let frame = Framing::Sse.encode(&StreamEvent::text("Hel\"lo")).unwrap();
        assert_eq!(&frame[..], b"data: {\"type\":\"text\",\"text\":\"Hel\\\"lo\"}\n\n");

        let frame = Framing::Sse
            .encode(&StreamEvent::DataJson { data: record() })
            .unwrap();
        let s = std::str::from_utf8(&frame).unwrap();
        assert!(s.starts_with("data: {\"type\":\"data-json\",\"data\":{"));
        assert!(s.ends_with("}\n\n"));
        let v: serde_json::Value =
            serde_json::from_str(s.trim_start_matches("data: ").trim_end()).unwrap();
        assert_eq!(v["data"]["type"], "t");
        assert_eq!(v["data"]["payload"], "raw");
    }

    #[test]
    fn legacy_frames_use_numeric_prefixes() {
        let frame = Framing::Legacy.encode(&StreamEvent::text("Hello")).unwrap();
        assert_eq!(&frame[..], b"0:\"Hello\"\n");

        let frame = Framing::Legacy
            .encode(&StreamEvent::DataJson { data: record() })
            .unwrap();
        let s = std::str::from_utf8(&frame).unwrap();
        assert!(s.starts_with("2:{\"id\":\"1\""));
        assert!(s.ends_with("}\n"));
    }

    #[test]
    fn content_types() {
        assert_eq!(Framing::Sse.content_type(), "text/event-stream");
        assert_eq!(Framing::Legacy.content_type(), "text/plain; charset=utf-8");
        assert_eq!(Framing::default(), Framing::Sse);
    }
}
