use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Prefix of `FunctionRecord::name` for completed tool calls.
pub const FUNCTION_COMPLETE_PREFIX: &str = "Function Complete:";

/// A completed backend tool invocation relayed on the side channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub parent_id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub payload: PayloadValue,
}

impl FunctionRecord {
    /// Tool that produced the record, e.g. `yh_query_save` for
    /// `"Function Complete: yh_query_save"`.
    pub fn tool_name(&self) -> Option<&str> {
        self.name
            .strip_prefix(FUNCTION_COMPLETE_PREFIX)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Run the payload sub-parser once. Only a `Pending` payload changes;
    /// resolved and opaque payloads are left as they are.
    pub fn resolve_payload(&mut self) {
        if let PayloadValue::Pending(raw) = &self.payload {
            let resolved = crate::payload::parse_payload(raw);
            self.payload = PayloadValue::Resolved(resolved);
        }
    }

    pub fn resolved(&self) -> Option<&ResolvedPayload> {
        match &self.payload {
            PayloadValue::Resolved(r) => Some(r),
            _ => None,
        }
    }

    /// Resolved payload, also accepting one that was deserialized from an
    /// already-transcoded event.
    pub fn resolved_or_wire(&self) -> Option<ResolvedPayload> {
        match &self.payload {
            PayloadValue::Resolved(r) => Some(r.clone()),
            PayloadValue::Opaque(v) => ResolvedPayload::from_wire(v),
            PayloadValue::Pending(_) => None,
        }
    }
}

/// Payload of a `FunctionRecord` across its lifetime.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadValue {
    /// Raw text as sent upstream, not yet sub-parsed.
    Pending(String),
    /// Result of the single sub-parse attempt.
    Resolved(ResolvedPayload),
    /// Upstream sent something other than a string; relayed untouched.
    Opaque(Value),
}

impl Default for PayloadValue {
    fn default() -> Self {
        Self::Opaque(Value::Null)
    }
}

impl<'de> Deserialize<'de> for PayloadValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => Self::Pending(s),
            other => Self::Opaque(other),
        })
    }
}

impl Serialize for PayloadValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Pending(s) => serializer.serialize_str(s),
            Self::Resolved(r) => r.serialize(serializer),
            Self::Opaque(v) => v.serialize(serializer),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ResolvedPayload {
    pub input: ParsedValue,
    pub output: ParsedValue,
}

impl ResolvedPayload {
    /// Rebuild from the serialized `{input, output}` form a stream consumer
    /// reads back off the wire. A JSON string side comes back as `Raw`.
    pub fn from_wire(v: &Value) -> Option<Self> {
        let obj = v.as_object()?;
        if !obj.contains_key("input") && !obj.contains_key("output") {
            return None;
        }
        Some(Self {
            input: ParsedValue::from_wire(obj.get("input")),
            output: ParsedValue::from_wire(obj.get("output")),
        })
    }
}

/// One side of a resolved payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ParsedValue {
    Structured(Value),
    /// Block text that no extractor could turn into structured data.
    Raw(String),
    #[default]
    Absent,
}

impl ParsedValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn as_structured(&self) -> Option<&Value> {
        match self {
            Self::Structured(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_raw(&self) -> Option<&str> {
        match self {
            Self::Raw(s) => Some(s.as_str()),
            _ => None,
        }
    }

    fn from_wire(v: Option<&Value>) -> Self {
        match v {
            None | Some(Value::Null) => Self::Absent,
            Some(Value::String(s)) => Self::Raw(s.clone()),
            Some(other) => Self::Structured(other.clone()),
        }
    }

    /// String field lookup on a structured object.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.as_structured()?.get(key)?.as_str()
    }
}

impl Serialize for ParsedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Structured(v) => v.serialize(serializer),
            Self::Raw(s) => serializer.serialize_str(s),
            Self::Absent => serializer.serialize_unit(),
        }
    }
}
