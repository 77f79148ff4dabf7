// Output-block extractors.
//
// Tried in order by `resolve_output` after the strict parse fails; the
// first one that yields a value wins.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::literal::parse_structured;

/// One recovery strategy for an output block that is not JSON as a whole.
pub trait OutputExtractor: Send + Sync {
    fn name(&self) -> &'static str;
    fn extract(&self, block: &str) -> Option<Value>;
}

static CONTENT_SINGLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)content='((?:[^'\\]|\\.)*)'").expect("valid regex"));
static CONTENT_DOUBLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)content="((?:[^"\\]|\\.)*)""#).expect("valid regex"));
static CONTENT_OBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)content='(\{.*\})'").expect("valid regex"));
static BARE_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"));

fn unescape_quotes(s: &str) -> String {
    s.replace("\\'", "'").replace("\\\"", "\"")
}

/// `content='...'` with backslash-escaped quotes inside.
pub struct SingleQuotedContent;

impl OutputExtractor for SingleQuotedContent {
    fn name(&self) -> &'static str {
        "content_single_quoted"
    }

    fn extract(&self, block: &str) -> Option<Value> {
        let inner = CONTENT_SINGLE.captures(block)?.get(1)?.as_str();
        parse_structured(&unescape_quotes(inner))
    }
}

/// `content="..."`, the repr Python picks when the text holds a `'`.
pub struct DoubleQuotedContent;

impl OutputExtractor for DoubleQuotedContent {
    fn name(&self) -> &'static str {
        "content_double_quoted"
    }

    fn extract(&self, block: &str) -> Option<Value> {
        let inner = CONTENT_DOUBLE.captures(block)?.get(1)?.as_str();
        parse_structured(&unescape_quotes(inner))
    }
}

/// `content='{...}'` where the object itself contains unescaped quotes.
pub struct EmbeddedContentObject;

impl OutputExtractor for EmbeddedContentObject {
    fn name(&self) -> &'static str {
        "content_embedded_object"
    }

    fn extract(&self, block: &str) -> Option<Value> {
        let inner = CONTENT_OBJECT.captures(block)?.get(1)?.as_str();
        parse_structured(inner)
    }
}

/// Widest `{...}` span anywhere in the block.
pub struct BareObject;

impl OutputExtractor for BareObject {
    fn name(&self) -> &'static str {
        "bare_object"
    }

    fn extract(&self, block: &str) -> Option<Value> {
        let span = BARE_OBJECT.find(block)?.as_str();
        parse_structured(span)
    }
}

/// The fixed fallback order for output blocks.
pub static OUTPUT_EXTRACTORS: &[&dyn OutputExtractor] = &[
    &SingleQuotedContent,
    &DoubleQuotedContent,
    &EmbeddedContentObject,
    &BareObject,
];

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_quoted_content_is_unescaped_and_parsed() {
        let block = r#"ToolMessage(content='{"k": "v", "s": "it\'s"}', name='x')"#;
        assert_eq!(
            SingleQuotedContent.extract(block),
            Some(json!({"k": "v", "s": "it's"}))
        );
    }

    #[test]
    fn single_quoted_content_without_structure_yields_none() {
        assert_eq!(SingleQuotedContent.extract("content='plain words'"), None);
        assert_eq!(SingleQuotedContent.extract("no content here"), None);
    }

    #[test]
    fn double_quoted_content_handles_python_dict_repr() {
        let block = r#"content="{'storage_key': 'abc', 'note': \"don't\"}" id='1'"#;
        assert_eq!(
            DoubleQuotedContent.extract(block),
            Some(json!({"storage_key": "abc", "note": "don't"}))
        );
    }

    #[test]
    fn embedded_object_survives_inner_single_quotes() {
        let block = "content='{'task_id': 'T1', 'ok': True}' name='yh'";
        // the lazy single-quote matcher stops at the first inner quote
        assert_eq!(SingleQuotedContent.extract(block), None);
        assert_eq!(
            EmbeddedContentObject.extract(block),
            Some(json!({"task_id": "T1", "ok": true}))
        );
    }

    #[test]
    fn bare_object_found_inside_prose() {
        let block = "Result follows: {\"rows\": 3, \"ok\": true} (done)";
        assert_eq!(BareObject.extract(block), Some(json!({"rows": 3, "ok": true})));
        assert_eq!(BareObject.extract("nothing structured"), None);
    }

    #[test]
    fn extractor_order_is_fixed() {
        let names: Vec<_> = OUTPUT_EXTRACTORS.iter().map(|e| e.name()).collect();
        assert_eq!(
            names,
            [
                "content_single_quoted",
                "content_double_quoted",
                "content_embedded_object",
                "bare_object"
            ]
        );
    }
}
