//! Python-literal to JSON token normalization.
//!
//! Tool payloads arrive as `repr()` output as often as JSON. This rewrites the
//! handful of tokens that differ so that `serde_json` can take over:
//! bare `None`/`True`/`False` and single-quoted strings. Double-quoted strings
//! are copied verbatim, so valid JSON passes through unchanged.

use serde_json::Value;

/// Rewrite Python literal tokens into their JSON spelling.
pub fn normalize_python_literals(src: &str) -> String {
    let mut out = String::with_capacity(src.len() + 8);
    let mut chars = src.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                out.push('"');
                while let Some(c) = chars.next() {
                    out.push(c);
                    match c {
                        '\\' => {
                            if let Some(esc) = chars.next() {
                                out.push(esc);
                            }
                        }
                        '"' => break,
                        _ => {}
                    }
                }
            }
            '\'' => {
                out.push('"');
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => match chars.next() {
                            Some('\'') => out.push('\''),
                            Some(esc) => {
                                out.push('\\');
                                out.push(esc);
                            }
                            None => out.push('\\'),
                        },
                        '"' => out.push_str("\\\""),
                        '\'' => break,
                        other => out.push(other),
                    }
                }
                out.push('"');
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut word = String::from(c);
                while let Some(&n) = chars.peek() {
                    if n.is_alphanumeric() || n == '_' {
                        word.push(n);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push_str(match word.as_str() {
                    "None" => "null",
                    "True" => "true",
                    "False" => "false",
                    other => other,
                });
            }
            other => out.push(other),
        }
    }
    out
}

/// Normalize then parse strictly. `None` when the text is not valid JSON
/// even after normalization.
pub fn parse_structured(src: &str) -> Option<Value> {
    serde_json::from_str(&normalize_python_literals(src)).ok()
}
