// Line reassembly over an arbitrarily chunked byte stream.

use std::borrow::Cow;

/// Incremental UTF-8 decoder. A code point split across chunks is held back
/// until its remaining bytes arrive; invalid sequences become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let bytes: Cow<'_, [u8]> = if self.pending.is_empty() {
            Cow::Borrowed(chunk)
        } else {
            let mut joined = std::mem::take(&mut self.pending);
            joined.extend_from_slice(chunk);
            Cow::Owned(joined)
        };

        let mut out = String::with_capacity(bytes.len());
        let mut rest: &[u8] = &bytes;
        loop {
            match std::str::from_utf8(rest) {
                Ok(s) => {
                    out.push_str(s);
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&rest[..valid]));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &rest[valid + len..];
                        }
                        None => {
                            // incomplete sequence at the end of the chunk
                            self.pending = rest[valid..].to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush at end of input. Leftover bytes can never complete.
    pub fn finish(&mut self) -> String {
        if std::mem::take(&mut self.pending).is_empty() {
            String::new()
        } else {
            char::REPLACEMENT_CHARACTER.to_string()
        }
    }
}

/// Pending text of one transcoding operation.
///
/// Invariant: `pending` never contains `'\n'`; everything up to the last
/// newline has already been handed out as complete lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    decoder: Utf8Decoder,
    pending: String,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return the lines it completed, in order.
    /// Lines are returned without their `\n` (and without a trailing `\r`).
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let text = self.decoder.decode(chunk);
        self.pending.push_str(&text);

        let Some(last_newline) = self.pending.rfind('\n') else {
            return Vec::new();
        };
        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);
        complete[..last_newline]
            .split('\n')
            .map(|l| l.strip_suffix('\r').unwrap_or(l).to_string())
            .collect()
    }

    /// Take the unterminated remainder at end of input, if any.
    pub fn finish(&mut self) -> Option<String> {
        let tail = self.decoder.finish();
        self.pending.push_str(&tail);
        let line = std::mem::take(&mut self.pending);
        if line.is_empty() {
            None
        } else {
            Some(line.strip_suffix('\r').map(str::to_string).unwrap_or(line))
        }
    }

    /// Drop the remainder without surfacing it.
    pub fn discard(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        self.decoder = Utf8Decoder::default();
        dropped
    }

    pub fn pending(&self) -> &str {
        &self.pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multibyte_split_at_every_offset() {
        let text = "price €42 · 📈 ok";
        let bytes = text.as_bytes();
        for cut in 0..=bytes.len() {
            let mut d = Utf8Decoder::default();
            let mut out = d.decode(&bytes[..cut]);
            out.push_str(&d.decode(&bytes[cut..]));
            out.push_str(&d.finish());
            assert_eq!(out, text, "split at {cut}");
        }
    }

    #[test]
    fn invalid_bytes_become_replacement() {
        let mut d = Utf8Decoder::default();
        assert_eq!(d.decode(b"a\xffb"), "a\u{FFFD}b");
        // dangling lead byte at end of input
        assert_eq!(d.decode(b"c\xe2\x82"), "c");
        assert_eq!(d.finish(), "\u{FFFD}");
        assert_eq!(d.finish(), "");
    }

    #[test]
    fn lines_complete_only_on_newline() {
        let mut b = LineBuffer::new();
        assert!(b.push(b"data: par").is_empty());
        assert_eq!(b.pending(), "data: par");
        assert_eq!(b.push(b"tial\n\ndata: next\r\nda"), ["data: partial", "", "data: next"]);
        assert_eq!(b.pending(), "da");
        assert_eq!(b.finish(), Some("da".to_string()));
        assert_eq!(b.finish(), None);
    }

    #[test]
    fn discard_clears_tail() {
        let mut b = LineBuffer::new();
        b.push(b"line\nhalf");
        assert_eq!(b.discard(), 4);
        assert_eq!(b.finish(), None);
    }
}
