//! Line-buffering decoder for event streams.
//!
//! Network reads split the stream at arbitrary byte offsets, including in the
//! middle of a line or a multi-byte UTF-8 sequence. `LineDecoder` keeps the
//! unterminated tail in `pending` and only yields complete lines, so the same
//! bytes always produce the same lines no matter how they were chunked.

/// Splits a byte stream into lines. `\n` and `\r\n` both terminate a line.
#[derive(Debug, Default)]
pub struct LineDecoder {
    pending: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a read and returns every line it completed, in order.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        let mut start = 0;
        // '\n' never occurs inside a multi-byte UTF-8 sequence, so cutting on
        // it always yields whole characters.
        while let Some(offset) = self.pending[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            lines.push(decode_line(&self.pending[start..end]));
            start = end + 1;
        }
        self.pending.drain(..start);
        lines
    }

    /// Flushes an unterminated final line at end of stream.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = decode_line(&self.pending);
        self.pending.clear();
        Some(line)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Extracts the payload of an event line.
///
/// Accepts SSE `data:` fields and bare JSON lines (newline-delimited mode).
/// Blank separators, `:` comments and other SSE fields yield `None`.
pub fn event_payload(line: &str) -> Option<&str> {
    if let Some(rest) = line.strip_prefix("data:") {
        let rest = rest.strip_prefix(' ').unwrap_or(rest);
        return Some(rest);
    }
    let trimmed = line.trim_start();
    if trimmed.starts_with('{') {
        return Some(trimmed);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_lines_in_one_read() {
        let mut decoder = LineDecoder::new();
        let lines = decoder.feed(b"data: a\n\ndata: b\n");
        assert_eq!(lines, vec!["data: a", "", "data: b"]);
        assert!(!decoder.has_pending());
    }

    #[test]
    fn test_partial_line_is_buffered() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.feed(b"data: {\"con").is_empty());
        assert!(decoder.has_pending());
        let lines = decoder.feed(b"tent\":\"x\"}\n");
        assert_eq!(lines, vec!["data: {\"content\":\"x\"}"]);
    }

    #[test]
    fn test_crlf_terminators() {
        let mut decoder = LineDecoder::new();
        let lines = decoder.feed(b"data: a\r\n\r\n");
        assert_eq!(lines, vec!["data: a", ""]);
    }

    #[test]
    fn test_split_inside_multibyte_character() {
        let text = "data: caf\u{e9} \u{1f980}\n";
        let bytes = text.as_bytes();
        let mut decoder = LineDecoder::new();
        let mut lines = Vec::new();
        for byte in bytes {
            lines.extend(decoder.feed(std::slice::from_ref(byte)));
        }
        assert_eq!(lines, vec!["data: caf\u{e9} \u{1f980}"]);
    }

    #[test]
    fn test_split_at_every_offset_matches_single_read() {
        let input = "data: one\n\ndata: two \u{00fc}ber\n\ndata: [DONE]\n\n".as_bytes();
        let mut whole = LineDecoder::new();
        let expected = whole.feed(input);

        for cut in 0..=input.len() {
            let mut decoder = LineDecoder::new();
            let mut lines = decoder.feed(&input[..cut]);
            lines.extend(decoder.feed(&input[cut..]));
            assert_eq!(lines, expected, "cut at {cut}");
        }
    }

    #[test]
    fn test_finish_flushes_tail() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.feed(b"data: tail").is_empty());
        assert_eq!(decoder.finish().as_deref(), Some("data: tail"));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_event_payload() {
        assert_eq!(event_payload("data: {\"a\":1}"), Some("{\"a\":1}"));
        assert_eq!(event_payload("data:[DONE]"), Some("[DONE]"));
        assert_eq!(event_payload("{\"a\":1}"), Some("{\"a\":1}"));
        assert_eq!(event_payload(""), None);
        assert_eq!(event_payload(": keep-alive"), None);
        assert_eq!(event_payload("event: message"), None);
    }
}
