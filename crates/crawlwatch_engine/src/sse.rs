//! Incremental `text/event-stream` decoding.
//!
//! Chunks from the transport arrive at arbitrary boundaries, including in the
//! middle of a UTF-8 sequence, so bytes are buffered until a full line is
//! available. Only `data:` fields matter for the push channel; `event:`,
//! `id:`, `retry:` and comment lines are skipped.
//!
//! A line that grows past the length limit without a newline is discarded
//! together with the event it belongs to.

use crawlwatch_logging::cw_warn;

/// Longest line kept while waiting for its newline.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

#[derive(Debug)]
pub struct SseDecoder {
    pending: Vec<u8>,
    data: Vec<String>,
    max_line: usize,
    discarding: bool,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            pending: Vec::new(),
            data: Vec::new(),
            max_line,
            discarding: false,
        }
    }

    /// Feeds one chunk and returns the payload of every event it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(newline) = self.pending.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=newline).collect();
            if std::mem::take(&mut self.discarding) {
                continue;
            }
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if let Some(event) = self.process_line(&String::from_utf8_lossy(&line)) {
                events.push(event);
            }
        }
        if self.pending.len() > self.max_line {
            if !self.discarding {
                cw_warn!(
                    "dropping push event with a line over {} bytes",
                    self.max_line
                );
                self.data.clear();
            }
            self.pending.clear();
            self.discarding = true;
        }
        events
    }

    /// Flushes a final event that was not terminated by a blank line.
    pub fn finish(&mut self) -> Option<String> {
        if std::mem::take(&mut self.discarding) {
            self.pending.clear();
        }
        if !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            let line = String::from_utf8_lossy(&line).into_owned();
            self.process_line(line.trim_end_matches('\r'));
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            self.data.push(value.to_string());
        }
        None
    }

    fn dispatch(&mut self) -> Option<String> {
        if self.data.is_empty() {
            return None;
        }
        let payload = self.data.join("\n");
        self.data.clear();
        Some(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_events_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: {\"type\":").is_empty());
        assert!(decoder.feed(b"\"ping\"}\n").is_empty());
        assert_eq!(decoder.feed(b"\n"), vec![r#"{"type":"ping"}"#.to_string()]);
    }

    #[test]
    fn handles_crlf_comments_and_other_fields() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b": keepalive\r\nevent: update\r\nid: 4\r\ndata:a\r\n\r\ndata: b\n\n");
        assert_eq!(events, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn joins_multi_line_data() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: one\ndata: two\n\n");
        assert_eq!(events, vec!["one\ntwo".to_string()]);
    }

    #[test]
    fn keeps_multibyte_characters_split_between_chunks() {
        let mut decoder = SseDecoder::new();
        let bytes = "data: caf\u{e9}\n\n".as_bytes();
        let split = bytes.len() - 3;
        assert!(decoder.feed(&bytes[..split]).is_empty());
        assert_eq!(decoder.feed(&bytes[split..]), vec!["caf\u{e9}".to_string()]);
    }

    #[test]
    fn blank_lines_without_data_dispatch_nothing() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"\n\n\n").is_empty());
    }

    #[test]
    fn overlong_line_is_dropped_and_decoding_recovers() {
        let mut decoder = SseDecoder::with_max_line(16);
        assert!(decoder.feed(b"data: first\ndata: 0123456789").is_empty());
        assert!(decoder.feed(b"abcdefghij").is_empty());
        assert!(decoder.pending.is_empty());
        assert!(decoder.feed(b"klmnop").is_empty());
        let events = decoder.feed(b"qrs\n\ndata: next\n\n");
        assert_eq!(events, vec!["next".to_string()]);
    }

    #[test]
    fn finish_after_overlong_line_yields_nothing() {
        let mut decoder = SseDecoder::with_max_line(8);
        assert!(decoder.feed(b"data: far too long").is_empty());
        assert_eq!(decoder.finish(), None);
        assert_eq!(decoder.feed(b"data: ok\n\n"), vec!["ok".to_string()]);
    }

    #[test]
    fn discarding_continues_past_repeated_overflow() {
        let mut decoder = SseDecoder::with_max_line(4);
        assert!(decoder.feed(b"data: 12345").is_empty());
        assert!(decoder.feed(b"678901").is_empty());
        assert!(decoder.pending.is_empty());
        assert_eq!(decoder.feed(b"\ndata:x\n\n"), vec!["x".to_string()]);
    }

    #[test]
    fn finish_flushes_unterminated_event() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: tail").is_empty());
        assert_eq!(decoder.finish(), Some("tail".to_string()));
        assert_eq!(decoder.finish(), None);
    }
}
