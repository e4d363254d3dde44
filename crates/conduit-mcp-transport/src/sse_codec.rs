//! Incremental parser for the W3C EventSource wire grammar.
//!
//! Bytes are appended as they arrive from the network; complete events are
//! extracted once their terminating blank line has been seen. Handles LF and
//! CRLF line endings, `:` comment lines, multi-line `data:` joined with
//! `\n`, and the `event:`, `id:` and `retry:` fields.

/// One parsed server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event type; defaults to `message` when the stream does not set one.
    pub event: String,
    pub data: String,
    pub id: Option<String>,
    pub retry: Option<u64>,
}

#[derive(Default)]
pub struct SseParser {
    buffer: String,
    event_type: String,
    data_lines: Vec<String>,
    id: Option<String>,
    retry: Option<u64>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk of bytes and return every event completed by it.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));

        let mut events = Vec::new();
        while let Some(newline) = self.buffer.find('\n') {
            let mut line: String = self.buffer.drain(..=newline).collect();
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }
        events
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.flush_event();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event_type = value.to_string(),
            "data" => self.data_lines.push(value.to_string()),
            "id" => {
                // Ids containing NUL are ignored per the EventSource spec.
                if !value.contains('\0') {
                    self.id = Some(value.to_string());
                }
            }
            "retry" => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.retry = Some(ms);
                }
            }
            _ => {}
        }
        None
    }

    fn flush_event(&mut self) -> Option<SseEvent> {
        // A blank line with no accumulated data dispatches nothing.
        if self.data_lines.is_empty() {
            self.event_type.clear();
            return None;
        }

        let event = SseEvent {
            event: if self.event_type.is_empty() {
                "message".to_string()
            } else {
                std::mem::take(&mut self.event_type)
            },
            data: self.data_lines.join("\n"),
            id: self.id.take(),
            retry: self.retry.take(),
        };
        self.event_type.clear();
        self.data_lines.clear();
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_message_event() {
        let mut parser = SseParser::new();
        let events = parser.push(b"event: message\ndata: {\"ok\":true}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "message");
        assert_eq!(events[0].data, "{\"ok\":true}");
    }

    #[test]
    fn defaults_event_type_to_message() {
        let mut parser = SseParser::new();
        let events = parser.push(b"data: hello\n\n");
        assert_eq!(events[0].event, "message");
        assert_eq!(events[0].data, "hello");
    }

    #[test]
    fn joins_multiple_data_lines_with_newline() {
        let mut parser = SseParser::new();
        let events = parser.push(b"data: line one\ndata: line two\n\n");
        assert_eq!(events[0].data, "line one\nline two");
    }

    #[test]
    fn handles_crlf_line_endings() {
        let mut parser = SseParser::new();
        let events = parser.push(b"event: endpoint\r\ndata: /messages\r\n\r\n");
        assert_eq!(events[0].event, "endpoint");
        assert_eq!(events[0].data, "/messages");
    }

    #[test]
    fn buffers_partial_events_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.push(b"data: par").is_empty());
        assert!(parser.push(b"tial\n").is_empty());
        let events = parser.push(b"\n");
        assert_eq!(events[0].data, "partial");
    }

    #[test]
    fn ignores_comment_lines() {
        let mut parser = SseParser::new();
        let events = parser.push(b": keepalive\n\ndata: real\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "real");
    }

    #[test]
    fn captures_id_and_retry() {
        let mut parser = SseParser::new();
        let events = parser.push(b"id: 42\nretry: 3000\ndata: x\n\n");
        assert_eq!(events[0].id.as_deref(), Some("42"));
        assert_eq!(events[0].retry, Some(3000));

        // id containing NUL is ignored.
        let events = parser.push(b"id: a\0b\ndata: y\n\n");
        assert_eq!(events[0].id, None);
    }

    #[test]
    fn blank_line_without_data_dispatches_nothing() {
        let mut parser = SseParser::new();
        assert!(parser.push(b"event: ping\n\n").is_empty());
    }

    #[test]
    fn value_keeps_leading_space_only_once() {
        let mut parser = SseParser::new();
        let events = parser.push(b"data:  two spaces\n\n");
        // Exactly one leading space is stripped after the colon.
        assert_eq!(events[0].data, " two spaces");
    }

    #[test]
    fn two_events_in_one_chunk() {
        let mut parser = SseParser::new();
        let events = parser.push(b"data: a\n\ndata: b\n\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, "a");
        assert_eq!(events[1].data, "b");
    }
}
