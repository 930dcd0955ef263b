//! Incremental decoding of provider `text/event-stream` bodies.

const SSE_EVENT_SEPARATOR: &str = "\n\n";

/// Accumulates raw body bytes and yields complete SSE event payloads.
///
/// Multi-byte UTF-8 sequences split across network chunks are held back
/// until the rest of the sequence arrives.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    buffer: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network chunk; returns the payloads of all events it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        self.decode_pending();
        drain_sse_events(&mut self.buffer)
    }

    /// Flush whatever remains once the body has ended.
    pub fn finish(&mut self) -> Vec<String> {
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            self.buffer.push_str(&String::from_utf8_lossy(&rest));
        }
        if self.buffer.trim().is_empty() {
            self.buffer.clear();
            return Vec::new();
        }
        if !self.buffer.ends_with(SSE_EVENT_SEPARATOR) {
            self.buffer.push_str(SSE_EVENT_SEPARATOR);
        }
        let events = drain_sse_events(&mut self.buffer);
        self.buffer.clear();
        events
    }

    fn decode_pending(&mut self) {
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    self.pending.clear();
                    return;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    self.buffer
                        .push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        // Incomplete sequence at the end: wait for more bytes.
                        None => {
                            self.pending.drain(..valid);
                            return;
                        }
                        Some(bad) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + bad);
                        }
                    }
                }
            }
        }
    }
}

/// Drain complete SSE events from `buffer` and return their `data:` payloads.
///
/// Incomplete events stay in the buffer for the next call.
fn drain_sse_events(buffer: &mut String) -> Vec<String> {
    let mut events = Vec::new();

    loop {
        if buffer.contains('\r') {
            *buffer = buffer.replace("\r\n", "\n");
        }
        let Some(idx) = buffer.find(SSE_EVENT_SEPARATOR) else {
            break;
        };

        let raw_event = buffer[..idx].to_owned();
        buffer.drain(..idx + SSE_EVENT_SEPARATOR.len());

        if let Some(payload) = extract_event_payload(&raw_event) {
            if !payload.is_empty() {
                events.push(payload);
            }
        }
    }

    events
}

fn extract_event_payload(event: &str) -> Option<String> {
    let data_lines: Vec<&str> = event
        .lines()
        .filter_map(|line| line.trim_end().strip_prefix("data:"))
        .map(str::trim_start)
        .collect();

    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn events_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"a\":").is_empty());
        let events = decoder.push(b"1}\n\ndata: {\"b\":2}\n");
        assert_eq!(events, vec!["{\"a\":1}".to_string()]);
        assert_eq!(decoder.push(b"\n"), vec!["{\"b\":2}".to_string()]);
    }

    #[test]
    fn utf8_sequence_split_across_chunks() {
        let bytes = "data: {\"t\":\"héllo\"}\n\n".as_bytes();
        // Split inside the two-byte 'é'.
        let split = bytes.iter().position(|&b| b == 0xC3).unwrap() + 1;
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(&bytes[..split]).is_empty());
        assert_eq!(decoder.push(&bytes[split..]), vec!["{\"t\":\"héllo\"}".to_string()]);
    }

    #[test]
    fn crlf_separators_and_comments() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b": ping\r\n\r\ndata: one\r\n\r\n");
        assert_eq!(events, vec!["one".to_string()]);
    }

    #[test]
    fn finish_flushes_unterminated_event() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: last").is_empty());
        assert_eq!(decoder.finish(), vec!["last".to_string()]);
        assert!(decoder.finish().is_empty());
    }
}
