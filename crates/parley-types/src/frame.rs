//! Stream framing for the chat endpoint.
//!
//! The response body is a sequence of UTF-8 frames, each a `data: ` line
//! followed by a blank line:
//!
//! ```text
//! data: {"content": "Hel"}
//!
//! data: {"content": "lo"}
//!
//! data: {"groundingMetadata": {...}}
//!
//! data: [DONE]
//! ```
//!
//! Content frames come first, in generation order. At most one grounding frame
//! follows them. `[DONE]` is always last and is the only reliable sign that
//! the stream completed.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::grounding::GroundingMetadata;

/// Prefix carried by every frame line.
pub const FRAME_MARKER: &str = "data:";

/// Payload of the terminal frame.
pub const DONE_SENTINEL: &str = "[DONE]";

const CONTENT_KEY: &str = "content";
const GROUNDING_KEY: &str = "groundingMetadata";

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// An incremental text fragment.
    Content(String),
    /// Citations for the whole response, sent after the last fragment.
    Grounding(GroundingMetadata),
    /// End of stream.
    Done,
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("malformed frame payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame payload has no recognised key: {0}")]
    UnknownPayload(String),
}

impl Frame {
    /// The text after `data: `, without framing.
    pub fn payload(&self) -> String {
        match self {
            Frame::Content(text) => {
                let mut body = Map::new();
                body.insert(CONTENT_KEY.to_owned(), Value::String(text.clone()));
                Value::Object(body).to_string()
            }
            Frame::Grounding(metadata) => {
                let mut body = Map::new();
                // GroundingMetadata only holds strings, integers, floats and
                // vectors of them, so conversion cannot fail.
                let value = serde_json::to_value(metadata).unwrap_or(Value::Null);
                body.insert(GROUNDING_KEY.to_owned(), value);
                Value::Object(body).to_string()
            }
            Frame::Done => DONE_SENTINEL.to_owned(),
        }
    }

    /// Render this frame exactly as it appears on the wire, trailing blank
    /// line included.
    pub fn encode(&self) -> String {
        format!("{FRAME_MARKER} {}\n\n", self.payload())
    }

    /// Parse one line of the stream (without its trailing newline).
    ///
    /// Returns `None` for lines that are not frames (blank separators, SSE
    /// comments), `Some(Err(_))` for frames whose payload cannot be decoded.
    pub fn parse_line(line: &str) -> Option<Result<Frame, FrameError>> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let payload = line.strip_prefix(FRAME_MARKER)?;
        let payload = payload.strip_prefix(' ').unwrap_or(payload).trim_end();
        if payload == DONE_SENTINEL {
            return Some(Ok(Frame::Done));
        }
        Some(Self::parse_payload(payload))
    }

    fn parse_payload(payload: &str) -> Result<Frame, FrameError> {
        let mut value: Value = serde_json::from_str(payload)?;
        if let Some(text) = value.get(CONTENT_KEY).and_then(Value::as_str) {
            return Ok(Frame::Content(text.to_owned()));
        }
        if let Some(raw) = value.get_mut(GROUNDING_KEY).map(Value::take) {
            return Ok(Frame::Grounding(serde_json::from_value(raw)?));
        }
        Err(FrameError::UnknownPayload(truncate(payload, 120)))
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_owned(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::grounding::{GroundingChunk, WebSource};
    use proptest::prelude::*;

    fn parse_all(body: &str) -> Vec<Frame> {
        body.split('\n')
            .filter_map(Frame::parse_line)
            .filter_map(Result::ok)
            .collect()
    }

    #[test]
    fn content_frame_wire_format() {
        assert_eq!(
            Frame::Content("Hel".into()).encode(),
            "data: {\"content\":\"Hel\"}\n\n"
        );
        assert_eq!(Frame::Done.encode(), "data: [DONE]\n\n");
        assert_eq!(Frame::Done.payload(), "[DONE]");
        assert_eq!(Frame::Content("Hel".into()).payload(), "{\"content\":\"Hel\"}");
    }

    #[test]
    fn parse_accepts_marker_without_space_and_crlf() {
        let frame = Frame::parse_line("data:{\"content\":\"x\"}\r").unwrap().unwrap();
        assert_eq!(frame, Frame::Content("x".into()));
        assert!(matches!(Frame::parse_line("data: [DONE]"), Some(Ok(Frame::Done))));
    }

    #[test]
    fn non_frame_lines_are_ignored() {
        assert!(Frame::parse_line("").is_none());
        assert!(Frame::parse_line(": keep-alive").is_none());
        assert!(Frame::parse_line("event: message").is_none());
    }

    #[test]
    fn malformed_payload_is_an_error() {
        assert!(matches!(
            Frame::parse_line("data: {\"content\": \"unterminated"),
            Some(Err(FrameError::Json(_)))
        ));
        assert!(matches!(
            Frame::parse_line("data: {\"delta\": \"x\"}"),
            Some(Err(FrameError::UnknownPayload(_)))
        ));
    }

    #[test]
    fn grounding_frame_survives_encoding() {
        let metadata = GroundingMetadata {
            grounding_chunks: vec![GroundingChunk {
                web: Some(WebSource {
                    uri: "https://example.org".into(),
                    title: Some("Example".into()),
                }),
            }],
            web_search_queries: vec!["example".into()],
            search_entry_point: Some("<div>search</div>".into()),
            ..Default::default()
        };
        let encoded = Frame::Grounding(metadata.clone()).encode();
        assert!(encoded.starts_with("data: {\"groundingMetadata\":"));
        assert_eq!(parse_all(&encoded), vec![Frame::Grounding(metadata)]);
    }

    proptest! {
        #[test]
        fn concatenated_frames_reconstruct_fragments(
            fragments in proptest::collection::vec(any::<String>(), 0..16),
            query in proptest::option::of("[a-z ]{1,20}"),
        ) {
            let metadata = query.map(|q| GroundingMetadata {
                web_search_queries: vec![q],
                ..Default::default()
            });

            let mut body = String::new();
            for fragment in &fragments {
                body.push_str(&Frame::Content(fragment.clone()).encode());
            }
            if let Some(m) = &metadata {
                body.push_str(&Frame::Grounding(m.clone()).encode());
            }
            body.push_str(&Frame::Done.encode());

            let frames = parse_all(&body);
            let text: String = frames
                .iter()
                .filter_map(|f| match f {
                    Frame::Content(t) => Some(t.as_str()),
                    _ => None,
                })
                .collect();
            let grounding = frames.iter().find_map(|f| match f {
                Frame::Grounding(m) => Some(m.clone()),
                _ => None,
            });

            prop_assert_eq!(text, fragments.concat());
            prop_assert_eq!(grounding, metadata);
            prop_assert_eq!(frames.last(), Some(&Frame::Done));
        }
    }
}
