//! Client half of the streaming protocol.
//!
//! Bytes are buffered until a newline, so UTF-8 sequences and frames split
//! across network chunks are reassembled before decoding (`\n` never occurs
//! inside a multi-byte sequence). Each complete `data:` line is parsed on
//! its own; a malformed one is skipped and reading continues.

use std::error::Error as StdError;

use futures::{Stream, StreamExt};
use parley_types::{Frame, GroundingMetadata};
use thiserror::Error;
use tracing::{debug, warn};

/// A fully received reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub text: String,
    pub grounding: Option<GroundingMetadata>,
}

#[derive(Debug, Error)]
pub enum ConsumeError {
    /// The body ended without `[DONE]`; the reply must not be treated as
    /// complete.
    #[error("stream ended before [DONE] after {} bytes of text", .partial.text.len())]
    Incomplete { partial: Completion },

    #[error("stream read failed: {source}")]
    Transport {
        partial: Completion,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl ConsumeError {
    /// Whatever text arrived before the failure.
    pub fn partial(&self) -> &Completion {
        match self {
            ConsumeError::Incomplete { partial } | ConsumeError::Transport { partial, .. } => {
                partial
            }
        }
    }
}

/// Incremental frame parser; feed it chunks as they arrive.
#[derive(Debug, Default)]
pub struct StreamConsumer {
    pending: Vec<u8>,
    text: String,
    grounding: Option<GroundingMetadata>,
    done: bool,
    skipped: usize,
}

impl StreamConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text accumulated so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn grounding(&self) -> Option<&GroundingMetadata> {
        self.grounding.as_ref()
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Frames dropped because they could not be parsed.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Process one chunk. `on_text` sees the whole accumulated text after
    /// every content frame. Bytes after `[DONE]` are ignored.
    pub fn push(&mut self, chunk: &[u8], on_text: &mut impl FnMut(&str)) {
        if self.done {
            return;
        }
        self.pending.extend_from_slice(chunk);
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            self.handle_line(&line, on_text);
            if self.done {
                self.pending.clear();
                return;
            }
        }
    }

    /// Process a trailing line that was not newline-terminated.
    pub fn finish(&mut self, on_text: &mut impl FnMut(&str)) {
        if self.done || self.pending.is_empty() {
            return;
        }
        let line = std::mem::take(&mut self.pending);
        self.handle_line(&line, on_text);
    }

    fn handle_line(&mut self, raw: &[u8], on_text: &mut impl FnMut(&str)) {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim_end_matches(['\n', '\r']);
        match Frame::parse_line(line) {
            None => {}
            Some(Ok(Frame::Content(fragment))) => {
                self.text.push_str(&fragment);
                on_text(&self.text);
            }
            Some(Ok(Frame::Grounding(metadata))) => {
                if self.grounding.is_some() {
                    debug!("second grounding frame replaces the first");
                }
                self.grounding = Some(metadata);
            }
            Some(Ok(Frame::Done)) => self.done = true,
            Some(Err(e)) => {
                self.skipped += 1;
                warn!(error = %e, "skipping malformed frame");
            }
        }
    }

    fn snapshot(&self) -> Completion {
        Completion {
            text: self.text.clone(),
            grounding: self.grounding.clone(),
        }
    }

    pub fn into_completion(self) -> Completion {
        Completion {
            text: self.text,
            grounding: self.grounding,
        }
    }
}

/// Read `body` until `[DONE]`, reporting the growing text through `on_text`.
///
/// Stops reading as soon as `[DONE]` arrives. A body that ends (or fails)
/// first is an error carrying the partial text.
pub async fn consume<S, B, E>(body: S, mut on_text: impl FnMut(&str)) -> Result<Completion, ConsumeError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<Box<dyn StdError + Send + Sync>>,
{
    let mut body = std::pin::pin!(body);
    let mut consumer = StreamConsumer::new();

    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(bytes) => consumer.push(bytes.as_ref(), &mut on_text),
            Err(e) => {
                return Err(ConsumeError::Transport {
                    partial: consumer.snapshot(),
                    source: e.into(),
                });
            }
        }
        if consumer.is_done() {
            break;
        }
    }
    consumer.finish(&mut on_text);

    if consumer.is_done() {
        Ok(consumer.into_completion())
    } else {
        Err(ConsumeError::Incomplete {
            partial: consumer.into_completion(),
        })
    }
}
