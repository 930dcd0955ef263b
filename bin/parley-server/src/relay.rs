//! Server half of the streaming protocol.
//!
//! Turns a [`GenerationStream`] into the framed response body:
//! one `content` frame per text delta, at most one `groundingMetadata` frame
//! after all content, and a closing `[DONE]`. A provider failure after the
//! first frame aborts the body instead of closing it cleanly, so the client
//! never sees `[DONE]` for an incomplete answer.

use std::pin::Pin;

use axum::http::{HeaderName, header};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use futures::stream::{self, Stream, StreamExt};
use parley_types::{Frame, GroundingMetadata};
use tracing::{debug, info, warn};

use crate::error::ServerError;
use crate::gateway::{GatewayError, GenerationEvent, GenerationStream};

pub const EVENT_STREAM: &str = "text/event-stream; charset=utf-8";
const STREAM_CACHE_CONTROL: &str = "no-store, no-cache, no-transform, must-revalidate";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Streaming,
    Trailer,
    Finished,
}

struct Relay<S> {
    events: S,
    grounding: Option<GroundingMetadata>,
    phase: Phase,
    content_frames: usize,
    content_bytes: usize,
    user_id: String,
}

impl<S> Relay<S>
where
    S: Stream<Item = Result<GenerationEvent, GatewayError>> + Unpin,
{
    async fn next_frame(&mut self) -> Option<Result<Frame, GatewayError>> {
        loop {
            match self.phase {
                Phase::Finished => return None,
                Phase::Trailer => {
                    self.phase = Phase::Finished;
                    info!(
                        user_id = %self.user_id,
                        frames = self.content_frames,
                        bytes = self.content_bytes,
                        "response stream complete"
                    );
                    return Some(Ok(Frame::Done));
                }
                Phase::Streaming => {}
            }

            match self.events.next().await {
                Some(Ok(GenerationEvent::TextDelta(text))) => {
                    if text.is_empty() {
                        continue;
                    }
                    self.content_frames += 1;
                    self.content_bytes += text.len();
                    return Some(Ok(Frame::Content(text)));
                }
                Some(Ok(GenerationEvent::Metadata(metadata))) => {
                    debug!(user_id = %self.user_id, "grounding metadata received");
                    self.grounding = Some(metadata);
                }
                Some(Err(e)) => {
                    self.phase = Phase::Finished;
                    warn!(
                        user_id = %self.user_id,
                        frames = self.content_frames,
                        error = %e,
                        "provider failed mid-stream; aborting response"
                    );
                    return Some(Err(e));
                }
                None => {
                    self.phase = Phase::Trailer;
                    if let Some(metadata) = self.grounding.take() {
                        return Some(Ok(Frame::Grounding(metadata)));
                    }
                }
            }
        }
    }
}

impl<S> Drop for Relay<S> {
    fn drop(&mut self) {
        if self.phase != Phase::Finished {
            info!(
                user_id = %self.user_id,
                frames = self.content_frames,
                "client went away; abandoning generation"
            );
        }
    }
}

/// Frame sequence for `events`. Ends with `Ok(Frame::Done)` on success or a
/// single `Err` on provider failure.
pub fn frames<S>(
    events: S,
    user_id: &str,
) -> impl Stream<Item = Result<Frame, GatewayError>> + Send + use<S>
where
    S: Stream<Item = Result<GenerationEvent, GatewayError>> + Send + Unpin + 'static,
{
    let relay = Relay {
        events,
        grounding: None,
        phase: Phase::Streaming,
        content_frames: 0,
        content_bytes: 0,
        user_id: user_id.to_owned(),
    };
    stream::unfold(relay, |mut relay| async move {
        let frame = relay.next_frame().await?;
        Some((frame, relay))
    })
}

/// Build the streaming response.
///
/// The first event is awaited before any header is sent: a failure there is
/// still reported as an ordinary JSON error. Later failures surface as a body
/// error, which aborts the connection before `[DONE]`.
pub async fn respond(events: GenerationStream, user_id: &str) -> Result<Response, ServerError> {
    let mut events = events.peekable();
    let failed_early = matches!(Pin::new(&mut events).peek().await, Some(Err(_)));
    if failed_early {
        if let Some(Err(e)) = events.next().await {
            return Err(ServerError::Provider(e));
        }
    }

    let sse_stream =
        frames(events, user_id).map(|frame| frame.map(|f| Event::default().data(f.payload())));

    Ok((
        [
            (header::CONTENT_TYPE, EVENT_STREAM),
            (header::CACHE_CONTROL, STREAM_CACHE_CONTROL),
            (header::PRAGMA, "no-cache"),
            (header::CONNECTION, "keep-alive"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Sse::new(sse_stream),
    )
        .into_response())
}
