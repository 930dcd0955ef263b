//! Model gateway: turns a conversation into a stream of generation events.
//!
//! [`ModelGateway`] is the seam between the HTTP layer and the generation
//! provider. The production implementation is [`gemini::GeminiGateway`];
//! tests swap in a scripted gateway through the same trait object.
//!
//! A gateway call has two failure phases:
//! - setup (validation, auth, HTTP status) fails the call itself, before any
//!   event exists;
//! - once streaming, a failure is yielded as the final `Err` item of the
//!   stream and nothing follows it.

pub mod gemini;
mod sse;

use async_trait::async_trait;
use futures::stream::BoxStream;
use parley_types::{GroundingMetadata, WireMessage};
use thiserror::Error;

/// One item produced while a response is generated.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationEvent {
    /// Newly generated text, in order.
    TextDelta(String),
    /// Grounding citations; at most once, after every text delta.
    Metadata(GroundingMetadata),
}

pub type GenerationStream = BoxStream<'static, Result<GenerationEvent, GatewayError>>;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("unsupported model: {0}")]
    UnsupportedModel(String),

    #[error("provider API key is not configured")]
    MissingApiKey,

    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("failed to parse provider payload: {0}")]
    Parse(String),

    #[error("provider sent nothing for {seconds}s while waiting for the {operation}")]
    Timeout { operation: &'static str, seconds: u64 },

    #[error("provider stream interrupted: {0}")]
    Stream(String),
}

#[async_trait]
pub trait ModelGateway: Send + Sync + 'static {
    /// Start generating a reply to `history` with `model`.
    ///
    /// When `web_search` is set the provider may ground its answer with web
    /// results, in which case a [`GenerationEvent::Metadata`] closes the
    /// stream.
    async fn stream_generate(
        &self,
        history: &[WireMessage],
        model: &str,
        web_search: bool,
    ) -> Result<GenerationStream, GatewayError>;
}
