//! Gemini implementation of [`ModelGateway`].
//!
//! Requests go to `models/{model}:streamGenerateContent?alt=sse`. Each SSE
//! event carries a partial `GenerateContentResponse`; its text becomes a
//! [`GenerationEvent::TextDelta`]. Grounding data is only complete once the
//! provider closes the body, so it is held until then and emitted as a
//! single [`GenerationEvent::Metadata`].

pub mod request;
pub mod response;

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt};
use parley_types::WireMessage;
use tracing::{debug, warn};

use self::request::GenerateContentRequest;
use self::response::{GenerateContentResponse, ProviderGrounding};
use super::sse::SseDecoder;
use super::{GatewayError, GenerationEvent, GenerationStream, ModelGateway};
use crate::config::GeminiConfig;

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Clone)]
pub struct GeminiGateway {
    http: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiGateway {
    pub fn new(config: GeminiConfig) -> Result<Self, GatewayError> {
        // No overall request timeout: a healthy stream may run for minutes.
        // Idle gaps are bounded per chunk instead.
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;
        Ok(Self { http, config })
    }

    fn stream_url(&self, model: &str) -> String {
        let name = model.strip_prefix("models/").unwrap_or(model);
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.config.base_url.trim_end_matches('/'),
            name
        )
    }
}

#[async_trait]
impl ModelGateway for GeminiGateway {
    async fn stream_generate(
        &self,
        history: &[WireMessage],
        model: &str,
        web_search: bool,
    ) -> Result<GenerationStream, GatewayError> {
        if !parley_types::is_supported_model(model) {
            return Err(GatewayError::UnsupportedModel(model.to_owned()));
        }
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(GatewayError::MissingApiKey)?;

        let body = GenerateContentRequest::new(history, model, web_search);
        debug!(
            model,
            turns = body.contents.len(),
            web_search,
            "starting gemini stream"
        );

        let response = self
            .http
            .post(self.stream_url(model))
            .header(API_KEY_HEADER, api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(model, status = status.as_u16(), "gemini rejected the request");
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message: provider_error_message(&message),
            });
        }

        Ok(event_stream(response.bytes_stream(), &self.config))
    }
}

/// Pull the human-readable message out of a Gemini error body.
fn provider_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_owned))
        .unwrap_or_else(|| body.chars().take(512).collect())
}

/// Turn a provider SSE body into generation events.
pub(crate) fn event_stream<S, E>(body: S, config: &GeminiConfig) -> GenerationStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = ProviderStream {
        body: body.map(|r| r.map_err(|e| e.to_string())).boxed(),
        decoder: SseDecoder::new(),
        ready: VecDeque::new(),
        grounding: None,
        received_first: false,
        finished: false,
        first_chunk_timeout: config.first_chunk_timeout,
        chunk_timeout: config.chunk_timeout,
    };
    futures::stream::unfold(state, |mut state| async move {
        state.next_event().await.map(|event| (event, state))
    })
    .boxed()
}

struct ProviderStream {
    body: BoxStream<'static, Result<Bytes, String>>,
    decoder: SseDecoder,
    ready: VecDeque<Result<GenerationEvent, GatewayError>>,
    grounding: Option<ProviderGrounding>,
    received_first: bool,
    finished: bool,
    first_chunk_timeout: Duration,
    chunk_timeout: Duration,
}

impl ProviderStream {
    async fn next_event(&mut self) -> Option<Result<GenerationEvent, GatewayError>> {
        loop {
            if let Some(event) = self.ready.pop_front() {
                if event.is_err() {
                    // Nothing may follow an error.
                    self.finished = true;
                    self.ready.clear();
                }
                return Some(event);
            }
            if self.finished {
                return None;
            }

            let (wait, operation) = if self.received_first {
                (self.chunk_timeout, "next chunk")
            } else {
                (self.first_chunk_timeout, "first chunk")
            };

            match tokio::time::timeout(wait, self.body.next()).await {
                Err(_) => {
                    self.finished = true;
                    return Some(Err(GatewayError::Timeout {
                        operation,
                        seconds: wait.as_secs(),
                    }));
                }
                Ok(Some(Ok(bytes))) => {
                    self.received_first = true;
                    for payload in self.decoder.push(&bytes) {
                        self.process_payload(&payload);
                    }
                }
                Ok(Some(Err(message))) => {
                    self.finished = true;
                    return Some(Err(GatewayError::Stream(message)));
                }
                Ok(None) => {
                    for payload in self.decoder.finish() {
                        self.process_payload(&payload);
                    }
                    if let Some(metadata) = self.grounding.take().and_then(ProviderGrounding::normalize)
                    {
                        self.ready.push_back(Ok(GenerationEvent::Metadata(metadata)));
                    }
                    self.finished = true;
                }
            }
        }
    }

    fn process_payload(&mut self, payload: &str) {
        let payload = payload.trim();
        if payload.is_empty() || payload == "[DONE]" {
            return;
        }

        let value: serde_json::Value = match serde_json::from_str(payload) {
            Ok(v) => v,
            Err(e) => {
                self.ready.push_back(Err(GatewayError::Parse(e.to_string())));
                return;
            }
        };

        if let Some(error) = value.get("error") {
            let status = error
                .get("code")
                .and_then(|c| c.as_u64())
                .and_then(|c| u16::try_from(c).ok())
                .unwrap_or(500);
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_owned)
                .unwrap_or_else(|| error.to_string());
            self.ready.push_back(Err(GatewayError::Api { status, message }));
            return;
        }

        let response: GenerateContentResponse = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(e) => {
                self.ready.push_back(Err(GatewayError::Parse(e.to_string())));
                return;
            }
        };

        let Some(candidate) = response.candidates.first() else {
            return;
        };
        let text = candidate.text();
        if !text.is_empty() {
            self.ready.push_back(Ok(GenerationEvent::TextDelta(text)));
        }
        // Later chunks carry the more complete grounding view.
        if let Some(grounding) = candidate.grounding() {
            self.grounding = Some(grounding);
        }
    }
}
