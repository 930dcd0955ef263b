//! HTTP client for parley-server.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use parley_types::{Role, UNSUPPORTED_MODEL_MESSAGE, WireMessage, is_supported_model};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::consumer::consume;
use crate::error::ClientError;
use crate::exchange::{ExchangeOutcome, finalize_exchange};
use crate::preferences::{Preferences, RemoteSync};
use crate::store::{ChatSummary, ConversationStore, NewMessage, StoredMessage};

pub const DEFAULT_IDENTITY_HEADER: &str = "x-authenticated-user";

/// Quota snapshot as reported by `GET /v1/rate-limit`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStatus {
    pub can_send_message: bool,
    pub current_count: i64,
    pub limit: i64,
    pub remaining: i64,
    pub week_start: String,
    pub reset_date: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOptions {
    pub model: String,
    pub web_search: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageCount {
    message_count: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatBody<'a> {
    messages: &'a [WireMessage],
    model: &'a str,
    web_search: bool,
}

/// Talks to parley-server on behalf of one user.
///
/// The identity header stands in for whatever the deployment's auth proxy
/// sets after authenticating the user.
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    identity_header: String,
    user_id: String,
}

impl ChatClient {
    pub fn new(base_url: impl Into<String>, user_id: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_identity_header(base_url, user_id, DEFAULT_IDENTITY_HEADER)
    }

    pub fn with_identity_header(
        base_url: impl Into<String>,
        user_id: impl Into<String>,
        identity_header: impl Into<String>,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .tcp_keepalive(std::time::Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            identity_header: identity_header.into(),
            user_id: user_id.into(),
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.base_url))
            .header(self.identity_header.as_str(), self.user_id.as_str())
    }

    /// Pass successful responses through; turn the rest into errors carrying
    /// the server's `error` message.
    async fn check(response: Response) -> Result<Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_owned))
            .unwrap_or(body);
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ClientError::QuotaExceeded { message });
        }
        Err(ClientError::Status {
            status: status.as_u16(),
            message,
        })
    }

    pub async fn rate_limit_status(&self) -> Result<RateLimitStatus, ClientError> {
        let response = self.request(Method::GET, "/v1/rate-limit").send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Reserve one message of this week's budget.
    pub async fn increment_usage(&self) -> Result<i64, ClientError> {
        let response = self.request(Method::POST, "/v1/rate-limit").send().await?;
        let count: MessageCount = Self::check(response).await?.json().await?;
        Ok(count.message_count)
    }

    /// Give back a reserved message.
    pub async fn decrement_usage(&self) -> Result<i64, ClientError> {
        let response = self.request(Method::DELETE, "/v1/rate-limit").send().await?;
        let count: MessageCount = Self::check(response).await?.json().await?;
        Ok(count.message_count)
    }

    pub async fn list_chats(&self) -> Result<Vec<ChatSummary>, ClientError> {
        let response = self.request(Method::GET, "/v1/chats").send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Open the reply stream for `history`. Errors before the first frame
    /// come back as ordinary HTTP errors.
    pub async fn stream_chat(
        &self,
        history: &[WireMessage],
        options: &SendOptions,
    ) -> Result<BoxStream<'static, reqwest::Result<Bytes>>, ClientError> {
        let response = self
            .request(Method::POST, "/v1/chat")
            .json(&ChatBody {
                messages: history,
                model: &options.model,
                web_search: options.web_search,
            })
            .send()
            .await?;
        Ok(Self::check(response).await?.bytes_stream().boxed())
    }

    /// Run one full exchange: store the user message, reserve quota, stream
    /// the reply through `on_text`, then persist it.
    ///
    /// `prior` is the chat's history before `text`. If no complete reply
    /// arrives after the quota was reserved, the reservation is released.
    pub async fn send_message(
        &self,
        chat_id: &str,
        prior: &[WireMessage],
        text: &str,
        options: &SendOptions,
        on_text: impl FnMut(&str) + Send,
    ) -> Result<ExchangeOutcome, ClientError> {
        if !is_supported_model(&options.model) {
            return Err(ClientError::Invalid(UNSUPPORTED_MODEL_MESSAGE.to_owned()));
        }

        self.append_message(chat_id, NewMessage::user(text)).await?;
        let count = self.increment_usage().await?;
        debug!(chat_id, count, "quota reserved");

        let mut history = prior.to_vec();
        history.push(WireMessage::new(Role::User, text));

        let reply = async {
            let body = self.stream_chat(&history, options).await?;
            Ok::<_, ClientError>(consume(body, on_text).await?)
        }
        .await;

        let completion = match reply {
            Ok(completion) => completion,
            Err(e) => {
                warn!(chat_id, error = %e, "no complete reply; releasing quota");
                if let Err(release) = self.decrement_usage().await {
                    warn!(chat_id, error = %release, "failed to release quota");
                }
                return Err(e);
            }
        };

        let outcome = finalize_exchange(self, chat_id, &history, completion).await?;
        info!(chat_id, chars = outcome.assistant.content.len(), "exchange complete");
        Ok(outcome)
    }
}

#[async_trait]
impl ConversationStore for ChatClient {
    async fn create_chat(&self, title: Option<&str>) -> Result<ChatSummary, ClientError> {
        let response = self
            .request(Method::POST, "/v1/chats")
            .json(&json!({ "title": title }))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn append_message(
        &self,
        chat_id: &str,
        message: NewMessage,
    ) -> Result<StoredMessage, ClientError> {
        let response = self
            .request(Method::POST, &format!("/v1/chats/{chat_id}/messages"))
            .json(&message)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn set_title(&self, chat_id: &str, title: &str) -> Result<(), ClientError> {
        let response = self
            .request(Method::PUT, &format!("/v1/chats/{chat_id}/title"))
            .json(&json!({ "title": title }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn list_messages(&self, chat_id: &str) -> Result<Vec<StoredMessage>, ClientError> {
        let response = self
            .request(Method::GET, &format!("/v1/chats/{chat_id}/messages"))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }
}

#[async_trait]
impl RemoteSync for ChatClient {
    async fn pull(&self) -> Result<Option<Preferences>, ClientError> {
        let response = self.request(Method::GET, "/v1/preferences").send().await?;
        Ok(Some(Self::check(response).await?.json().await?))
    }

    async fn push(&self, preferences: &Preferences) -> Result<(), ClientError> {
        let response = self
            .request(Method::PUT, "/v1/preferences")
            .json(preferences)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
