//! Streaming chat endpoint.
//!
//! `POST /v1/chat` forwards the submitted history to the model gateway and
//! relays the reply as framed `data:` lines (see [`crate::relay`]). The quota
//! is not touched here: clients reserve a message through
//! `POST /v1/rate-limit` before opening the stream.

use std::sync::Arc;

use axum::extract::State;
use axum::response::Response;
use axum::routing::post;
use axum::Router;
use parley_types::{UNSUPPORTED_MODEL_MESSAGE, is_supported_model};
use tracing::{info, warn};
use utoipa::OpenApi;
use validator::Validate;

use crate::error::ServerError;
use crate::extract::JsonBody;
use crate::middleware::CallerIdentity;
use crate::relay;
use crate::schemas::v1::chat::{ChatRequest, ChatTurn};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(chat), components(schemas(ChatRequest, ChatTurn)))]
pub struct ChatApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/chat", post(chat))
}

#[utoipa::path(
    post,
    path = "/v1/chat",
    tag = "chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Framed reply stream", content_type = "text/event-stream", body = String),
        (status = 400, description = "Unsupported model or invalid history"),
        (status = 401, description = "No caller identity"),
        (status = 500, description = "Provider failed before streaming"),
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    caller: CallerIdentity,
    JsonBody(req): JsonBody<ChatRequest>,
) -> Result<Response, ServerError> {
    req.validate()?;
    if !is_supported_model(&req.model) {
        warn!(user_id = %caller.user_id(), model = %req.model, "rejected unsupported model");
        return Err(ServerError::BadRequest(UNSUPPORTED_MODEL_MESSAGE.to_owned()));
    }

    info!(
        user_id = %caller.user_id(),
        model = %req.model,
        turns = req.messages.len(),
        web_search = req.web_search,
        "chat request"
    );

    let events = state
        .gateway
        .stream_generate(&req.history(), &req.model, req.web_search)
        .await?;
    relay::respond(events, caller.user_id()).await
}
