//! Conversation records touched by the chat pipeline.
//!
//! Every chat belongs to the caller that created it; another user's chat id
//! is indistinguishable from a missing one (404).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use parley_types::Role;
use tracing::info;
use utoipa::OpenApi;
use uuid::Uuid;
use validator::Validate;

use crate::entities::{Chat, ChatMessage, ChatStore};
use crate::error::ServerError;
use crate::extract::JsonBody;
use crate::middleware::CallerIdentity;
use crate::schemas::v1::chats::{
    AppendMessageRequest, ChatResponse, CreateChatRequest, MessageResponse, SetTitleRequest,
};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(create_chat, list_chats, list_messages, append_message, set_title),
    components(schemas(
        CreateChatRequest,
        ChatResponse,
        AppendMessageRequest,
        MessageResponse,
        SetTitleRequest
    ))
)]
pub struct ChatsApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chats", post(create_chat).get(list_chats))
        .route("/chats/{id}/messages", get(list_messages).post(append_message))
        .route("/chats/{id}/title", put(set_title))
}

async fn owned_chat(
    state: &AppState,
    caller: &CallerIdentity,
    chat_id: &str,
) -> Result<Chat, ServerError> {
    state
        .store
        .get_chat(caller.user_id(), chat_id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("chat {chat_id} not found")))
}

#[utoipa::path(
    post,
    path = "/v1/chats",
    tag = "chats",
    request_body = CreateChatRequest,
    responses(
        (status = 200, description = "Chat created", body = ChatResponse),
        (status = 400, description = "Bad request"),
        (status = 401, description = "No caller identity"),
    )
)]
pub async fn create_chat(
    State(state): State<Arc<AppState>>,
    caller: CallerIdentity,
    JsonBody(req): JsonBody<CreateChatRequest>,
) -> Result<Json<ChatResponse>, ServerError> {
    req.validate()?;
    let now = Utc::now();
    let chat = Chat {
        id: Uuid::new_v4().to_string(),
        user_id: caller.user_id().to_owned(),
        title: req.title.unwrap_or_default(),
        created_at: now,
        updated_at: now,
    };
    state.store.create_chat(chat.clone()).await?;
    info!(user_id = %chat.user_id, chat_id = %chat.id, "chat created");
    Ok(Json(chat.to_response(None)))
}

#[utoipa::path(
    get,
    path = "/v1/chats",
    tag = "chats",
    responses(
        (status = 200, description = "Caller's chats, newest first", body = Vec<ChatResponse>),
        (status = 401, description = "No caller identity"),
    )
)]
pub async fn list_chats(
    State(state): State<Arc<AppState>>,
    caller: CallerIdentity,
) -> Result<Json<Vec<ChatResponse>>, ServerError> {
    let chats = state.store.list_chats(caller.user_id()).await?;
    Ok(Json(
        chats
            .into_iter()
            .map(|(chat, last_role)| chat.to_response(last_role))
            .collect(),
    ))
}

#[utoipa::path(
    get,
    path = "/v1/chats/{id}/messages",
    tag = "chats",
    params(("id" = String, Path, description = "Chat id")),
    responses(
        (status = 200, description = "Messages in creation order", body = Vec<MessageResponse>),
        (status = 404, description = "No such chat for this caller"),
    )
)]
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    caller: CallerIdentity,
    Path(id): Path<String>,
) -> Result<Json<Vec<MessageResponse>>, ServerError> {
    let chat = owned_chat(&state, &caller, &id).await?;
    let messages = state.store.list_messages(&chat.id).await?;
    Ok(Json(messages.iter().map(ChatMessage::to_response).collect()))
}

#[utoipa::path(
    post,
    path = "/v1/chats/{id}/messages",
    tag = "chats",
    params(("id" = String, Path, description = "Chat id")),
    request_body = AppendMessageRequest,
    responses(
        (status = 200, description = "Message stored", body = MessageResponse),
        (status = 400, description = "System messages cannot be stored"),
        (status = 404, description = "No such chat for this caller"),
    )
)]
pub async fn append_message(
    State(state): State<Arc<AppState>>,
    caller: CallerIdentity,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<AppendMessageRequest>,
) -> Result<Json<MessageResponse>, ServerError> {
    req.validate()?;
    if req.role == Role::System {
        return Err(ServerError::BadRequest(
            "only user and assistant messages can be stored".into(),
        ));
    }
    let chat = owned_chat(&state, &caller, &id).await?;

    let message = ChatMessage {
        id: Uuid::new_v4().to_string(),
        chat_id: chat.id,
        role: req.role,
        content: req.content,
        attachments: req.attachments,
        grounding_metadata: req.grounding_metadata.map(|m| m.sanitized()),
        created_at: Utc::now(),
    };
    state.store.append_message(message.clone()).await?;
    info!(
        user_id = %caller.user_id(),
        chat_id = %message.chat_id,
        role = %message.role,
        "message appended"
    );
    Ok(Json(message.to_response()))
}

#[utoipa::path(
    put,
    path = "/v1/chats/{id}/title",
    tag = "chats",
    params(("id" = String, Path, description = "Chat id")),
    request_body = SetTitleRequest,
    responses(
        (status = 204, description = "Title updated"),
        (status = 400, description = "Empty or overlong title"),
        (status = 404, description = "No such chat for this caller"),
    )
)]
pub async fn set_title(
    State(state): State<Arc<AppState>>,
    caller: CallerIdentity,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<SetTitleRequest>,
) -> Result<StatusCode, ServerError> {
    req.validate()?;
    let chat = owned_chat(&state, &caller, &id).await?;
    state.store.set_title(&chat.id, &req.title).await?;
    Ok(StatusCode::NO_CONTENT)
}
