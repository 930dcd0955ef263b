pub mod chat;
pub mod chats;
pub mod preferences;
pub mod rate_limit;

use std::sync::Arc;

use axum::Router;
use utoipa::OpenApi;

use crate::state::AppState;

/// Routes nested under `/v1`.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(chat::router())
        .merge(chats::router())
        .merge(rate_limit::router())
        .merge(preferences::router())
}

#[derive(OpenApi)]
#[openapi()]
pub struct V1Api;

pub fn api_docs() -> utoipa::openapi::OpenApi {
    let mut doc = V1Api::openapi();
    doc.merge(chat::ChatApi::openapi());
    doc.merge(chats::ChatsApi::openapi());
    doc.merge(rate_limit::RateLimitApi::openapi());
    doc.merge(preferences::PreferencesApi::openapi());
    doc
}
