//! Weekly quota endpoints.
//!
//! `GET` reports, `POST` reserves one message (429 once the limit is hit),
//! `DELETE` gives one back after a failed send.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::middleware::CallerIdentity;
use crate::schemas::v1::rate_limit::{MessageCountResponse, RateLimitStatus, UsageHistoryEntry};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(get_status, increment, decrement, history),
    components(schemas(RateLimitStatus, MessageCountResponse, UsageHistoryEntry))
)]
pub struct RateLimitApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/rate-limit",
            get(get_status).post(increment).delete(decrement),
        )
        .route("/rate-limit/history", get(history))
}

#[utoipa::path(
    get,
    path = "/v1/rate-limit",
    tag = "rate-limit",
    responses(
        (status = 200, description = "Quota for the current week", body = RateLimitStatus),
        (status = 401, description = "No caller identity"),
    )
)]
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    caller: CallerIdentity,
) -> Result<Json<RateLimitStatus>, ServerError> {
    let admission = state.limiter.check_admission(caller.user_id()).await?;
    Ok(Json(admission.into()))
}

#[utoipa::path(
    post,
    path = "/v1/rate-limit",
    tag = "rate-limit",
    responses(
        (status = 200, description = "Message counted", body = MessageCountResponse),
        (status = 429, description = "Weekly limit reached"),
    )
)]
pub async fn increment(
    State(state): State<Arc<AppState>>,
    caller: CallerIdentity,
) -> Result<Json<MessageCountResponse>, ServerError> {
    let message_count = state.limiter.try_increment(caller.user_id()).await?;
    Ok(Json(MessageCountResponse { message_count }))
}

#[utoipa::path(
    delete,
    path = "/v1/rate-limit",
    tag = "rate-limit",
    responses(
        (status = 200, description = "Message given back", body = MessageCountResponse),
    )
)]
pub async fn decrement(
    State(state): State<Arc<AppState>>,
    caller: CallerIdentity,
) -> Result<Json<MessageCountResponse>, ServerError> {
    let message_count = state.limiter.decrement(caller.user_id()).await?;
    Ok(Json(MessageCountResponse { message_count }))
}

#[utoipa::path(
    get,
    path = "/v1/rate-limit/history",
    tag = "rate-limit",
    responses(
        (status = 200, description = "Up to ten weeks, most recent first", body = Vec<UsageHistoryEntry>),
    )
)]
pub async fn history(
    State(state): State<Arc<AppState>>,
    caller: CallerIdentity,
) -> Result<Json<Vec<UsageHistoryEntry>>, ServerError> {
    let records = state.limiter.history(caller.user_id()).await?;
    Ok(Json(records.into_iter().map(Into::into).collect()))
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use axum::http::{Method, StatusCode};

    use crate::gateway::fake::ScriptedGateway;
    use crate::routes::test_support::{USER, app_with, send};

    #[tokio::test]
    async fn sixteenth_message_is_rejected() {
        let (app, _) = app_with(Arc::new(ScriptedGateway::new(vec![]))).await;

        for n in 1..=15 {
            let status = send(&app, Method::GET, "/v1/rate-limit", Some(USER), None).await.json();
            assert_eq!(status["canSendMessage"], true);
            assert_eq!(status["remaining"], 16 - n);

            let reply = send(&app, Method::POST, "/v1/rate-limit", Some(USER), None).await;
            assert_eq!(reply.status, StatusCode::OK);
            assert_eq!(reply.json()["messageCount"], n);
        }

        let status = send(&app, Method::GET, "/v1/rate-limit", Some(USER), None).await.json();
        assert_eq!(status["canSendMessage"], false);
        assert_eq!(status["remaining"], 0);
        assert_eq!(status["limit"], 15);
        assert!(status["weekStart"].as_str().is_some());
        assert!(status["resetDate"].as_str().is_some());

        let reply = send(&app, Method::POST, "/v1/rate-limit", Some(USER), None).await;
        assert_eq!(reply.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(reply.json()["code"], "quota_exceeded");

        let status = send(&app, Method::GET, "/v1/rate-limit", Some(USER), None).await.json();
        assert_eq!(status["currentCount"], 15);
    }

    #[tokio::test]
    async fn decrement_gives_a_message_back() {
        let (app, _) = app_with(Arc::new(ScriptedGateway::new(vec![]))).await;

        send(&app, Method::POST, "/v1/rate-limit", Some(USER), None).await;
        let reply = send(&app, Method::DELETE, "/v1/rate-limit", Some(USER), None).await;
        assert_eq!(reply.json()["messageCount"], 0);
        let reply = send(&app, Method::DELETE, "/v1/rate-limit", Some(USER), None).await;
        assert_eq!(reply.json()["messageCount"], 0);

        let history = send(&app, Method::GET, "/v1/rate-limit/history", Some(USER), None)
            .await
            .json();
        assert_eq!(history.as_array().unwrap().len(), 1);
        assert_eq!(history[0]["count"], 0);
    }

    #[tokio::test]
    async fn quota_is_per_user() {
        let (app, state) = app_with(Arc::new(ScriptedGateway::new(vec![]))).await;
        for _ in 0..state.limiter.limit() {
            send(&app, Method::POST, "/v1/rate-limit", Some(USER), None).await;
        }
        let reply = send(&app, Method::POST, "/v1/rate-limit", Some("bob"), None).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.json()["messageCount"], 1);
    }
}
