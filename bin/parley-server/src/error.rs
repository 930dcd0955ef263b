//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors are automatically converted
//! to a JSON-body HTTP response with an appropriate status code.
//!
//! **Security note:** Internal errors (Provider, Database) are logged with
//! full detail but only a generic message is returned to the caller so that
//! API keys, SQL, or provider internals never leak to clients. Error bodies
//! may sit next to conversation content, so every error response is marked
//! uncacheable.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use parley_types::UNSUPPORTED_MODEL_MESSAGE;
use serde_json::json;
use strum::IntoStaticStr;
use thiserror::Error;
use tracing::error;

use crate::gateway::GatewayError;
use crate::limiter::RateLimitError;

pub const NO_STORE: &str = "no-store, no-cache, must-revalidate";

/// All errors that can occur in the parley-server request lifecycle.
#[derive(Debug, Error, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ServerError {
    /// No caller identity was supplied by the authentication layer.
    #[error("unauthorized")]
    Unauthorized,

    /// The caller sent an invalid or malformed request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The caller referenced a resource that does not exist (or is not theirs).
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller used up this week's message budget.
    #[error("weekly message limit of {limit} reached")]
    QuotaExceeded { limit: i64 },

    /// The model provider failed before streaming started.
    #[error("provider error: {0}")]
    Provider(GatewayError),

    /// Propagated from the SQLite store.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// An unclassified internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            ServerError::Provider(_) | ServerError::Database(_) | ServerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable code placed next to the message.
    pub fn code(&self) -> &'static str {
        self.into()
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let client_message = match &self {
            // Client-facing errors: expose the message directly.
            ServerError::Unauthorized => "Unauthorized".to_owned(),
            ServerError::BadRequest(m) | ServerError::NotFound(m) => m.clone(),
            ServerError::QuotaExceeded { limit } => format!(
                "Weekly message limit of {limit} reached. Your quota resets next Monday."
            ),

            // Internal errors: log the full detail, return a generic message.
            ServerError::Provider(e) => {
                error!(error = %e, "model provider error");
                "failed to generate a response".to_owned()
            }
            ServerError::Database(e) => {
                error!(error = %e, "database error");
                "internal server error".to_owned()
            }
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                "internal server error".to_owned()
            }
        };

        let mut response = (
            status,
            Json(json!({ "error": client_message, "code": self.code() })),
        )
            .into_response();
        let headers = response.headers_mut();
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(NO_STORE));
        headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
        headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
        response
    }
}

impl From<GatewayError> for ServerError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::UnsupportedModel(_) => {
                ServerError::BadRequest(UNSUPPORTED_MODEL_MESSAGE.to_owned())
            }
            other => ServerError::Provider(other),
        }
    }
}

impl From<RateLimitError> for ServerError {
    fn from(e: RateLimitError) -> Self {
        match e {
            RateLimitError::QuotaExceeded { limit } => ServerError::QuotaExceeded { limit },
            RateLimitError::Store(e) => ServerError::Database(e),
        }
    }
}

impl From<JsonRejection> for ServerError {
    fn from(e: JsonRejection) -> Self {
        ServerError::BadRequest(e.body_text())
    }
}

impl From<validator::ValidationErrors> for ServerError {
    fn from(e: validator::ValidationErrors) -> Self {
        ServerError::BadRequest(e.to_string())
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(e: anyhow::Error) -> Self {
        // Log the full error chain before discarding it so that diagnostic
        // detail is preserved in the server logs.
        error!(error = ?e, "converting anyhow error to ServerError::Internal");
        ServerError::Internal(e.to_string())
    }
}
