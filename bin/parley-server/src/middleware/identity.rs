//! Caller identity.
//!
//! Authentication happens upstream; the auth layer forwards the user id in a
//! configurable header (`PARLEY_IDENTITY_HEADER`). [`identity_middleware`]
//! lifts it into the request extensions and [`CallerIdentity`] hands it to
//! handlers, rejecting with 401 when it is missing.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use crate::error::ServerError;
use crate::state::AppState;

/// The authenticated user a request acts for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity(pub String);

impl CallerIdentity {
    pub fn user_id(&self) -> &str {
        &self.0
    }
}

pub async fn identity_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let user = req
        .headers()
        .get(state.config.identity_header.as_str())
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned);

    if let Some(user) = user {
        debug!(user_id = %user, "caller identified");
        req.extensions_mut().insert(CallerIdentity(user));
    }
    next.run(req).await
}

impl<S: Send + Sync> FromRequestParts<S> for CallerIdentity {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .ok_or(ServerError::Unauthorized)
    }
}
