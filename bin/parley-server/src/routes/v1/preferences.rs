use std::str::FromStr;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use parley_types::{UNSUPPORTED_MODEL_MESSAGE, is_supported_model};
use tracing::warn;
use utoipa::OpenApi;
use validator::Validate;

use crate::entities::{PreferenceStore, UserPreferences};
use crate::error::ServerError;
use crate::extract::JsonBody;
use crate::middleware::CallerIdentity;
use crate::schemas::v1::preferences::{Preferences, Theme};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_preferences, put_preferences), components(schemas(Preferences, Theme)))]
pub struct PreferencesApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/preferences", get(get_preferences).put(put_preferences))
}

/// Stored preferences, or the defaults when none were saved yet.
#[utoipa::path(
    get,
    path = "/v1/preferences",
    tag = "preferences",
    responses((status = 200, description = "Current preferences", body = Preferences))
)]
pub async fn get_preferences(
    State(state): State<Arc<AppState>>,
    caller: CallerIdentity,
) -> Result<Json<Preferences>, ServerError> {
    let Some(stored) = state.store.get_preferences(caller.user_id()).await? else {
        return Ok(Json(Preferences::default()));
    };
    let theme = Theme::from_str(&stored.theme).unwrap_or_else(|_| {
        warn!(user_id = %caller.user_id(), theme = %stored.theme, "unknown stored theme");
        Theme::default()
    });
    Ok(Json(Preferences {
        model: stored.model,
        theme,
    }))
}

#[utoipa::path(
    put,
    path = "/v1/preferences",
    tag = "preferences",
    request_body = Preferences,
    responses(
        (status = 200, description = "Preferences saved", body = Preferences),
        (status = 400, description = "Unsupported model"),
    )
)]
pub async fn put_preferences(
    State(state): State<Arc<AppState>>,
    caller: CallerIdentity,
    JsonBody(req): JsonBody<Preferences>,
) -> Result<Json<Preferences>, ServerError> {
    req.validate()?;
    if !is_supported_model(&req.model) {
        return Err(ServerError::BadRequest(UNSUPPORTED_MODEL_MESSAGE.to_owned()));
    }
    state
        .store
        .put_preferences(UserPreferences {
            user_id: caller.user_id().to_owned(),
            model: req.model.clone(),
            theme: req.theme.as_ref().to_owned(),
            updated_at: Utc::now(),
        })
        .await?;
    Ok(Json(req))
}
