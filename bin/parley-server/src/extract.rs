//! Request extractors that reject with [`ServerError`].

use axum::extract::FromRequest;

use crate::error::ServerError;

/// `axum::Json` for request bodies. A body that is not valid JSON, or does
/// not match `T`, is a 400 with the usual `{error, code}` payload instead of
/// axum's plain-text 422.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ServerError))]
pub struct JsonBody<T>(pub T);
