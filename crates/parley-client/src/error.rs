use thiserror::Error;

use crate::consumer::ConsumeError;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The weekly message budget is used up.
    #[error("{message}")]
    QuotaExceeded { message: String },

    #[error("reply stream failed: {0}")]
    Stream(#[from] ConsumeError),

    #[error("invalid input: {0}")]
    Invalid(String),

    #[error("preference storage failed: {0}")]
    Storage(String),
}
