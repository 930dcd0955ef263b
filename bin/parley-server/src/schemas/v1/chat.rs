use parley_types::{Role, WireMessage};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Upper bound on the number of turns forwarded to the provider.
pub const MAX_HISTORY_MESSAGES: u64 = 200;

/// A single turn of the conversation sent for generation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatTurn {
    /// `"system"`, `"user"` or `"assistant"`.
    #[schema(value_type = String, example = "user")]
    pub role: Role,
    pub content: String,
}

/// Request body for `POST /v1/chat`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// Full conversation history, oldest first.
    #[validate(length(min = 1, max = MAX_HISTORY_MESSAGES))]
    pub messages: Vec<ChatTurn>,
    /// Gemini model id, e.g. `gemini-2.0-flash`.
    #[validate(length(min = 1))]
    pub model: String,
    /// Let the model ground its answer with web search.
    #[serde(default)]
    pub web_search: bool,
}

impl ChatRequest {
    pub fn history(&self) -> Vec<WireMessage> {
        self.messages
            .iter()
            .map(|t| WireMessage::new(t.role, t.content.clone()))
            .collect()
    }
}
