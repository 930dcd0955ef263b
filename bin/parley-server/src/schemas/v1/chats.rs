use parley_types::{Attachment, GroundingMetadata, Role};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::entities::{Chat, ChatMessage};

const MAX_TITLE_CHARS: u64 = 200;

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, Validate)]
pub struct CreateChatRequest {
    #[validate(length(max = MAX_TITLE_CHARS))]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct SetTitleRequest {
    #[validate(length(min = 1, max = MAX_TITLE_CHARS))]
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub id: String,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
    /// The last message is from the user and has no reply yet.
    pub awaiting_response: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AppendMessageRequest {
    /// `"user"` or `"assistant"`.
    #[schema(value_type = String, example = "assistant")]
    pub role: Role,
    pub content: String,
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub id: String,
    pub chat_id: String,
    #[schema(value_type = String)]
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    #[schema(value_type = Vec<Object>)]
    pub attachments: Vec<Attachment>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    #[schema(value_type = Option<Object>)]
    pub grounding_metadata: Option<GroundingMetadata>,
    pub created_at: String,
}

impl Chat {
    pub fn to_response(&self, last_role: Option<Role>) -> ChatResponse {
        ChatResponse {
            id: self.id.clone(),
            title: self.title.clone(),
            created_at: self.created_at.to_rfc3339(),
            updated_at: self.updated_at.to_rfc3339(),
            awaiting_response: last_role == Some(Role::User),
        }
    }
}

impl ChatMessage {
    pub fn to_response(&self) -> MessageResponse {
        MessageResponse {
            id: self.id.clone(),
            chat_id: self.chat_id.clone(),
            role: self.role,
            content: self.content.clone(),
            attachments: self.attachments.clone(),
            grounding_metadata: self.grounding_metadata.clone(),
            created_at: self.created_at.to_rfc3339(),
        }
    }
}
