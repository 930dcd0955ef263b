//! Conversation persistence as seen from the client.

use async_trait::async_trait;
use parley_types::{Attachment, GroundingMetadata, Role};
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// A message to append; the store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounding_metadata: Option<GroundingMetadata>,
}

impl NewMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            attachments: Vec::new(),
            grounding_metadata: None,
        }
    }

    pub fn assistant(content: impl Into<String>, grounding: Option<GroundingMetadata>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            attachments: Vec::new(),
            grounding_metadata: grounding,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    pub id: String,
    pub chat_id: String,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub grounding_metadata: Option<GroundingMetadata>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    pub id: String,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
    pub awaiting_response: bool,
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn create_chat(&self, title: Option<&str>) -> Result<ChatSummary, ClientError>;

    async fn append_message(
        &self,
        chat_id: &str,
        message: NewMessage,
    ) -> Result<StoredMessage, ClientError>;

    async fn set_title(&self, chat_id: &str, title: &str) -> Result<(), ClientError>;

    /// Messages in creation order.
    async fn list_messages(&self, chat_id: &str) -> Result<Vec<StoredMessage>, ClientError>;
}
