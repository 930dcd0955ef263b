use chrono::{DateTime, Utc};
use parley_types::{Attachment, GroundingMetadata, Role};

/// A row in the `chats` table.
#[derive(Debug, Clone)]
pub struct Chat {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row in the `chat_messages` table.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: String,
    pub chat_id: String,
    /// Only `User` and `Assistant` are stored.
    pub role: Role,
    pub content: String,
    pub attachments: Vec<Attachment>,
    pub grounding_metadata: Option<GroundingMetadata>,
    pub created_at: DateTime<Utc>,
}
