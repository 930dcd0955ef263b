use std::future::Future;
use std::str::FromStr;

use chrono::Utc;
use parley_types::Role;

use crate::entities::dao::{Chat, ChatMessage};
use crate::entities::{SqlStore, format_timestamp, parse_timestamp};

/// Chats and their append-only message lists.
pub trait ChatStore: Send + Sync + 'static {
    fn create_chat(&self, chat: Chat) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    /// The chat, only if it belongs to `user_id`.
    fn get_chat(
        &self,
        user_id: &str,
        chat_id: &str,
    ) -> impl Future<Output = Result<Option<Chat>, sqlx::Error>> + Send;

    /// The user's chats, newest first, each with the role of its last message.
    fn list_chats(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Vec<(Chat, Option<Role>)>, sqlx::Error>> + Send;

    fn set_title(
        &self,
        chat_id: &str,
        title: &str,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    fn append_message(
        &self,
        msg: ChatMessage,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    /// Messages in creation order.
    fn list_messages(
        &self,
        chat_id: &str,
    ) -> impl Future<Output = Result<Vec<ChatMessage>, sqlx::Error>> + Send;
}

type ChatRow = (String, String, String, String, String);
type MessageRow = (String, String, String, String, Option<String>, Option<String>, String);

fn to_chat((id, user_id, title, created_at, updated_at): ChatRow) -> Chat {
    Chat {
        id,
        user_id,
        title,
        created_at: parse_timestamp(&created_at, "chats.created_at"),
        updated_at: parse_timestamp(&updated_at, "chats.updated_at"),
    }
}

fn to_message(
    (id, chat_id, role, content, attachments, grounding, created_at): MessageRow,
) -> ChatMessage {
    let role = Role::from_str(&role).unwrap_or_else(|_| {
        tracing::warn!(raw = %role, message_id = %id, "unknown stored role; treating as user");
        Role::User
    });
    let attachments = attachments
        .and_then(|raw| {
            serde_json::from_str(&raw)
                .inspect_err(|e| tracing::warn!(message_id = %id, error = %e, "dropping unreadable attachments"))
                .ok()
        })
        .unwrap_or_default();
    let grounding_metadata = grounding.and_then(|raw| {
        serde_json::from_str(&raw)
            .inspect_err(|e| tracing::warn!(message_id = %id, error = %e, "dropping unreadable grounding metadata"))
            .ok()
    });
    ChatMessage {
        id,
        chat_id,
        role,
        content,
        attachments,
        grounding_metadata,
        created_at: parse_timestamp(&created_at, "chat_messages.created_at"),
    }
}

impl ChatStore for SqlStore {
    async fn create_chat(&self, chat: Chat) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO chats (id, user_id, title, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&chat.id)
        .bind(&chat.user_id)
        .bind(&chat.title)
        .bind(format_timestamp(&chat.created_at))
        .bind(format_timestamp(&chat.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_chat(&self, user_id: &str, chat_id: &str) -> Result<Option<Chat>, sqlx::Error> {
        let row: Option<ChatRow> = sqlx::query_as(
            "SELECT id, user_id, title, created_at, updated_at \
             FROM chats WHERE id = ?1 AND user_id = ?2",
        )
        .bind(chat_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(to_chat))
    }

    async fn list_chats(&self, user_id: &str) -> Result<Vec<(Chat, Option<Role>)>, sqlx::Error> {
        let rows: Vec<(String, String, String, String, String, Option<String>)> = sqlx::query_as(
            "SELECT c.id, c.user_id, c.title, c.created_at, c.updated_at, \
                    (SELECT m.role FROM chat_messages m WHERE m.chat_id = c.id \
                     ORDER BY m.created_at DESC, m.rowid DESC LIMIT 1) \
             FROM chats c WHERE c.user_id = ?1 ORDER BY c.created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, user_id, title, created_at, updated_at, last_role)| {
                let chat = to_chat((id, user_id, title, created_at, updated_at));
                let last_role = last_role.and_then(|r| Role::from_str(&r).ok());
                (chat, last_role)
            })
            .collect())
    }

    async fn set_title(&self, chat_id: &str, title: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE chats SET title = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(title)
            .bind(format_timestamp(&Utc::now()))
            .bind(chat_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn append_message(&self, msg: ChatMessage) -> Result<(), sqlx::Error> {
        let attachments = if msg.attachments.is_empty() {
            None
        } else {
            serde_json::to_string(&msg.attachments).ok()
        };
        let grounding = msg
            .grounding_metadata
            .as_ref()
            .and_then(|m| serde_json::to_string(m).ok());
        let created_at = format_timestamp(&msg.created_at);

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO chat_messages \
                (id, chat_id, role, content, attachments, grounding_metadata, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&msg.id)
        .bind(&msg.chat_id)
        .bind(msg.role.as_ref())
        .bind(&msg.content)
        .bind(attachments)
        .bind(grounding)
        .bind(&created_at)
        .execute(&mut *tx)
        .await?;
        sqlx::query("UPDATE chats SET updated_at = ?1 WHERE id = ?2")
            .bind(&created_at)
            .bind(&msg.chat_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_messages(&self, chat_id: &str) -> Result<Vec<ChatMessage>, sqlx::Error> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT id, chat_id, role, content, attachments, grounding_metadata, created_at \
             FROM chat_messages WHERE chat_id = ?1 ORDER BY created_at ASC, rowid ASC",
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(to_message).collect())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use parley_types::{GroundingMetadata, WebSource};
    use uuid::Uuid;

    fn chat(user: &str) -> Chat {
        let now = Utc::now();
        Chat {
            id: Uuid::new_v4().to_string(),
            user_id: user.into(),
            title: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn message(chat_id: &str, role: Role, content: &str) -> ChatMessage {
        ChatMessage {
            id: Uuid::new_v4().to_string(),
            chat_id: chat_id.into(),
            role,
            content: content.into(),
            attachments: Vec::new(),
            grounding_metadata: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn messages_keep_order_and_metadata() {
        let store = SqlStore::connect("sqlite::memory:").await.unwrap();
        let c = chat("alice");
        store.create_chat(c.clone()).await.unwrap();

        store.append_message(message(&c.id, Role::User, "hi")).await.unwrap();
        let mut reply = message(&c.id, Role::Assistant, "hello");
        reply.grounding_metadata = Some(GroundingMetadata {
            grounding_chunks: vec![parley_types::GroundingChunk {
                web: Some(WebSource {
                    uri: "https://example.com".into(),
                    title: None,
                }),
            }],
            ..Default::default()
        });
        store.append_message(reply.clone()).await.unwrap();

        let messages = store.list_messages(&c.id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "hi");
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].grounding_metadata, reply.grounding_metadata);
    }

    #[tokio::test]
    async fn chats_are_scoped_to_their_owner() {
        let store = SqlStore::connect("sqlite::memory:").await.unwrap();
        let c = chat("alice");
        store.create_chat(c.clone()).await.unwrap();

        assert!(store.get_chat("alice", &c.id).await.unwrap().is_some());
        assert!(store.get_chat("mallory", &c.id).await.unwrap().is_none());
        assert!(store.list_chats("mallory").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_reports_last_message_role() {
        let store = SqlStore::connect("sqlite::memory:").await.unwrap();
        let c = chat("alice");
        store.create_chat(c.clone()).await.unwrap();

        let (_, role) = store.list_chats("alice").await.unwrap().remove(0);
        assert_eq!(role, None);

        store.append_message(message(&c.id, Role::User, "q")).await.unwrap();
        let (_, role) = store.list_chats("alice").await.unwrap().remove(0);
        assert_eq!(role, Some(Role::User));

        store.append_message(message(&c.id, Role::Assistant, "a")).await.unwrap();
        let (_, role) = store.list_chats("alice").await.unwrap().remove(0);
        assert_eq!(role, Some(Role::Assistant));

        store.set_title(&c.id, "Greeting").await.unwrap();
        let (chat, _) = store.list_chats("alice").await.unwrap().remove(0);
        assert_eq!(chat.title, "Greeting");
    }
}
