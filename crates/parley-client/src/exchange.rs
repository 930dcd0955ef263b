use parley_types::{Role, WireMessage};
use tracing::info;

use crate::consumer::Completion;
use crate::error::ClientError;
use crate::store::{ConversationStore, NewMessage, StoredMessage};
use crate::title::derive_title;

#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeOutcome {
    pub assistant: StoredMessage,
    /// Set when this was the chat's first exchange.
    pub title: Option<String>,
}

/// Persist a finished reply.
///
/// `history` is the conversation as sent for generation. When, system
/// prefixes aside, it holds just the opening user message, the chat also gets
/// its title.
pub async fn finalize_exchange<C>(
    store: &C,
    chat_id: &str,
    history: &[WireMessage],
    completion: Completion,
) -> Result<ExchangeOutcome, ClientError>
where
    C: ConversationStore + ?Sized,
{
    let assistant = store
        .append_message(
            chat_id,
            NewMessage::assistant(completion.text, completion.grounding),
        )
        .await?;

    let turns: Vec<&WireMessage> = history.iter().filter(|m| m.role != Role::System).collect();
    let title = match turns.as_slice() {
        [first] if first.role == Role::User => {
            let title = derive_title(&first.content);
            store.set_title(chat_id, &title).await?;
            info!(chat_id, title = %title, "chat titled");
            Some(title)
        }
        _ => None,
    };

    Ok(ExchangeOutcome { assistant, title })
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use parley_types::{GroundingChunk, GroundingMetadata, WebSource};

    use super::*;
    use crate::store::ChatSummary;

    /// Keeps everything in memory.
    #[derive(Default)]
    struct MemoryConversations {
        messages: Mutex<HashMap<String, Vec<StoredMessage>>>,
        titles: Mutex<HashMap<String, String>>,
    }

    #[async_trait]
    impl ConversationStore for MemoryConversations {
        async fn create_chat(&self, title: Option<&str>) -> Result<ChatSummary, ClientError> {
            let id = format!("chat-{}", self.titles.lock().unwrap().len() + 1);
            self.titles
                .lock()
                .unwrap()
                .insert(id.clone(), title.unwrap_or_default().to_owned());
            Ok(ChatSummary {
                id,
                title: title.unwrap_or_default().to_owned(),
                created_at: String::new(),
                updated_at: String::new(),
                awaiting_response: false,
            })
        }

        async fn append_message(
            &self,
            chat_id: &str,
            message: NewMessage,
        ) -> Result<StoredMessage, ClientError> {
            let mut all = self.messages.lock().unwrap();
            let list = all.entry(chat_id.to_owned()).or_default();
            let stored = StoredMessage {
                id: format!("m{}", list.len() + 1),
                chat_id: chat_id.to_owned(),
                role: message.role,
                content: message.content,
                attachments: message.attachments,
                grounding_metadata: message.grounding_metadata,
                created_at: String::new(),
            };
            list.push(stored.clone());
            Ok(stored)
        }

        async fn set_title(&self, chat_id: &str, title: &str) -> Result<(), ClientError> {
            self.titles
                .lock()
                .unwrap()
                .insert(chat_id.to_owned(), title.to_owned());
            Ok(())
        }

        async fn list_messages(&self, chat_id: &str) -> Result<Vec<StoredMessage>, ClientError> {
            Ok(self
                .messages
                .lock()
                .unwrap()
                .get(chat_id)
                .cloned()
                .unwrap_or_default())
        }
    }

    fn completion() -> Completion {
        Completion {
            text: "Hello".into(),
            grounding: Some(GroundingMetadata {
                grounding_chunks: vec![GroundingChunk {
                    web: Some(WebSource {
                        uri: "https://example.com".into(),
                        title: None,
                    }),
                }],
                ..Default::default()
            }),
        }
    }

    #[tokio::test]
    async fn first_exchange_sets_title() {
        let store = MemoryConversations::default();
        let long = "Explain the borrow checker to me as if I had never written any code";
        let history = vec![WireMessage::user(long)];

        let outcome = finalize_exchange(&store, "c1", &history, completion())
            .await
            .unwrap();

        assert_eq!(outcome.assistant.role, Role::Assistant);
        assert_eq!(outcome.assistant.content, "Hello");
        assert!(outcome.assistant.grounding_metadata.is_some());
        let title = outcome.title.unwrap();
        assert!(title.ends_with("..."));
        assert_eq!(store.titles.lock().unwrap()["c1"], title);
    }

    #[tokio::test]
    async fn later_exchanges_keep_title() {
        let store = MemoryConversations::default();
        let history = vec![
            WireMessage::user("hi"),
            WireMessage::assistant("hello"),
            WireMessage::user("how are you?"),
        ];
        let outcome = finalize_exchange(&store, "c1", &history, completion())
            .await
            .unwrap();
        assert_eq!(outcome.title, None);
        assert!(store.titles.lock().unwrap().is_empty());
        assert_eq!(store.list_messages("c1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn system_prefix_does_not_hide_first_exchange() {
        let store = MemoryConversations::default();
        let history = vec![WireMessage::system("be brief"), WireMessage::user("hi")];
        let outcome = finalize_exchange(&store, "c1", &history, completion())
            .await
            .unwrap();
        assert_eq!(outcome.title.as_deref(), Some("hi"));
    }
}
