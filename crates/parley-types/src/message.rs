use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Author of a conversation turn.
///
/// Only `User` and `Assistant` are ever persisted; `System` exists so that
/// callers can send prefix instructions along with the history.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One turn of conversation history as submitted to the chat endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: Role,
    pub content: String,
}

impl WireMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// File reference attached to a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    pub name: String,
    #[serde(rename = "type")]
    pub content_type: String,
    pub size: u64,
}

#[cfg(test)]
mod test {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn role_uses_lowercase_names() {
        assert_eq!(Role::Assistant.to_string(), "assistant");
        assert_eq!(Role::from_str("user").ok(), Some(Role::User));
        assert!(Role::from_str("model").is_err());

        let json = serde_json::to_string(&WireMessage::system("be brief")).unwrap();
        assert_eq!(json, r#"{"role":"system","content":"be brief"}"#);
    }

    #[test]
    fn attachment_serializes_type_field() {
        let attachment = Attachment {
            url: "https://files.example/a.png".into(),
            name: "a.png".into(),
            content_type: "image/png".into(),
            size: 42,
        };
        let value = serde_json::to_value(&attachment).unwrap();
        assert_eq!(value["type"], "image/png");
    }
}
