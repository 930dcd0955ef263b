//! Conversion of chat history into a Gemini `generateContent` request.

use parley_types::{Role, WireMessage};
use serde::{Deserialize, Serialize};

/// Role name Gemini uses for assistant turns.
const MODEL_ROLE: &str = "model";
const USER_ROLE: &str = "user";

/// Separator between the system prefix and the first user turn.
const SYSTEM_PREFIX_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Content {
    fn text(role: &str, text: impl Into<String>) -> Self {
        Content {
            role: role.to_owned(),
            parts: vec![Part {
                text: Some(text.into()),
            }],
        }
    }
}

/// Search tool declaration. Gemini 1.x models only understand the legacy
/// retrieval key; newer models use `googleSearch`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Tool {
    #[serde(rename = "googleSearchRetrieval")]
    GoogleSearchRetrieval {},
    #[serde(rename = "googleSearch")]
    GoogleSearch {},
}

impl Tool {
    pub fn search_for_model(model: &str) -> Tool {
        let name = model.strip_prefix("models/").unwrap_or(model);
        if name.starts_with("gemini-1.") || name == "gemini-pro" || name.starts_with("gemini-pro-")
        {
            Tool::GoogleSearchRetrieval {}
        } else {
            Tool::GoogleSearch {}
        }
    }
}

impl GenerateContentRequest {
    pub fn new(history: &[WireMessage], model: &str, web_search: bool) -> Self {
        let tools = if web_search {
            vec![Tool::search_for_model(model)]
        } else {
            Vec::new()
        };
        Self {
            contents: adapt_history(history),
            tools,
        }
    }
}

/// Map chat history onto provider turns.
///
/// System messages never become turns of their own: their text is joined
/// and prepended to the first user turn. Without a user turn it is dropped.
pub fn adapt_history(history: &[WireMessage]) -> Vec<Content> {
    let system_prefix = history
        .iter()
        .filter(|m| m.role == Role::System && !m.content.trim().is_empty())
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join(SYSTEM_PREFIX_SEPARATOR);

    let mut prefix = (!system_prefix.is_empty()).then_some(system_prefix);
    let mut contents = Vec::with_capacity(history.len());

    for message in history {
        match message.role {
            Role::System => {}
            Role::Assistant => contents.push(Content::text(MODEL_ROLE, message.content.clone())),
            Role::User => {
                let text = match prefix.take() {
                    Some(p) => format!("{p}{SYSTEM_PREFIX_SEPARATOR}{}", message.content),
                    None => message.content.clone(),
                };
                contents.push(Content::text(USER_ROLE, text));
            }
        }
    }

    contents
}

#[cfg(test)]
mod test {
    use super::*;

    fn texts(contents: &[Content]) -> Vec<(String, String)> {
        contents
            .iter()
            .map(|c| (c.role.clone(), c.parts[0].text.clone().unwrap_or_default()))
            .collect()
    }

    #[test]
    fn system_text_prefixes_first_user_turn() {
        let history = vec![
            WireMessage::system("Answer in French."),
            WireMessage::user("Hello"),
            WireMessage::assistant("Bonjour"),
            WireMessage::system("Be brief."),
            WireMessage::user("How are you?"),
        ];
        let contents = adapt_history(&history);
        assert_eq!(
            texts(&contents),
            vec![
                ("user".into(), "Answer in French.\n\nBe brief.\n\nHello".into()),
                ("model".into(), "Bonjour".into()),
                ("user".into(), "How are you?".into()),
            ]
        );
    }

    #[test]
    fn system_text_without_user_turn_is_dropped() {
        let history = vec![
            WireMessage::system("Answer in French."),
            WireMessage::assistant("Bonjour"),
        ];
        assert_eq!(texts(&adapt_history(&history)), vec![("model".into(), "Bonjour".into())]);
    }

    #[test]
    fn search_tool_key_depends_on_model_version() {
        let legacy = serde_json::to_value(Tool::search_for_model("gemini-1.5-flash")).unwrap();
        assert_eq!(legacy, serde_json::json!({ "googleSearchRetrieval": {} }));

        let current = serde_json::to_value(Tool::search_for_model("models/gemini-2.0-flash")).unwrap();
        assert_eq!(current, serde_json::json!({ "googleSearch": {} }));
    }

    #[test]
    fn tools_omitted_without_web_search() {
        let request = GenerateContentRequest::new(&[WireMessage::user("hi")], "gemini-2.0-flash", false);
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("tools").is_none());
        assert_eq!(value["contents"][0]["parts"][0]["text"], "hi");
    }
}
