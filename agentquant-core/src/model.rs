use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message as the agent receives it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// A piece of a browser message. Only `text` parts carry text; others
/// (tool parts, data parts) are kept opaque.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UiPart {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl UiPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".into(),
            text: Some(text.into()),
        }
    }

    pub fn is_text(&self) -> bool {
        self.kind == "text"
    }
}

/// Browser-side chat message.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UiMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub parts: Vec<UiPart>,
    /// Older clients send a flat string instead of parts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl UiMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: None,
            role: Role::User,
            parts: vec![UiPart::text(text)],
            content: None,
        }
    }
}

/// `POST /api/chat` body.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatRequestBody {
    pub messages: Vec<UiMessage>,
}

/// Body sent to `POST {agent}/v1/chat/completions`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AgentChatRequest {
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
}

impl AgentChatRequest {
    pub fn streaming(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            stream: true,
        }
    }
}
