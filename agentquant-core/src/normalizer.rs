use crate::model::{AgentChatRequest, ChatMessage, ChatRequestBody, UiMessage};
use unicode_normalization::UnicodeNormalization;

fn clean_text(s: &str) -> String {
    // Unicode NFC normalization + BOM strip + CRLF -> LF + trim
    let mut t = s.nfc().collect::<String>();
    if t.starts_with('\u{FEFF}') {
        t.remove(0);
    }
    if t.contains("\r\n") {
        t = t.replace("\r\n", "\n");
    }
    t.trim().to_string()
}

/// Text the agent should see for one browser message: the first `text`
/// part, else the legacy `content` string, else empty.
pub fn primary_text(msg: &UiMessage) -> &str {
    msg.parts
        .iter()
        .find(|p| p.is_text())
        .and_then(|p| p.text.as_deref())
        .or(msg.content.as_deref())
        .unwrap_or("")
}

pub fn to_agent_messages(messages: &[UiMessage]) -> Vec<ChatMessage> {
    messages
        .iter()
        .map(|m| ChatMessage {
            role: m.role,
            content: clean_text(primary_text(m)),
        })
        .collect()
}

pub fn normalize_chat(body: &ChatRequestBody) -> AgentChatRequest {
    AgentChatRequest::streaming(to_agent_messages(&body.messages))
}
