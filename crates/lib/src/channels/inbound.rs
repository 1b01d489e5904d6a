//! Inbound message from the chat platform: handed to the session loop for forwarding.

/// A text message received from a chat. The chat id is kept stringified so it can be
/// passed to the workflow trigger and back to the platform unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub chat_id: String,
    pub text: String,
}

impl ChatMessage {
    pub fn new(chat_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            text: text.into(),
        }
    }

    /// True when there is nothing to forward. Whitespace-only text is still a message.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}
