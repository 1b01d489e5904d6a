//! Outbound side of the chat platform.

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("telegram bot token not configured")]
    NotConfigured,
    #[error("telegram request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("telegram api error: {0}")]
    Api(String),
}

/// Sends text to a chat. Implementations are not assumed to tolerate concurrent use;
/// the session loop is the only caller.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Platform id (e.g. "telegram"), used in logs.
    fn id(&self) -> &str;

    /// Send a text message to a chat (e.g. Telegram chat_id).
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), PlatformError>;
}
