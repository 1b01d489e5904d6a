//! Forwarder: hands an inbound chat message to the n8n workflow trigger.
//!
//! One GET per message with `chat_id` and `text` query parameters. The response
//! status and body are returned as-is; the workflow's actual reply comes back later
//! through the callback endpoint, never through this response.

use crate::channels::ChatMessage;

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    /// The trigger could not be reached (connection refused, DNS, reset, ...).
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
}

/// What the trigger endpoint answered. Any HTTP status counts as delivered.
#[derive(Debug, Clone)]
pub struct TriggerResponse {
    pub status: u16,
    pub body: String,
}

/// Client for the workflow trigger URL.
#[derive(Clone)]
pub struct Forwarder {
    trigger_url: String,
    client: reqwest::Client,
}

impl Forwarder {
    pub fn new(trigger_url: impl Into<String>) -> Self {
        Self {
            trigger_url: trigger_url.into(),
            client: reqwest::Client::new(),
        }
    }

    /// GET <trigger_url>?chat_id=..&text=.. — single attempt, no retries.
    pub async fn forward(&self, msg: &ChatMessage) -> Result<TriggerResponse, ForwardError> {
        let res = self
            .client
            .get(&self.trigger_url)
            .query(&[("chat_id", msg.chat_id.as_str()), ("text", msg.text.as_str())])
            .send()
            .await?;
        let status = res.status().as_u16();
        if !res.status().is_success() {
            log::debug!("forwarder: trigger answered {} for chat {}", status, msg.chat_id);
        }
        // A body cut short by the peer is a transport failure, not an empty reply.
        let body = res.text().await?;
        Ok(TriggerResponse { status, body })
    }
}
