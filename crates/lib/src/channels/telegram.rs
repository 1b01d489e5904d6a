//! Telegram channel: long-poll getUpdates and sendMessage via Bot API.

use crate::channels::inbound::ChatMessage;
use crate::channels::platform::{ChatPlatform, PlatformError};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const LONG_POLL_TIMEOUT: u64 = 30;
const POLL_ERROR_BACKOFF_SECS: u64 = 2;

#[derive(Debug, Deserialize)]
struct GetUpdatesResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<TelegramUpdate>,
}

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Telegram update payload (getUpdates result item).
#[derive(Debug, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramMessage {
    pub chat: TelegramChat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

impl TelegramUpdate {
    /// The text message carried by this update, if any. Non-message updates and
    /// messages without text (stickers, photos) yield None, as does empty text.
    pub fn into_chat_message(self) -> Option<ChatMessage> {
        let msg = self.message?;
        let text = msg.text?;
        let inbound = ChatMessage::new(msg.chat.id.to_string(), text);
        if inbound.is_empty() {
            None
        } else {
            Some(inbound)
        }
    }
}

/// Telegram connector: long-polls for updates and sends messages via sendMessage.
pub struct TelegramChannel {
    id: String,
    token: Option<String>,
    api_base: String,
    running: AtomicBool,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(token: Option<String>, api_base: Option<String>) -> Self {
        let api_base = api_base
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| TELEGRAM_API_BASE.to_string());
        Self {
            id: "telegram".to_string(),
            token,
            api_base,
            running: AtomicBool::new(false),
            client: reqwest::Client::new(),
        }
    }

    fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the getUpdates loop after the current poll returns.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn method_url(&self, method: &str) -> Result<String, PlatformError> {
        let token = self.token.as_ref().ok_or(PlatformError::NotConfigured)?;
        Ok(format!("{}/bot{}/{}", self.api_base, token, method))
    }

    /// Start the getUpdates long-poll loop and push text messages to the session loop.
    /// The loop only reads; all sends happen in the session loop.
    pub fn start_inbound(self: Arc<Self>, inbound_tx: mpsc::Sender<ChatMessage>) -> JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        log::info!("telegram channel: starting getUpdates long-poll loop");
        tokio::spawn(async move {
            run_get_updates_loop(self, inbound_tx).await;
        })
    }

    /// Call Telegram getUpdates (long poll). Returns (updates, next_offset).
    async fn get_updates(
        &self,
        offset: Option<i64>,
    ) -> Result<(Vec<TelegramUpdate>, Option<i64>), PlatformError> {
        let url = format!(
            "{}?timeout={}",
            self.method_url("getUpdates")?,
            LONG_POLL_TIMEOUT
        );
        let url = if let Some(off) = offset {
            format!("{}&offset={}", url, off)
        } else {
            url
        };
        let res = self.client.get(&url).send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(PlatformError::Api(format!(
                "getUpdates failed: {} {}",
                status, body
            )));
        }
        let data: GetUpdatesResponse = res.json().await?;
        if !data.ok {
            return Err(PlatformError::Api("getUpdates returned ok: false".to_string()));
        }
        let next_offset = data
            .result
            .iter()
            .map(|u| u.update_id)
            .max()
            .map(|id| id + 1);
        Ok((data.result, next_offset))
    }

    /// Send a text message to a chat via sendMessage API.
    pub async fn send_text(&self, chat_id: &str, text: &str) -> Result<(), PlatformError> {
        let url = self.method_url("sendMessage")?;
        let body = serde_json::json!({ "chat_id": chat_id, "text": text });
        let res = self.client.post(&url).json(&body).send().await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(PlatformError::Api(format!(
                "sendMessage failed: {} {}",
                status, body
            )));
        }
        let data: SendMessageResponse = res.json().await?;
        if !data.ok {
            return Err(PlatformError::Api(format!(
                "sendMessage returned ok: false ({})",
                data.description.unwrap_or_default()
            )));
        }
        Ok(())
    }
}

async fn run_get_updates_loop(channel: Arc<TelegramChannel>, inbound_tx: mpsc::Sender<ChatMessage>) {
    let mut offset: Option<i64> = None;
    while channel.running() {
        match channel.get_updates(offset).await {
            Ok((updates, next)) => {
                if next.is_some() {
                    offset = next;
                }
                for inbound in updates.into_iter().filter_map(TelegramUpdate::into_chat_message) {
                    if inbound_tx.send(inbound).await.is_err() {
                        log::debug!("telegram: inbound channel closed, stopping loop");
                        return;
                    }
                }
            }
            Err(e) => {
                log::warn!("telegram getUpdates error: {}", e);
                tokio::time::sleep(tokio::time::Duration::from_secs(POLL_ERROR_BACKOFF_SECS)).await;
            }
        }
    }
    log::info!("telegram channel: getUpdates loop stopped");
}

#[async_trait]
impl ChatPlatform for TelegramChannel {
    fn id(&self) -> &str {
        &self.id
    }

    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), PlatformError> {
        self.send_text(chat_id, text).await
    }
}
