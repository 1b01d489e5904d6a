//! Chat listener: the single session loop that owns the chat platform client.
//!
//! Inbound messages are forwarded to the workflow trigger and acknowledged; bridged
//! replies from the callback server are delivered in between. Everything runs on
//! one task, so the platform client never sees two sends at once.

use crate::bridge::{self, BridgeQueue};
use crate::channels::{ChatMessage, ChatPlatform};
use crate::config::ReplyConfig;
use crate::forwarder::{ForwardError, Forwarder, TriggerResponse};
use std::sync::Arc;
use tokio::sync::mpsc;

const ECHO_PREFIX: &str = "Отправлено в n8n. Ответ: ";

/// Session state: platform client, forwarder and acknowledgement texts.
pub struct Session {
    platform: Arc<dyn ChatPlatform>,
    forwarder: Forwarder,
    replies: ReplyConfig,
    echo_response: bool,
}

impl Session {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        forwarder: Forwarder,
        replies: ReplyConfig,
        echo_response: bool,
    ) -> Self {
        Self {
            platform,
            forwarder,
            replies,
            echo_response,
        }
    }

    /// Acknowledgement text for a forward result.
    fn ack_text(&self, result: &Result<TriggerResponse, ForwardError>) -> String {
        match result {
            Ok(res) if self.echo_response => format!("{}{}", ECHO_PREFIX, res.body),
            Ok(_) => self.replies.processing.clone(),
            Err(e) => format!("{}: {}", self.replies.forward_error_prefix, e),
        }
    }

    /// Forward one inbound message and send exactly one acknowledgement.
    /// Empty messages are ignored. The loop waits for the trigger to answer before
    /// handling anything else.
    pub async fn handle_message(&self, msg: ChatMessage) {
        if msg.is_empty() {
            return;
        }
        let result = self.forwarder.forward(&msg).await;
        match &result {
            Ok(res) => log::info!(
                "listener: forwarded chat {} to workflow (status {})",
                msg.chat_id,
                res.status
            ),
            Err(e) => log::warn!("listener: forwarding chat {} failed: {}", msg.chat_id, e),
        }
        let ack = self.ack_text(&result);
        if let Err(e) = self.platform.send_message(&msg.chat_id, &ack).await {
            log::warn!(
                "listener: acknowledgement to {} chat {} failed: {}",
                self.platform.id(),
                msg.chat_id,
                e
            );
        }
    }

    /// Run until both the inbound stream and the bridge are closed. Inbound events
    /// and bridged sends are interleaved; each is fully handled before the next.
    pub async fn run(self, mut inbound_rx: mpsc::Receiver<ChatMessage>, mut queue: BridgeQueue) {
        let mut inbound_open = true;
        let mut bridge_open = true;
        while inbound_open || bridge_open {
            tokio::select! {
                msg = inbound_rx.recv(), if inbound_open => match msg {
                    Some(msg) => self.handle_message(msg).await,
                    None => {
                        log::info!("listener: inbound stream closed");
                        inbound_open = false;
                    }
                },
                task = queue.recv(), if bridge_open => match task {
                    Some(task) => bridge::run_task(self.platform.as_ref(), task).await,
                    None => {
                        log::debug!("listener: delivery bridge closed");
                        bridge_open = false;
                    }
                },
            }
        }
        log::info!("listener: session loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::PlatformError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ChatPlatform for Recorder {
        fn id(&self) -> &str {
            "test"
        }

        async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), PlatformError> {
            self.sent
                .lock()
                .expect("lock")
                .push((chat_id.to_string(), text.to_string()));
            Ok(())
        }
    }

    fn free_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
        listener.local_addr().expect("local_addr").port()
    }

    fn session(platform: Arc<Recorder>, echo: bool) -> Session {
        let url = format!("http://127.0.0.1:{}/webhook/x", free_port());
        Session::new(platform, Forwarder::new(url), ReplyConfig::default(), echo)
    }

    #[test]
    fn ack_texts() {
        let s = session(Arc::new(Recorder::default()), false);
        let ok = Ok(TriggerResponse {
            status: 200,
            body: "accepted".to_string(),
        });
        assert_eq!(s.ack_text(&ok), "Секунду, печатаю...");
        let echo = session(Arc::new(Recorder::default()), true);
        assert_eq!(echo.ack_text(&ok), "Отправлено в n8n. Ответ: accepted");
    }

    #[tokio::test]
    async fn transport_failure_sends_error_ack_only() {
        let platform = Arc::new(Recorder::default());
        let s = session(platform.clone(), false);
        s.handle_message(ChatMessage::new("42", "hello")).await;
        let sent = platform.sent.lock().expect("lock").clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "42");
        assert!(sent[0].1.starts_with("Ошибка при отправке в n8n: "));
    }

    #[tokio::test]
    async fn empty_message_is_ignored() {
        let platform = Arc::new(Recorder::default());
        let s = session(platform.clone(), false);
        s.handle_message(ChatMessage::new("42", "")).await;
        assert!(platform.sent.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn whitespace_message_is_still_acknowledged() {
        let platform = Arc::new(Recorder::default());
        let s = session(platform.clone(), false);
        s.handle_message(ChatMessage::new("42", " ")).await;
        assert_eq!(platform.sent.lock().expect("lock").len(), 1);
    }

    #[tokio::test]
    async fn run_delivers_bridged_tasks_and_stops_when_sources_close() {
        let platform = Arc::new(Recorder::default());
        let s = session(platform.clone(), false);
        let (inbound_tx, inbound_rx) = mpsc::channel(8);
        let (handle, queue) = bridge::channel();
        let first = handle.submit("1", "one").expect("submit");
        let second = handle.submit("2", "two").expect("submit");
        drop(inbound_tx);
        drop(handle);
        s.run(inbound_rx, queue).await;
        assert_eq!(first.wait().await.expect("ran"), Ok(()));
        assert_eq!(second.wait().await.expect("ran"), Ok(()));
        assert_eq!(
            platform.sent.lock().expect("lock").as_slice(),
            &[
                ("1".to_string(), "one".to_string()),
                ("2".to_string(), "two".to_string())
            ]
        );
    }
}
