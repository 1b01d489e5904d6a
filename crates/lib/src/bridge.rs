//! Delivery bridge: hands outbound sends from callback handlers to the session loop.
//!
//! Callback handlers run on axum's connection tasks, in parallel with each other and
//! with the session loop. They must not drive the chat platform themselves, so they
//! enqueue an [`OutboundSendTask`] through a cloneable [`BridgeHandle`] and return at
//! once. The session loop owns the single [`BridgeQueue`] and executes tasks one at a
//! time, in submission order, between its own inbound events.

use crate::channels::ChatPlatform;
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("delivery bridge closed")]
    Closed,
}

/// Outcome reported through a task's completion signal.
pub type SendOutcome = Result<(), String>;

/// One pending send. Owned by the queue until the session loop claims it, then
/// consumed by [`run_task`].
#[derive(Debug)]
pub struct OutboundSendTask {
    pub chat_id: String,
    pub text: String,
    done: Option<oneshot::Sender<SendOutcome>>,
}

impl OutboundSendTask {
    /// Task with a completion signal; the returned [`Delivery`] resolves when it ran.
    pub fn new(chat_id: impl Into<String>, text: impl Into<String>) -> (Self, Delivery) {
        let (tx, rx) = oneshot::channel();
        let task = Self {
            chat_id: chat_id.into(),
            text: text.into(),
            done: Some(tx),
        };
        (task, Delivery { rx })
    }

    fn complete(mut self, outcome: SendOutcome) {
        if let Some(tx) = self.done.take() {
            // Receiver may have been dropped (fire-and-forget submitters).
            let _ = tx.send(outcome);
        }
    }
}

/// Completion of a submitted task. Dropping it does not cancel the send.
#[derive(Debug)]
pub struct Delivery {
    rx: oneshot::Receiver<SendOutcome>,
}

impl Delivery {
    /// Wait for the session loop to execute the task. Returns Err(BridgeError::Closed)
    /// if the task was dropped without running (loop stopped).
    pub async fn wait(self) -> Result<SendOutcome, BridgeError> {
        self.rx.await.map_err(|_| BridgeError::Closed)
    }
}

/// Producer side; cheap to clone and safe to use from any task or thread.
#[derive(Clone, Debug)]
pub struct BridgeHandle {
    tx: mpsc::UnboundedSender<OutboundSendTask>,
}

impl BridgeHandle {
    /// Enqueue a send and return immediately.
    pub fn submit(
        &self,
        chat_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<Delivery, BridgeError> {
        let (task, delivery) = OutboundSendTask::new(chat_id, text);
        self.tx.send(task).map_err(|_| BridgeError::Closed)?;
        Ok(delivery)
    }
}

/// Consumer side, owned by the session loop.
#[derive(Debug)]
pub struct BridgeQueue {
    rx: mpsc::UnboundedReceiver<OutboundSendTask>,
}

impl BridgeQueue {
    /// Next task in submission order; None when every handle is gone.
    pub async fn recv(&mut self) -> Option<OutboundSendTask> {
        self.rx.recv().await
    }
}

/// Create a connected handle/queue pair.
pub fn channel() -> (BridgeHandle, BridgeQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (BridgeHandle { tx }, BridgeQueue { rx })
}

/// Execute a claimed task against the platform and fire its completion signal.
/// Failures are logged; the submitter's HTTP response has long been sent.
pub async fn run_task(platform: &dyn ChatPlatform, task: OutboundSendTask) {
    let outcome = platform
        .send_message(&task.chat_id, &task.text)
        .await
        .map_err(|e| e.to_string());
    match &outcome {
        Ok(()) => log::debug!("bridge: delivered reply to {} chat {}", platform.id(), task.chat_id),
        Err(e) => log::warn!(
            "bridge: delivering reply to {} chat {} failed: {}",
            platform.id(),
            task.chat_id,
            e
        ),
    }
    task.complete(outcome);
}
