//! Fake n8n trigger and fake Telegram Bot API used by the integration tests.

#![allow(dead_code)]

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Bind 127.0.0.1 on an OS-assigned port and serve the router in the background.
pub async fn spawn_router(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Port nothing listens on (bound once, then released).
pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

/// Poll until `check` holds or ~5s pass.
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    check()
}

/// Records every trigger call's query parameters and answers with a fixed body.
#[derive(Clone, Default)]
pub struct FakeWorkflow {
    pub calls: Arc<Mutex<Vec<HashMap<String, String>>>>,
    pub raw_queries: Arc<Mutex<Vec<String>>>,
}

impl FakeWorkflow {
    /// Serves GET /webhook/<path>; returns the trigger URL.
    pub async fn spawn(&self, path: &str) -> String {
        let route = format!("/webhook/{}", path);
        let app = Router::new()
            .route(&route, get(workflow_trigger))
            .with_state(self.clone());
        let addr = spawn_router(app).await;
        format!("http://{}{}", addr, route)
    }

    pub fn calls(&self) -> Vec<HashMap<String, String>> {
        self.calls.lock().expect("lock").clone()
    }
}

async fn workflow_trigger(
    State(state): State<FakeWorkflow>,
    Query(params): Query<HashMap<String, String>>,
    uri: axum::http::Uri,
) -> Json<Value> {
    state
        .raw_queries
        .lock()
        .expect("lock")
        .push(uri.query().unwrap_or_default().to_string());
    state.calls.lock().expect("lock").push(params);
    Json(json!({ "message": "Workflow was started" }))
}

/// Minimal Bot API: getUpdates hands out queued updates once, sendMessage records.
#[derive(Clone, Default)]
pub struct FakeTelegram {
    pub pending_updates: Arc<Mutex<Vec<Value>>>,
    pub sent: Arc<Mutex<Vec<(String, String)>>>,
}

impl FakeTelegram {
    /// Serves /bot<token>/getUpdates and /bot<token>/sendMessage; returns the api base.
    pub async fn spawn(&self, token: &str) -> String {
        let app = Router::new()
            .route(&format!("/bot{}/getUpdates", token), get(get_updates))
            .route(&format!("/bot{}/sendMessage", token), post(send_message))
            .with_state(self.clone());
        let addr = spawn_router(app).await;
        format!("http://{}", addr)
    }

    pub fn push_text(&self, update_id: i64, chat_id: i64, text: &str) {
        self.pending_updates.lock().expect("lock").push(json!({
            "update_id": update_id,
            "message": { "chat": { "id": chat_id }, "text": text }
        }));
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().expect("lock").clone()
    }
}

async fn get_updates(State(state): State<FakeTelegram>) -> Json<Value> {
    let updates: Vec<Value> = std::mem::take(&mut *state.pending_updates.lock().expect("lock"));
    if updates.is_empty() {
        // Stand-in for the long-poll wait.
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    Json(json!({ "ok": true, "result": updates }))
}

async fn send_message(State(state): State<FakeTelegram>, Json(body): Json<Value>) -> Json<Value> {
    let chat_id = match &body["chat_id"] {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let text = body["text"].as_str().unwrap_or_default().to_string();
    state.sent.lock().expect("lock").push((chat_id, text));
    Json(json!({ "ok": true, "result": {} }))
}
