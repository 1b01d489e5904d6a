//! Callback receiver: HTTP endpoint n8n posts workflow replies to.
//!
//! `POST /from-n8n` with `{"chat_id": .., "reply": ".."}`. Valid payloads are handed
//! to the delivery bridge and answered with 200 right away; the actual Telegram send
//! happens later on the session loop. Invalid payloads get a 400 and nothing else.

use crate::bridge::BridgeHandle;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

pub const CALLBACK_PATH: &str = "/from-n8n";

const MISSING_FIELDS_ERROR: &str = "chat_id и reply обязательны";
const INVALID_JSON_ERROR: &str = "invalid JSON body";
const SHUTTING_DOWN_ERROR: &str = "relay is shutting down";

/// A validated workflow reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyPayload {
    pub chat_id: String,
    pub reply_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("{}", INVALID_JSON_ERROR)]
    InvalidJson,
    #[error("{}", MISSING_FIELDS_ERROR)]
    MissingFields,
}

/// chat_id may be a string or an integer (Telegram ids are integers; n8n often
/// sends them back as strings). Strings pass through unchanged, like `reply`;
/// only the empty string and 0 count as missing.
fn chat_id_field(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_i64().is_some_and(|i| i != 0) => Some(n.to_string()),
        _ => None,
    }
}

fn reply_field(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

impl ReplyPayload {
    /// Decode and validate a raw request body.
    pub fn from_body(body: &[u8]) -> Result<Self, PayloadError> {
        let value: Value = serde_json::from_slice(body).map_err(|_| PayloadError::InvalidJson)?;
        let obj = value.as_object().ok_or(PayloadError::InvalidJson)?;
        let chat_id = chat_id_field(obj.get("chat_id"));
        let reply_text = reply_field(obj.get("reply"));
        match (chat_id, reply_text) {
            (Some(chat_id), Some(reply_text)) => Ok(Self {
                chat_id,
                reply_text,
            }),
            _ => Err(PayloadError::MissingFields),
        }
    }
}

#[derive(Clone)]
struct ReceiverState {
    bridge: BridgeHandle,
    port: u16,
}

/// Router with the callback endpoint and a health probe.
pub fn router(bridge: BridgeHandle, port: u16) -> Router {
    Router::new()
        .route("/", get(health_http))
        .route(CALLBACK_PATH, post(from_n8n))
        .with_state(ReceiverState { bridge, port })
}

/// Serve the callback router on an already bound listener until the future is dropped
/// or the listener fails.
pub async fn serve(listener: tokio::net::TcpListener, bridge: BridgeHandle) -> Result<()> {
    let addr = listener.local_addr().context("reading callback listener address")?;
    log::info!("callback receiver listening on {}{}", addr, CALLBACK_PATH);
    axum::serve(listener, router(bridge, addr.port()))
        .await
        .context("callback server exited")
}

/// POST /from-n8n — validate, enqueue the send, answer without waiting for it.
async fn from_n8n(State(state): State<ReceiverState>, body: Bytes) -> (StatusCode, Json<Value>) {
    let payload = match ReplyPayload::from_body(&body) {
        Ok(p) => p,
        Err(e) => {
            log::warn!("callback: rejected payload: {}", e);
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() })));
        }
    };
    match state.bridge.submit(payload.chat_id.clone(), payload.reply_text) {
        Ok(_delivery) => {
            log::info!("callback: queued reply for chat {}", payload.chat_id);
            (StatusCode::OK, Json(json!({ "status": "ok" })))
        }
        Err(e) => {
            log::warn!("callback: dropping reply for chat {}: {}", payload.chat_id, e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": SHUTTING_DOWN_ERROR })),
            )
        }
    }
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<ReceiverState>) -> Json<Value> {
    Json(json!({
        "runtime": "running",
        "port": state.port,
    }))
}
