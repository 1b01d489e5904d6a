//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.relay/config.json`) and environment.
//! Environment variables use the names the n8n bot setup already documents
//! (`TELEGRAM_BOT_TOKEN`, `N8N_BASE_URL`, `N8N_WEBHOOK_PATH`, `N8N_MODE`).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Telegram bot settings.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Workflow trigger (n8n webhook) settings.
    #[serde(default)]
    pub workflow: WorkflowConfig,

    /// Callback server settings.
    #[serde(default)]
    pub callback: CallbackConfig,

    /// Acknowledgement texts sent back to the chat.
    #[serde(default)]
    pub replies: ReplyConfig,
}

/// Telegram channel config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegramConfig {
    /// Bot token from BotFather. Overridden by TELEGRAM_BOT_TOKEN env when set.
    pub bot_token: Option<String>,
    /// Bot API base URL (default https://api.telegram.org). Overridden by TELEGRAM_API_BASE.
    pub api_base: Option<String>,
}

/// Which n8n webhook path variant to call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowMode {
    /// `/webhook-test/<path>`: only live while the workflow editor is listening.
    Test,
    /// `/webhook/<path>`: the activated workflow.
    #[default]
    Prod,
}

impl WorkflowMode {
    /// "test" selects the test webhook; anything else falls back to production.
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("test") {
            WorkflowMode::Test
        } else {
            WorkflowMode::Prod
        }
    }
}

/// Workflow trigger settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowConfig {
    /// n8n base URL (default "http://localhost:5678").
    #[serde(default = "default_workflow_base_url")]
    pub base_url: String,

    /// Webhook path segment configured on the n8n Webhook node.
    #[serde(default = "default_workflow_path")]
    pub path: String,

    #[serde(default)]
    pub mode: WorkflowMode,

    /// When true, the trigger's response body is echoed to the user instead of the
    /// fixed "processing" acknowledgement.
    #[serde(default)]
    pub echo_response: bool,
}

fn default_workflow_base_url() -> String {
    "http://localhost:5678".to_string()
}

fn default_workflow_path() -> String {
    "23467e56-1e59-4b55-a7d0-2ce125cc26ac".to_string()
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            base_url: default_workflow_base_url(),
            path: default_workflow_path(),
            mode: WorkflowMode::default(),
            echo_response: false,
        }
    }
}

impl WorkflowConfig {
    /// Full trigger URL for the configured mode.
    pub fn trigger_url(&self) -> String {
        let base = self.base_url.trim().trim_end_matches('/');
        let path = self.path.trim().trim_start_matches('/');
        match self.mode {
            WorkflowMode::Test => format!("{}/webhook-test/{}", base, path),
            WorkflowMode::Prod => format!("{}/webhook/{}", base, path),
        }
    }
}

/// Callback server bind and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackConfig {
    /// Port n8n posts replies to (default 8000).
    #[serde(default = "default_callback_port")]
    pub port: u16,

    /// Bind address (default "0.0.0.0" so a dockerised n8n can reach it).
    #[serde(default = "default_callback_bind")]
    pub bind: String,
}

fn default_callback_port() -> u16 {
    8000
}

fn default_callback_bind() -> String {
    "0.0.0.0".to_string()
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            port: default_callback_port(),
            bind: default_callback_bind(),
        }
    }
}

/// Texts used for acknowledgements.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyConfig {
    /// Sent after the trigger accepted the message.
    #[serde(default = "default_processing_reply")]
    pub processing: String,

    /// Prefix for the error acknowledgement; the transport error follows after ": ".
    #[serde(default = "default_forward_error_prefix")]
    pub forward_error_prefix: String,
}

fn default_processing_reply() -> String {
    "Секунду, печатаю...".to_string()
}

fn default_forward_error_prefix() -> String {
    "Ошибка при отправке в n8n".to_string()
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            processing: default_processing_reply(),
            forward_error_prefix: default_forward_error_prefix(),
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

impl Config {
    /// Apply process environment overrides (see [`Config::apply_overrides_from`]).
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from a key lookup. Empty or whitespace-only values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).as_deref().and_then(non_empty);
        if let Some(token) = get("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = Some(token);
        }
        if let Some(base) = get("TELEGRAM_API_BASE") {
            self.telegram.api_base = Some(base);
        }
        if let Some(base) = get("N8N_BASE_URL") {
            self.workflow.base_url = base;
        }
        if let Some(path) = get("N8N_WEBHOOK_PATH") {
            self.workflow.path = path;
        }
        if let Some(mode) = get("N8N_MODE") {
            self.workflow.mode = WorkflowMode::parse(&mode);
        }
        if let Some(port) = get("RELAY_CALLBACK_PORT") {
            match port.parse() {
                Ok(p) => self.callback.port = p,
                Err(_) => log::warn!("ignoring invalid RELAY_CALLBACK_PORT: {}", port),
            }
        }
    }
}

/// Resolve the Telegram bot token from the (already overridden) config, ignoring blank values.
pub fn resolve_telegram_token(config: &Config) -> Option<String> {
    config.telegram.bot_token.as_deref().and_then(non_empty)
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("RELAY_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".relay").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the given path (or the default). Missing file => default config.
/// Environment overrides are applied on top.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let mut config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    config.apply_env_overrides();
    Ok((config, path))
}
