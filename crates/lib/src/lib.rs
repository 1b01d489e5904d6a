//! Relay core library — Telegram long-poll listener, n8n workflow forwarder,
//! callback receiver and the delivery bridge between them.

pub mod bridge;
pub mod channels;
pub mod config;
pub mod forwarder;
pub mod listener;
pub mod receiver;
pub mod relay;

pub use relay::run_relay;
