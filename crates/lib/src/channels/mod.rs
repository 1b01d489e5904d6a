//! Chat platform (Telegram).
//!
//! The long-poll connector produces inbound [`ChatMessage`]s; outbound sends go
//! through the [`ChatPlatform`] trait so the session loop can own a single client.

mod inbound;
mod platform;
mod telegram;

pub use inbound::ChatMessage;
pub use platform::{ChatPlatform, PlatformError};
pub use telegram::{TelegramChannel, TelegramUpdate, TELEGRAM_API_BASE};
