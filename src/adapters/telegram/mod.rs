//! Telegram Adapter
//!
//! Bot API client implementing [`crate::ports::messenger::MessengerPort`]
//! plus the alert/status message formatting.

pub mod client;
pub mod format;

pub use client::TelegramClient;
