//! Telegram Bot API client
//!
//! Sends rich HTML messages with a plain-text fallback (the Bot API rejects
//! the whole message when the markup is off), and long-polls `getUpdates`
//! with offset-based acknowledgment for operator commands.

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::ports::messenger::{InboundCommand, MessengerError, MessengerPort};

/// Long-poll window passed to getUpdates.
const POLL_TIMEOUT_SECS: u64 = 25;

pub struct TelegramClient {
    http: Client,
    api_base: String,
    chat_id: String,
    tag_re: Regex,
}

impl TelegramClient {
    pub fn new(bot_token: &str, chat_id: &str, timeout_secs: u64) -> Result<Self, MessengerError> {
        if bot_token.is_empty() {
            return Err(MessengerError::Config("bot token is empty".to_string()));
        }
        if chat_id.is_empty() {
            return Err(MessengerError::Config("chat id is empty".to_string()));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| MessengerError::Config(e.to_string()))?;

        let tag_re = Regex::new(r"<[^>]+>").map_err(|e| MessengerError::Config(e.to_string()))?;

        Ok(Self {
            http,
            api_base: format!("https://api.telegram.org/bot{bot_token}"),
            chat_id: chat_id.to_string(),
            tag_re,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.api_base, method)
    }

    async fn post_message(&self, body: &serde_json::Value) -> Result<bool, MessengerError> {
        let response = self
            .http
            .post(self.method_url("sendMessage"))
            .json(body)
            .send()
            .await
            .map_err(|e| MessengerError::Send(e.to_string()))?;
        Ok(response.status().is_success())
    }
}

#[async_trait]
impl MessengerPort for TelegramClient {
    async fn send(&self, text: &str, preview: bool) -> Result<(), MessengerError> {
        let body = json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": !preview,
        });

        if self.post_message(&body).await? {
            return Ok(());
        }

        // The API rejects the whole message on bad markup; retry once as
        // plain text so the alert itself is not lost.
        warn!("HTML send rejected, retrying as plain text");
        let plain = self.tag_re.replace_all(text, "").to_string();
        let body = json!({
            "chat_id": self.chat_id,
            "text": plain,
            "disable_web_page_preview": true,
        });

        if self.post_message(&body).await? {
            Ok(())
        } else {
            Err(MessengerError::Send(
                "sendMessage rejected in both HTML and plain mode".to_string(),
            ))
        }
    }

    async fn poll_commands(&self, offset: i64) -> Result<Vec<InboundCommand>, MessengerError> {
        let body = json!({
            "offset": offset + 1,
            "timeout": POLL_TIMEOUT_SECS,
            "allowed_updates": ["message"],
        });

        let response = self
            .http
            .post(self.method_url("getUpdates"))
            // Long poll: this request legitimately outlives the default
            // client timeout.
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 10))
            .json(&body)
            .send()
            .await
            .map_err(|e| MessengerError::Poll(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MessengerError::Poll(format!(
                "getUpdates returned {status}"
            )));
        }

        let envelope: UpdatesEnvelope = response
            .json()
            .await
            .map_err(|e| MessengerError::Poll(e.to_string()))?;

        if !envelope.ok {
            return Err(MessengerError::Poll("getUpdates answered ok=false".to_string()));
        }

        let commands = envelope
            .result
            .into_iter()
            .filter_map(RawUpdate::into_command)
            .collect::<Vec<_>>();
        if !commands.is_empty() {
            debug!("received {} inbound message(s)", commands.len());
        }
        Ok(commands)
    }
}

#[derive(Debug, Deserialize)]
struct UpdatesEnvelope {
    ok: bool,
    #[serde(default)]
    result: Vec<RawUpdate>,
}

#[derive(Debug, Deserialize)]
struct RawUpdate {
    update_id: i64,
    message: Option<RawMessage>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    text: Option<String>,
    chat: Option<RawChat>,
}

#[derive(Debug, Deserialize)]
struct RawChat {
    id: i64,
}

impl RawUpdate {
    fn into_command(self) -> Option<InboundCommand> {
        let message = self.message?;
        let chat_id = message.chat?.id;
        let text = message.text?.trim().to_string();
        if text.is_empty() {
            return None;
        }
        Some(InboundCommand {
            update_id: self.update_id,
            chat_id,
            text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_missing_credentials() {
        assert!(TelegramClient::new("", "123", 10).is_err());
        assert!(TelegramClient::new("token", "", 10).is_err());
        assert!(TelegramClient::new("token", "123", 10).is_ok());
    }

    #[test]
    fn test_method_url() {
        let client = TelegramClient::new("abc:def", "123", 10).unwrap();
        assert_eq!(
            client.method_url("sendMessage"),
            "https://api.telegram.org/botabc:def/sendMessage"
        );
    }

    #[test]
    fn test_tag_stripping() {
        let client = TelegramClient::new("t", "c", 10).unwrap();
        let plain = client
            .tag_re
            .replace_all("<b>Alert</b> for <code>Mint111</code>", "")
            .to_string();
        assert_eq!(plain, "Alert for Mint111");
    }

    #[test]
    fn test_update_envelope_decoding() {
        let json = r#"{
            "ok": true,
            "result": [
                {"update_id": 7, "message": {"text": " /status ", "chat": {"id": 42}}},
                {"update_id": 8, "message": {"chat": {"id": 42}}},
                {"update_id": 9}
            ]
        }"#;
        let envelope: UpdatesEnvelope = serde_json::from_str(json).unwrap();
        assert!(envelope.ok);

        let commands: Vec<_> = envelope
            .result
            .into_iter()
            .filter_map(RawUpdate::into_command)
            .collect();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].update_id, 7);
        assert_eq!(commands[0].chat_id, 42);
        assert_eq!(commands[0].text, "/status");
    }
}
