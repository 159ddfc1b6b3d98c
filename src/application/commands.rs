//! Operator Command Router
//!
//! Long-polls the messaging channel and answers the read-only command
//! surface: /status, /count, /seen, /missing, /help. Everything except
//! /missing is served straight from [`SharedState`]; /missing performs the
//! one allowed on-demand provider lookup. Replies are chunked to stay under
//! the channel's message ceiling.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::adapters::telegram::format::{esc, status_line};
use crate::domain::{now_ms, FilterConfig};
use crate::ports::market_data::{snapshots_or_empty, MarketDataPort};
use crate::ports::messenger::{chunk_lines, MessengerPort, MESSAGE_CHAR_LIMIT};

use super::state::{now_stamp, SharedState};

/// Idle pause between polls; the poll itself long-blocks on the channel.
const POLL_IDLE_MS: u64 = 1_000;

/// Pause after a failed poll before trying again.
const POLL_RETRY_SECS: u64 = 5;

/// Pause between chunks of one reply.
const CHUNK_DELAY_MS: u64 = 300;

pub struct CommandRouter {
    messenger: Arc<dyn MessengerPort>,
    market: Arc<dyn MarketDataPort>,
    state: Arc<SharedState>,
    filters: Vec<FilterConfig>,
    chat_id: i64,
}

impl CommandRouter {
    pub fn new(
        messenger: Arc<dyn MessengerPort>,
        market: Arc<dyn MarketDataPort>,
        state: Arc<SharedState>,
        filters: Vec<FilterConfig>,
        chat_id: i64,
    ) -> Self {
        Self {
            messenger,
            market,
            state,
            filters,
            chat_id,
        }
    }

    pub async fn run(&self, running: Arc<RwLock<bool>>) {
        info!("command listener started");
        let mut offset = 0i64;
        while *running.read().await {
            match self.messenger.poll_commands(offset).await {
                Ok(commands) => {
                    for command in commands {
                        offset = offset.max(command.update_id);
                        if command.chat_id != self.chat_id {
                            continue;
                        }
                        info!("command: {:?}", command.text);
                        self.dispatch(&command.text).await;
                    }
                }
                Err(e) => {
                    warn!("command poll failed: {}", e);
                    tokio::time::sleep(Duration::from_secs(POLL_RETRY_SECS)).await;
                }
            }
            tokio::time::sleep(Duration::from_millis(POLL_IDLE_MS)).await;
        }
        info!("command listener stopped");
    }

    pub async fn dispatch(&self, text: &str) {
        let text = text.trim().to_lowercase();
        if text.starts_with("/status") {
            self.handle_status().await;
        } else if text.starts_with("/count") {
            self.handle_count().await;
        } else if text.starts_with("/seen") {
            self.handle_seen().await;
        } else if text.starts_with("/missing") {
            self.handle_missing().await;
        } else if text.starts_with("/help") {
            self.handle_help().await;
        }
    }

    async fn send_chunked(&self, lines: Vec<String>) {
        let chunks = chunk_lines(lines, MESSAGE_CHAR_LIMIT);
        let mut chunks = chunks.into_iter().peekable();
        while let Some(chunk) = chunks.next() {
            if let Err(e) = self.messenger.send(&chunk, false).await {
                warn!("reply send failed: {}", e);
            }
            if chunks.peek().is_some() {
                tokio::time::sleep(Duration::from_millis(CHUNK_DELAY_MS)).await;
            }
        }
    }

    async fn send_one(&self, text: String) {
        if let Err(e) = self.messenger.send(&text, false).await {
            warn!("reply send failed: {}", e);
        }
    }

    async fn handle_status(&self) {
        let statuses = self.state.filter_statuses().await;
        let cycle = self.state.last_cycle().await;
        let now = now_ms();

        let mut lines = Vec::new();
        for status in statuses {
            if status.passing.is_empty() {
                lines.push(format!(
                    "📭 <b>{}</b>: no tokens currently match.  |  <i>{}</i>",
                    esc(&status.label),
                    status.updated_at.as_deref().unwrap_or("never checked"),
                ));
                continue;
            }
            lines.push(format!(
                "📊 <b>{} — {} matching</b>  |  <i>{}</i>\n",
                esc(&status.label),
                status.passing.len(),
                status.updated_at.as_deref().unwrap_or(&cycle),
            ));
            for (i, snapshot) in status.passing.iter().enumerate() {
                lines.push(status_line(i + 1, snapshot, now));
            }
            lines.push(String::new());
        }
        if lines.is_empty() {
            self.send_one("No filters configured.".to_string()).await;
            return;
        }
        self.send_chunked(lines).await;
    }

    async fn handle_count(&self) {
        let statuses = self.state.filter_statuses().await;
        let mut lines: Vec<String> = statuses
            .iter()
            .map(|s| {
                format!(
                    "<b>{}</b>: {} token(s) matching",
                    esc(&s.label),
                    s.passing.len()
                )
            })
            .collect();
        lines.push(format!("<i>Last cycle: {}</i>", self.state.last_cycle().await));
        self.send_one(lines.join("\n")).await;
    }

    async fn handle_seen(&self) {
        let mut addresses = self.state.known_addresses().await;
        if addresses.is_empty() {
            self.send_one("📭 <b>No tokens tracked yet.</b>".to_string())
                .await;
            return;
        }
        addresses.sort();

        let mut lines = vec![format!(
            "<b>Tracked: {} tokens</b>  |  <i>{}</i>\n",
            addresses.len(),
            now_stamp(),
        )];
        for (i, address) in addresses.iter().enumerate() {
            lines.push(format!("{}. <code>{}</code>", i + 1, address));
        }
        self.send_chunked(lines).await;
    }

    async fn handle_missing(&self) {
        let mut addresses = self.state.known_addresses().await;
        if addresses.is_empty() {
            self.send_one("📭 <b>No tokens tracked yet.</b>".to_string())
                .await;
            return;
        }
        addresses.sort();

        self.send_one(format!(
            "⏳ Checking {} tokens, please wait...",
            addresses.len()
        ))
        .await;

        let snapshots = snapshots_or_empty(
            self.market.fetch_by_addresses(&addresses).await,
            "missing check",
        );
        let returned: HashSet<&str> = snapshots.iter().map(|s| s.address.as_str()).collect();
        let missing: Vec<&String> = addresses
            .iter()
            .filter(|a| !returned.contains(a.as_str()))
            .collect();

        if missing.is_empty() {
            self.send_one(format!(
                "✅ <b>All {} tokens returned data.</b>",
                addresses.len()
            ))
            .await;
            return;
        }

        let mut lines = vec![
            format!(
                "<b>No data for {}/{} tokens</b>  |  <i>{}</i>",
                missing.len(),
                addresses.len(),
                now_stamp(),
            ),
            "<i>(likely dead/rugged or not yet indexed)</i>".to_string(),
        ];
        for (i, address) in missing.iter().enumerate() {
            lines.push(format!("{}. <code>{}</code>", i + 1, address));
        }
        self.send_chunked(lines).await;
    }

    async fn handle_help(&self) {
        let mut lines = vec![
            "<b>Commands:</b>".to_string(),
            "/status — tokens currently passing each filter".to_string(),
            "/count — quick counts".to_string(),
            "/seen — all tracked addresses".to_string(),
            "/missing — tracked addresses the provider has no data for".to_string(),
            "/help — this".to_string(),
            String::new(),
        ];
        for filter in &self.filters {
            lines.push(format!(
                "<i>{}: {}</i>",
                esc(&filter.label),
                esc(&filter.summary())
            ));
        }
        self.send_one(lines.join("\n")).await;
    }
}
