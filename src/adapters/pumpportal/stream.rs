//! PumpPortal websocket stream task
//!
//! Connects, subscribes to migration events, and forwards every event that
//! carries a mint address into an mpsc channel. On disconnect or socket
//! error it reconnects after a fixed delay and re-subscribes. The task ends
//! when the consuming side drops the receiver.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use super::types::{GraduationEvent, SubscribeMessage};

pub const DEFAULT_WS_URL: &str = "wss://pumpportal.fun/api/data";

/// Fixed delay before reconnecting after a drop.
const DEFAULT_RECONNECT_DELAY_SECS: u64 = 5;

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Error)]
enum StreamError {
    #[error("websocket connect failed: {0}")]
    Connect(String),

    #[error("subscribe failed: {0}")]
    Subscribe(String),

    #[error("websocket error: {0}")]
    Socket(String),
}

#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub ws_url: String,
    pub reconnect_delay: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            reconnect_delay: Duration::from_secs(DEFAULT_RECONNECT_DELAY_SECS),
        }
    }
}

pub struct PumpPortalStream {
    config: StreamConfig,
    event_tx: mpsc::Sender<GraduationEvent>,
}

impl PumpPortalStream {
    /// Create the stream task and the receiver its events arrive on.
    pub fn new(config: StreamConfig) -> (Self, mpsc::Receiver<GraduationEvent>) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        (Self { config, event_tx }, event_rx)
    }

    /// Run until the event receiver is dropped.
    pub async fn run(&self) {
        loop {
            if self.event_tx.is_closed() {
                return;
            }
            match self.connect_and_forward().await {
                Ok(()) => info!("graduation stream closed"),
                Err(e) => warn!("graduation stream error: {}", e),
            }
            if self.event_tx.is_closed() {
                return;
            }
            info!(
                "reconnecting to PumpPortal in {}s",
                self.config.reconnect_delay.as_secs()
            );
            tokio::time::sleep(self.config.reconnect_delay).await;
        }
    }

    async fn connect_and_forward(&self) -> Result<(), StreamError> {
        let (socket, _) = connect_async(self.config.ws_url.as_str())
            .await
            .map_err(|e| StreamError::Connect(e.to_string()))?;
        info!("connected to PumpPortal at {}", self.config.ws_url);

        let (mut write, mut read) = socket.split();

        let subscribe = serde_json::to_string(&SubscribeMessage::migrations())
            .map_err(|e| StreamError::Subscribe(e.to_string()))?;
        write
            .send(Message::Text(subscribe))
            .await
            .map_err(|e| StreamError::Subscribe(e.to_string()))?;

        while let Some(message) = read.next().await {
            let message = message.map_err(|e| StreamError::Socket(e.to_string()))?;
            match message {
                Message::Text(text) => {
                    if self.forward(&text).await {
                        return Ok(());
                    }
                }
                Message::Ping(payload) => {
                    let _ = write.send(Message::Pong(payload)).await;
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
        Ok(())
    }

    /// Parse one frame and forward it. Returns `true` when the consumer is
    /// gone and the stream should shut down.
    async fn forward(&self, text: &str) -> bool {
        match serde_json::from_str::<GraduationEvent>(text) {
            Ok(event) => {
                if event.mint_address().is_none() {
                    // Subscription confirmations and heartbeats land here.
                    debug!("ignoring stream message without mint");
                    return false;
                }
                self.event_tx.send(event).await.is_err()
            }
            Err(e) => {
                debug!("ignoring unparseable stream message: {}", e);
                false
            }
        }
    }
}
