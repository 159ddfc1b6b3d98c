//! Graduation Event Handler
//!
//! Consumes events from the PumpPortal stream task. Each new graduation is
//! recorded in the graduated set and the known-token registry, then
//! announced on the channel. The provider usually has not indexed the
//! token the moment it graduates, so the metadata lookup retries on a
//! fixed cadence before giving up.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use crate::adapters::pumpportal::GraduationEvent;
use crate::adapters::telegram::format;
use crate::domain::{now_ms, TokenSnapshot};
use crate::ports::market_data::MarketDataPort;
use crate::ports::messenger::MessengerPort;
use crate::ports::store::{consumers, StateStore};

use super::state::SharedState;

pub struct GraduationHandler {
    market: Arc<dyn MarketDataPort>,
    messenger: Arc<dyn MessengerPort>,
    store: Arc<dyn StateStore>,
    state: Arc<SharedState>,
    meta_retries: u32,
    meta_retry_delay: Duration,
}

impl GraduationHandler {
    pub fn new(
        market: Arc<dyn MarketDataPort>,
        messenger: Arc<dyn MessengerPort>,
        store: Arc<dyn StateStore>,
        state: Arc<SharedState>,
        meta_retries: u32,
        meta_retry_delay: Duration,
    ) -> Self {
        Self {
            market,
            messenger,
            store,
            state,
            meta_retries,
            meta_retry_delay,
        }
    }

    /// Drain events until the stream side closes or shutdown is flagged.
    pub async fn run(&self, mut events: mpsc::Receiver<GraduationEvent>, running: Arc<RwLock<bool>>) {
        info!("graduation handler started");
        loop {
            if !*running.read().await {
                break;
            }
            tokio::select! {
                maybe_event = events.recv() => {
                    match maybe_event {
                        Some(event) => self.handle_event(&event).await,
                        None => break,
                    }
                }
                _ = tokio::time::sleep(Duration::from_secs(1)) => {}
            }
        }
        info!("graduation handler stopped");
    }

    pub async fn handle_event(&self, event: &GraduationEvent) {
        let Some(mint) = event.mint_address() else {
            return;
        };
        if self.state.is_graduated(mint).await {
            return;
        }

        let meta = self.fetch_meta(mint).await;
        let created = meta
            .as_ref()
            .and_then(|m| m.pair_created_at_ms)
            .unwrap_or(0)
            .max(0);

        // Recorded before the send; the graduated set is the dedup
        // universe for this channel.
        if let Err(e) = self.store.insert_into_set(consumers::GRADUATED, mint) {
            warn!("failed to persist graduated {}: {}", mint, e);
        }
        self.state.add_graduated(mint).await;

        if self.state.observe_token(mint, created).await {
            let mut row = HashMap::new();
            row.insert(mint.to_string(), created);
            if let Err(e) = self.store.upsert_map(consumers::KNOWN, &row) {
                warn!("failed to persist known row for {}: {}", mint, e);
            }
        }

        let (name, symbol) = meta
            .map(|m| (m.name, m.symbol))
            .unwrap_or_else(|| ("?".to_string(), "?".to_string()));
        info!("[graduated] {:<12} | {}", symbol, mint);

        let text = format::graduation_alert(
            mint,
            &name,
            &symbol,
            (created > 0).then_some(created),
            now_ms(),
        );
        if let Err(e) = self.messenger.send(&text, false).await {
            warn!("graduation alert send failed for {}: {}", mint, e);
        }
    }

    /// Look the fresh mint up with bounded retries; indexing lags the
    /// graduation event by up to a minute or so.
    async fn fetch_meta(&self, mint: &str) -> Option<TokenSnapshot> {
        let addresses = vec![mint.to_string()];
        for attempt in 1..=self.meta_retries.max(1) {
            match self.market.fetch_by_addresses(&addresses).await {
                Ok(snapshots) => {
                    let best = snapshots
                        .iter()
                        .find(|s| !s.symbol.is_empty() && !s.name.is_empty())
                        .or_else(|| snapshots.first());
                    if let Some(snapshot) = best {
                        return Some(snapshot.clone());
                    }
                }
                Err(e) => debug!("meta fetch attempt {} failed for {}: {}", attempt, mint, e),
            }
            if attempt < self.meta_retries {
                debug!(
                    "{} not indexed yet, retrying in {:?} ({}/{})",
                    mint, self.meta_retry_delay, attempt, self.meta_retries
                );
                tokio::time::sleep(self.meta_retry_delay).await;
            }
        }
        warn!(
            "no metadata for {} after {} attempts",
            mint, self.meta_retries
        );
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FilterConfig;
    use crate::ports::mocks::{MemoryStateStore, MockMarketData, MockMessenger};
    use crate::ports::store::StateStore as _;

    fn event(mint: &str) -> GraduationEvent {
        serde_json::from_str(&format!(r#"{{"mint": "{mint}"}}"#)).unwrap()
    }

    fn handler(
        market: Arc<MockMarketData>,
        messenger: Arc<MockMessenger>,
        store: Arc<MemoryStateStore>,
        state: Arc<SharedState>,
    ) -> GraduationHandler {
        GraduationHandler::new(
            market,
            messenger,
            store,
            state,
            2,
            Duration::from_millis(1),
        )
    }

    fn empty_state() -> Arc<SharedState> {
        Arc::new(SharedState::new(&[] as &[FilterConfig]))
    }

    fn graduated_snap(mint: &str) -> TokenSnapshot {
        TokenSnapshot {
            address: mint.to_string(),
            pair_address: format!("pair-{mint}"),
            name: "Fresh Meme".to_string(),
            symbol: "FRESH".to_string(),
            pair_created_at_ms: Some(1_700_000_000_000),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_graduation_recorded_and_alerted() {
        let market = Arc::new(MockMarketData::new().with_snapshot(graduated_snap("Mint111")));
        let messenger = Arc::new(MockMessenger::new());
        let store = Arc::new(MemoryStateStore::new());
        let state = empty_state();

        let h = handler(market, messenger.clone(), store.clone(), state.clone());
        h.handle_event(&event("Mint111")).await;

        assert!(state.is_graduated("Mint111").await);
        assert!(store
            .load_set(consumers::GRADUATED)
            .unwrap()
            .contains("Mint111"));
        assert_eq!(store.load_map(consumers::KNOWN).unwrap()["Mint111"], 1_700_000_000_000);

        let sent = messenger.sent_messages();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("FRESH"));
        assert!(sent[0].contains("Mint111"));
    }

    #[tokio::test]
    async fn test_duplicate_graduation_ignored() {
        let market = Arc::new(MockMarketData::new().with_snapshot(graduated_snap("Mint111")));
        let messenger = Arc::new(MockMessenger::new());
        let store = Arc::new(MemoryStateStore::new());
        let state = empty_state();

        let h = handler(market, messenger.clone(), store, state);
        h.handle_event(&event("Mint111")).await;
        h.handle_event(&event("Mint111")).await;

        assert_eq!(messenger.sent_messages().len(), 1);
    }

    #[tokio::test]
    async fn test_unindexed_token_still_recorded() {
        // Provider has nothing for the mint: alert goes out with unknown
        // metadata and the registry row lands with created_at 0.
        let market = Arc::new(MockMarketData::new());
        let messenger = Arc::new(MockMessenger::new());
        let store = Arc::new(MemoryStateStore::new());
        let state = empty_state();

        let h = handler(market, messenger.clone(), store.clone(), state.clone());
        h.handle_event(&event("Mint222")).await;

        assert!(state.is_graduated("Mint222").await);
        assert_eq!(store.load_map(consumers::KNOWN).unwrap()["Mint222"], 0);
        let sent = messenger.sent_messages();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("Mint222"));
        assert!(sent[0].contains("N/A ago"));
    }

    #[tokio::test]
    async fn test_event_without_mint_is_noop() {
        let market = Arc::new(MockMarketData::new());
        let messenger = Arc::new(MockMessenger::new());
        let store = Arc::new(MemoryStateStore::new());
        let state = empty_state();

        let h = handler(market, messenger.clone(), store, state.clone());
        h.handle_event(&GraduationEvent::default()).await;

        assert_eq!(state.graduated_count().await, 0);
        assert!(messenger.sent_messages().is_empty());
    }
}
