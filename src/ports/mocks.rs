//! Hand-rolled recording mocks for the three ports, used by unit and
//! integration tests. Each mock records the calls it receives and serves
//! responses configured through builder methods.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::TokenSnapshot;
use crate::ports::market_data::{DiscoveryFeed, MarketDataError, MarketDataPort};
use crate::ports::messenger::{InboundCommand, MessengerError, MessengerPort};
use crate::ports::store::{StateStore, StoreError};

/// Mock market data port serving configured snapshots by token address.
#[derive(Debug, Default)]
pub struct MockMarketData {
    snapshots: Arc<Mutex<HashMap<String, TokenSnapshot>>>,
    search_results: Arc<Mutex<HashMap<String, Vec<TokenSnapshot>>>>,
    feed_addresses: Arc<Mutex<HashMap<&'static str, Vec<String>>>>,
    calls: Arc<Mutex<Vec<String>>>,
    fail_fetches: Arc<Mutex<bool>>,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: serve this snapshot for its own address.
    pub fn with_snapshot(self, snapshot: TokenSnapshot) -> Self {
        self.set_snapshot(snapshot);
        self
    }

    pub fn with_search_result(self, query: &str, snapshots: Vec<TokenSnapshot>) -> Self {
        self.search_results
            .lock()
            .unwrap()
            .insert(query.to_string(), snapshots);
        self
    }

    pub fn with_feed_addresses(self, feed: DiscoveryFeed, addresses: Vec<String>) -> Self {
        self.feed_addresses
            .lock()
            .unwrap()
            .insert(feed.as_str(), addresses);
        self
    }

    /// Replace (or add) the snapshot served for an address mid-test.
    pub fn set_snapshot(&self, snapshot: TokenSnapshot) {
        self.snapshots
            .lock()
            .unwrap()
            .insert(snapshot.address.clone(), snapshot);
    }

    /// Stop serving data for an address, as if the provider dropped it.
    pub fn remove_snapshot(&self, address: &str) {
        self.snapshots.lock().unwrap().remove(address);
    }

    /// Make every subsequent fetch fail with a transient error.
    pub fn set_failing(&self, failing: bool) {
        *self.fail_fetches.lock().unwrap() = failing;
    }

    /// Get all recorded calls.
    pub fn get_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MarketDataPort for MockMarketData {
    async fn fetch_by_addresses(
        &self,
        addresses: &[String],
    ) -> Result<Vec<TokenSnapshot>, MarketDataError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("fetch:{}", addresses.len()));
        if *self.fail_fetches.lock().unwrap() {
            return Err(MarketDataError::Http("mock transport failure".to_string()));
        }
        let snapshots = self.snapshots.lock().unwrap();
        Ok(addresses
            .iter()
            .filter_map(|addr| snapshots.get(addr).cloned())
            .collect())
    }

    async fn search(&self, query: &str) -> Result<Vec<TokenSnapshot>, MarketDataError> {
        self.calls.lock().unwrap().push(format!("search:{query}"));
        if *self.fail_fetches.lock().unwrap() {
            return Err(MarketDataError::Http("mock transport failure".to_string()));
        }
        Ok(self
            .search_results
            .lock()
            .unwrap()
            .get(query)
            .cloned()
            .unwrap_or_default())
    }

    async fn discovery_addresses(
        &self,
        feed: DiscoveryFeed,
    ) -> Result<Vec<String>, MarketDataError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("feed:{}", feed.as_str()));
        if *self.fail_fetches.lock().unwrap() {
            return Err(MarketDataError::Http("mock transport failure".to_string()));
        }
        Ok(self
            .feed_addresses
            .lock()
            .unwrap()
            .get(feed.as_str())
            .cloned()
            .unwrap_or_default())
    }
}

/// Mock messenger recording every sent message; sends can be made to fail
/// a configurable number of times.
#[derive(Debug, Default)]
pub struct MockMessenger {
    sent: Arc<Mutex<Vec<String>>>,
    inbound: Arc<Mutex<VecDeque<InboundCommand>>>,
    failures_remaining: Arc<Mutex<u32>>,
}

impl MockMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: fail the next `n` sends with a transient error.
    pub fn with_send_failures(self, n: u32) -> Self {
        *self.failures_remaining.lock().unwrap() = n;
        self
    }

    pub fn push_inbound(&self, command: InboundCommand) {
        self.inbound.lock().unwrap().push_back(command);
    }

    /// All successfully "delivered" messages, in order.
    pub fn sent_messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessengerPort for MockMessenger {
    async fn send(&self, text: &str, _preview: bool) -> Result<(), MessengerError> {
        {
            let mut failures = self.failures_remaining.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(MessengerError::Send("mock send failure".to_string()));
            }
        }
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn poll_commands(&self, offset: i64) -> Result<Vec<InboundCommand>, MessengerError> {
        let mut inbound = self.inbound.lock().unwrap();
        let mut out = Vec::new();
        while let Some(front) = inbound.front() {
            if front.update_id > offset {
                out.push(inbound.pop_front().unwrap());
            } else {
                inbound.pop_front();
            }
        }
        Ok(out)
    }
}

/// In-memory state store with the same semantics as the JSON-file store.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    sets: Mutex<HashMap<String, HashSet<String>>>,
    maps: Mutex<HashMap<String, HashMap<String, i64>>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn load_set(&self, consumer: &str) -> Result<HashSet<String>, StoreError> {
        Ok(self
            .sets
            .lock()
            .unwrap()
            .get(consumer)
            .cloned()
            .unwrap_or_default())
    }

    fn save_set(&self, consumer: &str, addresses: &HashSet<String>) -> Result<(), StoreError> {
        self.sets
            .lock()
            .unwrap()
            .insert(consumer.to_string(), addresses.clone());
        Ok(())
    }

    fn insert_into_set(&self, consumer: &str, address: &str) -> Result<(), StoreError> {
        self.sets
            .lock()
            .unwrap()
            .entry(consumer.to_string())
            .or_default()
            .insert(address.to_string());
        Ok(())
    }

    fn load_map(&self, consumer: &str) -> Result<HashMap<String, i64>, StoreError> {
        Ok(self
            .maps
            .lock()
            .unwrap()
            .get(consumer)
            .cloned()
            .unwrap_or_default())
    }

    fn upsert_map(&self, consumer: &str, entries: &HashMap<String, i64>) -> Result<(), StoreError> {
        let mut maps = self.maps.lock().unwrap();
        let map = maps.entry(consumer.to_string()).or_default();
        for (address, ts) in entries {
            match map.get(address) {
                None => {
                    map.insert(address.clone(), *ts);
                }
                Some(0) if *ts > 0 => {
                    map.insert(address.clone(), *ts);
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    fn delete_where_older(&self, consumer: &str, cutoff_ms: i64) -> Result<usize, StoreError> {
        let mut maps = self.maps.lock().unwrap();
        let map = maps.entry(consumer.to_string()).or_default();
        let before = map.len();
        map.retain(|_, ts| *ts == 0 || *ts > cutoff_ms);
        Ok(before - map.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(address: &str) -> TokenSnapshot {
        TokenSnapshot {
            address: address.to_string(),
            pair_address: format!("pair-{address}"),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_mock_market_data_serves_configured_snapshots() {
        let mock = MockMarketData::new()
            .with_snapshot(snap("mintA"))
            .with_snapshot(snap("mintB"));

        let out = mock
            .fetch_by_addresses(&["mintA".to_string(), "mintC".to_string()])
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].address, "mintA");
        assert_eq!(mock.get_calls(), vec!["fetch:2".to_string()]);
    }

    #[tokio::test]
    async fn test_mock_market_data_failure_mode() {
        let mock = MockMarketData::new().with_snapshot(snap("mintA"));
        mock.set_failing(true);
        assert!(mock
            .fetch_by_addresses(&["mintA".to_string()])
            .await
            .is_err());

        mock.set_failing(false);
        assert_eq!(
            mock.fetch_by_addresses(&["mintA".to_string()])
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_mock_messenger_records_and_fails() {
        let mock = MockMessenger::new().with_send_failures(1);

        assert!(mock.send("first", false).await.is_err());
        assert!(mock.send("second", false).await.is_ok());
        assert_eq!(mock.sent_messages(), vec!["second".to_string()]);
    }

    #[tokio::test]
    async fn test_mock_messenger_poll_respects_offset() {
        let mock = MockMessenger::new();
        mock.push_inbound(InboundCommand {
            update_id: 5,
            chat_id: 1,
            text: "/status".to_string(),
        });
        mock.push_inbound(InboundCommand {
            update_id: 6,
            chat_id: 1,
            text: "/count".to_string(),
        });

        let out = mock.poll_commands(5).await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].update_id, 6);
    }

    #[test]
    fn test_memory_store_upsert_semantics() {
        let store = MemoryStateStore::new();
        let mut entries = HashMap::new();
        entries.insert("a".to_string(), 0i64);
        store.upsert_map("known", &entries).unwrap();

        // 0 -> nonzero upgrade applies.
        entries.insert("a".to_string(), 100i64);
        store.upsert_map("known", &entries).unwrap();
        assert_eq!(store.load_map("known").unwrap()["a"], 100);

        // A known timestamp is never replaced.
        entries.insert("a".to_string(), 999i64);
        store.upsert_map("known", &entries).unwrap();
        assert_eq!(store.load_map("known").unwrap()["a"], 100);
    }

    #[test]
    fn test_memory_store_delete_where_older() {
        let store = MemoryStateStore::new();
        let mut entries = HashMap::new();
        entries.insert("old".to_string(), 10i64);
        entries.insert("fresh".to_string(), 100i64);
        entries.insert("unknown".to_string(), 0i64);
        store.upsert_map("known", &entries).unwrap();

        let removed = store.delete_where_older("known", 10).unwrap();
        assert_eq!(removed, 1);
        let map = store.load_map("known").unwrap();
        assert!(map.contains_key("fresh"));
        assert!(map.contains_key("unknown"));
    }
}
