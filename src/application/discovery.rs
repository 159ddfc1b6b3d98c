//! Discovery Aggregator
//!
//! Merges the discovery feeds, the fixed search queries and a re-check of
//! every already-known address into one deduplicated snapshot list per
//! cycle, keeping the known-token registry and its persisted mirror in
//! sync. Discovery feeds lag real listing time; the full re-check is the
//! correctness backstop, and the cleanup horizon bounds registry growth.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::domain::{dedup_by_pair, now_ms, TokenSnapshot, MS_PER_HOUR};
use crate::ports::market_data::{snapshots_or_empty, DiscoveryFeed, MarketDataPort};
use crate::ports::store::{consumers, StateStore};

use super::state::SharedState;

/// Pause between consecutive search queries.
const SEARCH_DELAY_MS: u64 = 200;

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub search_queries: Vec<String>,
    /// Largest max-age across active filters; tokens inside any filter's
    /// window must survive cleanup.
    pub max_age_hours: f64,
    pub cleanup_buffer_hours: f64,
}

/// Counters from one discovery cycle, for logging and the `scan` command.
#[derive(Debug, Default, Clone)]
pub struct DiscoveryReport {
    pub feed_addresses: usize,
    pub search_pairs: usize,
    pub newly_known: usize,
    pub purged: usize,
    pub unique_pairs: usize,
}

pub struct DiscoveryAggregator {
    market: Arc<dyn MarketDataPort>,
    store: Arc<dyn StateStore>,
    state: Arc<SharedState>,
    config: DiscoveryConfig,
}

impl DiscoveryAggregator {
    pub fn new(
        market: Arc<dyn MarketDataPort>,
        store: Arc<dyn StateStore>,
        state: Arc<SharedState>,
        config: DiscoveryConfig,
    ) -> Self {
        Self {
            market,
            store,
            state,
            config,
        }
    }

    /// Run one full discovery cycle; returns the deduplicated snapshots
    /// and the cycle counters.
    pub async fn run_cycle(&self) -> (Vec<TokenSnapshot>, DiscoveryReport) {
        let mut report = DiscoveryReport::default();
        let mut merged: Vec<TokenSnapshot> = Vec::new();

        // 1. Discovery feeds -> batched snapshot fetch.
        for feed in [DiscoveryFeed::Profiles, DiscoveryFeed::Boosts] {
            let addresses = match self.market.discovery_addresses(feed).await {
                Ok(addresses) => addresses,
                Err(e) => {
                    warn!("{} feed unavailable this cycle: {}", feed.as_str(), e);
                    Vec::new()
                }
            };
            info!("[{}] {} addresses", feed.as_str(), addresses.len());
            report.feed_addresses += addresses.len();
            if !addresses.is_empty() {
                merged.extend(snapshots_or_empty(
                    self.market.fetch_by_addresses(&addresses).await,
                    "feed batch fetch",
                ));
            }
        }

        // 2. Fixed search queries.
        let mut search_total = 0;
        for query in &self.config.search_queries {
            let found = snapshots_or_empty(self.market.search(query).await, "search");
            search_total += found.len();
            merged.extend(found);
            tokio::time::sleep(Duration::from_millis(SEARCH_DELAY_MS)).await;
        }
        info!("[search] {} pairs from {} queries", search_total, self.config.search_queries.len());
        report.search_pairs = search_total;

        // 3. First dedup pass over feeds + search.
        let merged_deduped = dedup_by_pair(merged);

        // 4. Fold new sightings into the registry; collect rows the store
        //    needs (new addresses and 0 -> nonzero upgrades).
        let mut new_entries: HashMap<String, i64> = HashMap::new();
        for snapshot in &merged_deduped {
            if snapshot.address.is_empty() {
                continue;
            }
            let created = snapshot.pair_created_at_ms.unwrap_or(0).max(0);
            if self.state.observe_token(&snapshot.address, created).await {
                new_entries.insert(snapshot.address.clone(), created);
            }
        }
        if !new_entries.is_empty() {
            report.newly_known = new_entries.len();
            if let Err(e) = self.store.upsert_map(consumers::KNOWN, &new_entries) {
                warn!("failed to persist {} known-token rows: {}", new_entries.len(), e);
            }
            info!(
                "[discover] +{} new | total known: {}",
                new_entries.len(),
                self.state.known_count().await
            );
        }

        // 5. Age out tokens past every filter's horizon, store first.
        let cutoff = now_ms()
            - ((self.config.max_age_hours + self.config.cleanup_buffer_hours) * MS_PER_HOUR)
                as i64;
        match self.store.delete_where_older(consumers::KNOWN, cutoff) {
            Ok(removed) if removed > 0 => info!("[cleanup] removed {} expired known tokens", removed),
            Ok(_) => {}
            Err(e) => warn!("known-token cleanup failed: {}", e),
        }
        report.purged = self.state.purge_known(cutoff).await.len();

        // 6. Re-check everything still known and merge once more.
        let known = self.state.known_addresses().await;
        info!("[recheck] {} known addresses", known.len());
        let mut merged = merged_deduped;
        merged.extend(snapshots_or_empty(
            self.market.fetch_by_addresses(&known).await,
            "known recheck",
        ));
        let unique = dedup_by_pair(merged);

        report.unique_pairs = unique.len();
        info!("[total] {} unique pairs", unique.len());
        (unique, report)
    }
}
