//! DexScreener API client
//!
//! Endpoints consumed:
//! - `/latest/dex/tokens/{addresses}` - batched lookup, up to 30 addresses
//! - `/latest/dex/search?q={query}`   - free-text pair search
//! - `/token-profiles/latest/v1`      - profile discovery feed
//! - `/token-boosts/latest/v1`        - boost discovery feed
//!
//! Every response is run through the venue/chain predicate before leaving
//! the adapter, so the rest of the service only ever sees pairs on the
//! configured chain and venue.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::types::{PairsEnvelope, RawFeedItem, RawPair};
use crate::domain::TokenSnapshot;
use crate::ports::market_data::{DiscoveryFeed, MarketDataError, MarketDataPort};

/// Provider limit on addresses per batched lookup.
pub const MAX_ADDRESSES_PER_REQUEST: usize = 30;

/// Pause between consecutive batch requests, to stay under the provider's
/// unauthenticated rate limit.
const BATCH_DELAY_MS: u64 = 300;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; PumpWatch/1.0)";

pub struct DexScreenerClient {
    http: Client,
    base_url: String,
    chain_id: String,
    venue_marker: String,
}

impl DexScreenerClient {
    pub fn new(
        base_url: &str,
        chain_id: &str,
        venue_marker: &str,
        timeout_secs: u64,
    ) -> Result<Self, MarketDataError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| MarketDataError::Config(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            chain_id: chain_id.to_string(),
            venue_marker: venue_marker.to_lowercase(),
        })
    }

    fn on_chain(&self, pair: &RawPair) -> bool {
        pair.chain_id.as_deref() == Some(self.chain_id.as_str())
    }

    fn on_venue(&self, pair: &RawPair) -> bool {
        pair.dex_id
            .as_deref()
            .unwrap_or_default()
            .to_lowercase()
            .contains(&self.venue_marker)
    }

    /// Strict predicate: right chain and right venue.
    fn filter_venue(&self, pairs: Vec<RawPair>) -> Vec<TokenSnapshot> {
        pairs
            .into_iter()
            .filter(|p| self.on_chain(p) && self.on_venue(p))
            .map(RawPair::into_snapshot)
            .collect()
    }

    /// Venue predicate with chain fallback: when a batch yields pairs on
    /// the right chain but none on the venue (the token migrated pools),
    /// the chain-only matches are kept so the token is not lost.
    fn filter_venue_with_fallback(&self, pairs: Vec<RawPair>) -> Vec<TokenSnapshot> {
        let mut venue_matches = Vec::new();
        let mut chain_matches = Vec::new();
        for pair in pairs {
            if !self.on_chain(&pair) {
                continue;
            }
            if self.on_venue(&pair) {
                venue_matches.push(pair);
            } else {
                chain_matches.push(pair);
            }
        }
        let kept = if venue_matches.is_empty() {
            chain_matches
        } else {
            venue_matches
        };
        kept.into_iter().map(RawPair::into_snapshot).collect()
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, MarketDataError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| MarketDataError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MarketDataError::Status(status.as_u16(), body));
        }

        response
            .json()
            .await
            .map_err(|e| MarketDataError::Parse(e.to_string()))
    }
}

#[async_trait]
impl MarketDataPort for DexScreenerClient {
    async fn fetch_by_addresses(
        &self,
        addresses: &[String],
    ) -> Result<Vec<TokenSnapshot>, MarketDataError> {
        let mut out = Vec::new();
        let mut chunks = addresses.chunks(MAX_ADDRESSES_PER_REQUEST).peekable();

        while let Some(chunk) = chunks.next() {
            let url = format!("{}/latest/dex/tokens/{}", self.base_url, chunk.join(","));
            debug!("fetching {} addresses from DexScreener", chunk.len());

            match self.get_json::<PairsEnvelope>(&url).await {
                Ok(envelope) => {
                    let pairs = envelope.pairs.unwrap_or_default();
                    out.extend(self.filter_venue_with_fallback(pairs));
                }
                // One bad batch must not lose the rest of the cycle's data.
                Err(e) => warn!("batch fetch failed, skipping {} addresses: {}", chunk.len(), e),
            }

            if chunks.peek().is_some() {
                tokio::time::sleep(Duration::from_millis(BATCH_DELAY_MS)).await;
            }
        }

        Ok(out)
    }

    async fn search(&self, query: &str) -> Result<Vec<TokenSnapshot>, MarketDataError> {
        let url = format!("{}/latest/dex/search", self.base_url);
        debug!("searching DexScreener pairs: {:?}", query);

        let response = self
            .http
            .get(&url)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| MarketDataError::Http(e.to_string()))?;

        let status = response.status();
        // The search endpoint answers 400 for queries it does not like;
        // that is "no results", not a failure.
        if status.as_u16() == 400 {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MarketDataError::Status(status.as_u16(), body));
        }

        let envelope: PairsEnvelope = response
            .json()
            .await
            .map_err(|e| MarketDataError::Parse(e.to_string()))?;

        Ok(self.filter_venue(envelope.pairs.unwrap_or_default()))
    }

    async fn discovery_addresses(
        &self,
        feed: DiscoveryFeed,
    ) -> Result<Vec<String>, MarketDataError> {
        let path = match feed {
            DiscoveryFeed::Profiles => "/token-profiles/latest/v1",
            DiscoveryFeed::Boosts => "/token-boosts/latest/v1",
        };
        let url = format!("{}{}", self.base_url, path);
        debug!("pulling {} discovery feed", feed.as_str());

        let items: Vec<RawFeedItem> = self.get_json(&url).await?;

        Ok(items
            .into_iter()
            .filter(|item| item.chain_id.as_deref() == Some(self.chain_id.as_str()))
            .filter_map(|item| item.token_address.filter(|a| !a.is_empty()))
            .collect())
    }
}
