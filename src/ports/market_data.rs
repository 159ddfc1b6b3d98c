//! Market Data Port

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::TokenSnapshot;

/// Market data error type. All variants are transient from the caller's
/// point of view: a failed call means "no data this time", never a reason
/// to abort a cycle.
#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("provider returned status {0}: {1}")]
    Status(u16, String),

    #[error("failed to parse provider response: {0}")]
    Parse(String),

    #[error("client configuration error: {0}")]
    Config(String),
}

/// Which discovery feed to pull addresses from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryFeed {
    /// Latest token profiles (tokens that filled in metadata).
    Profiles,
    /// Latest boosted tokens (paid promotions).
    Boosts,
}

impl DiscoveryFeed {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscoveryFeed::Profiles => "profiles",
            DiscoveryFeed::Boosts => "boosts",
        }
    }
}

/// Read access to the market-data provider. Every method applies the
/// venue/chain predicate before returning, so callers only ever see pairs
/// on the configured chain and venue.
#[async_trait]
pub trait MarketDataPort: Send + Sync {
    /// Batched snapshot lookup by base-token address. Implementations chunk
    /// the input to the provider's per-request limit; one failed chunk is
    /// logged and skipped rather than failing the whole call.
    async fn fetch_by_addresses(
        &self,
        addresses: &[String],
    ) -> Result<Vec<TokenSnapshot>, MarketDataError>;

    /// Free-text pair search.
    async fn search(&self, query: &str) -> Result<Vec<TokenSnapshot>, MarketDataError>;

    /// Base-token addresses surfaced by one of the discovery feeds.
    async fn discovery_addresses(
        &self,
        feed: DiscoveryFeed,
    ) -> Result<Vec<String>, MarketDataError>;
}

/// Soft-fail boundary: collapse a provider error into an empty result.
/// The error is still logged distinctly so operators can tell "nothing
/// matched" from "the provider was down".
pub fn snapshots_or_empty(
    result: Result<Vec<TokenSnapshot>, MarketDataError>,
    context: &str,
) -> Vec<TokenSnapshot> {
    match result {
        Ok(snapshots) => snapshots,
        Err(e) => {
            tracing::warn!("{}: provider error treated as empty result: {}", context, e);
            Vec::new()
        }
    }
}
