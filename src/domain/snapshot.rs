//! Normalized Token Snapshots
//!
//! A [`TokenSnapshot`] is the ephemeral, per-cycle view of one trading pair
//! as reported by the market-data provider. Snapshots are rebuilt on every
//! poll and never persisted as a whole; only the base-token address and the
//! creation timestamp survive a cycle (see [`super::registry`]).

use serde::{Deserialize, Serialize};

use super::MS_PER_HOUR;

/// Normalized view of one trading pair.
///
/// Every numeric field the provider may omit is an `Option`; consumers
/// decide per clause how a missing value degrades (see [`super::filter`]).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenSnapshot {
    /// Base token mint address.
    pub address: String,
    /// Pair (pool) address, distinct from the token's own address.
    pub pair_address: String,
    /// Chain identifier, e.g. "solana".
    pub chain_id: String,
    /// Venue (DEX program) identifier, e.g. "pumpswap".
    pub venue_id: String,
    pub name: String,
    pub symbol: String,
    pub price_usd: Option<f64>,
    pub market_cap_usd: Option<f64>,
    pub fdv_usd: Option<f64>,
    pub liquidity_usd: Option<f64>,
    pub volume_24h_usd: Option<f64>,
    pub price_change_5m_pct: Option<f64>,
    pub price_change_1h_pct: Option<f64>,
    pub price_change_6h_pct: Option<f64>,
    pub price_change_24h_pct: Option<f64>,
    pub txns_5m_buys: Option<u64>,
    pub txns_5m_sells: Option<u64>,
    pub txns_1h_buys: Option<u64>,
    pub txns_1h_sells: Option<u64>,
    /// Pair creation time in epoch milliseconds. `None` = not yet known.
    pub pair_created_at_ms: Option<i64>,
    /// Provider's own chart URL for the pair.
    pub url: Option<String>,
    pub image_url: Option<String>,
    pub website_url: Option<String>,
    pub twitter_url: Option<String>,
    pub telegram_url: Option<String>,
}

impl TokenSnapshot {
    /// Market cap with FDV fallback; 0 when neither is reported.
    pub fn effective_market_cap(&self) -> f64 {
        self.market_cap_usd.or(self.fdv_usd).unwrap_or(0.0)
    }

    /// A token "has a profile" when the provider shows an image, a website
    /// or at least one social link for it.
    pub fn has_profile(&self) -> bool {
        self.image_url.is_some()
            || self.website_url.is_some()
            || self.twitter_url.is_some()
            || self.telegram_url.is_some()
    }

    /// Pair age in hours, `None` while the creation time is unknown.
    pub fn age_hours(&self, now_ms: i64) -> Option<f64> {
        match self.pair_created_at_ms {
            Some(created) if created > 0 => Some((now_ms - created) as f64 / MS_PER_HOUR),
            _ => None,
        }
    }

    /// Deduplication key: pair address, falling back to the base-token
    /// address when the provider omitted the pair address.
    pub fn dedup_key(&self) -> Option<&str> {
        if !self.pair_address.is_empty() {
            Some(&self.pair_address)
        } else if !self.address.is_empty() {
            Some(&self.address)
        } else {
            None
        }
    }
}

/// Deduplicate a merged discovery result by pair address (base-token address
/// as fallback). The first occurrence wins; later duplicates are dropped, as
/// are entries with no usable key at all.
pub fn dedup_by_pair(snapshots: Vec<TokenSnapshot>) -> Vec<TokenSnapshot> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(snapshots.len());
    for snap in snapshots {
        let Some(key) = snap.dedup_key() else {
            continue;
        };
        if seen.insert(key.to_string()) {
            out.push(snap);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn snap(address: &str, pair: &str) -> TokenSnapshot {
        TokenSnapshot {
            address: address.to_string(),
            pair_address: pair.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_effective_market_cap_prefers_market_cap() {
        let mut s = snap("a", "p");
        s.market_cap_usd = Some(500_000.0);
        s.fdv_usd = Some(900_000.0);
        assert_eq!(s.effective_market_cap(), 500_000.0);
    }

    #[test]
    fn test_effective_market_cap_falls_back_to_fdv() {
        let mut s = snap("a", "p");
        s.fdv_usd = Some(900_000.0);
        assert_eq!(s.effective_market_cap(), 900_000.0);

        s.fdv_usd = None;
        assert_eq!(s.effective_market_cap(), 0.0);
    }

    #[test]
    fn test_has_profile() {
        let mut s = snap("a", "p");
        assert!(!s.has_profile());

        s.twitter_url = Some("https://twitter.com/x".to_string());
        assert!(s.has_profile());

        s.twitter_url = None;
        s.image_url = Some("https://img".to_string());
        assert!(s.has_profile());
    }

    #[test]
    fn test_age_hours() {
        let now = 1_700_000_000_000i64;
        let mut s = snap("a", "p");
        assert!(s.age_hours(now).is_none());

        s.pair_created_at_ms = Some(0);
        assert!(s.age_hours(now).is_none());

        s.pair_created_at_ms = Some(now - 48 * 3_600_000);
        assert_relative_eq!(s.age_hours(now).unwrap(), 48.0, epsilon = 1e-9);
    }

    #[test]
    fn test_dedup_first_occurrence_wins() {
        let mut first = snap("tokenA", "P1");
        first.name = "first".to_string();
        let mut second = snap("tokenB", "P1");
        second.name = "second".to_string();

        let out = dedup_by_pair(vec![first, second, snap("tokenC", "P2")]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].name, "first");
        assert_eq!(out[1].pair_address, "P2");
    }

    #[test]
    fn test_dedup_is_idempotent() {
        let input = vec![
            snap("a", "P1"),
            snap("b", "P1"),
            snap("c", "P2"),
            snap("c", "P2"),
        ];
        let once = dedup_by_pair(input);
        let twice = dedup_by_pair(once.clone());
        assert_eq!(once.len(), twice.len());
        let keys: Vec<_> = once.iter().map(|s| s.pair_address.clone()).collect();
        let keys2: Vec<_> = twice.iter().map(|s| s.pair_address.clone()).collect();
        assert_eq!(keys, keys2);
    }

    #[test]
    fn test_dedup_malformed_duplicate_pair() {
        // Two discovery calls return the same pair address with the base
        // token missing entirely; exactly one entry survives, the first.
        let mut first = snap("", "P1");
        first.symbol = "ONE".to_string();
        let mut second = snap("", "P1");
        second.symbol = "TWO".to_string();

        let out = dedup_by_pair(vec![first, second]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].symbol, "ONE");
    }

    #[test]
    fn test_dedup_falls_back_to_token_address() {
        let a = snap("tokenA", "");
        let b = snap("tokenA", "");
        let out = dedup_by_pair(vec![a, b]);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_dedup_drops_keyless_entries() {
        let out = dedup_by_pair(vec![snap("", ""), snap("a", "P1")]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].pair_address, "P1");
    }
}
