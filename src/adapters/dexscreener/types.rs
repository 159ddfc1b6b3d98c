//! DexScreener Wire Types
//!
//! Raw response shapes for the endpoints we consume, decoded leniently:
//! every field the API may omit is an `Option`, and conversion into the
//! normalized [`TokenSnapshot`] never fails.

use serde::Deserialize;

use crate::domain::TokenSnapshot;

#[derive(Debug, Deserialize)]
pub(crate) struct PairsEnvelope {
    #[serde(default)]
    pub pairs: Option<Vec<RawPair>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawPair {
    pub chain_id: Option<String>,
    pub dex_id: Option<String>,
    pub url: Option<String>,
    pub pair_address: Option<String>,
    pub base_token: Option<RawToken>,
    pub price_usd: Option<String>,
    pub txns: Option<RawTxns>,
    pub volume: Option<RawWindows>,
    pub price_change: Option<RawWindows>,
    pub liquidity: Option<RawLiquidity>,
    pub fdv: Option<f64>,
    pub market_cap: Option<f64>,
    pub pair_created_at: Option<i64>,
    pub info: Option<RawInfo>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawToken {
    pub address: Option<String>,
    pub name: Option<String>,
    pub symbol: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawTxns {
    pub m5: Option<RawTxnCounts>,
    pub h1: Option<RawTxnCounts>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawTxnCounts {
    pub buys: Option<u64>,
    pub sells: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawWindows {
    pub m5: Option<f64>,
    pub h1: Option<f64>,
    pub h6: Option<f64>,
    pub h24: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawLiquidity {
    pub usd: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawInfo {
    pub image_url: Option<String>,
    pub websites: Option<Vec<RawWebsite>>,
    pub socials: Option<Vec<RawSocial>>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawWebsite {
    pub url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawSocial {
    pub platform: Option<String>,
    pub handle: Option<String>,
    /// Newer payloads carry a ready-made URL instead of platform/handle.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub url: Option<String>,
}

impl RawSocial {
    fn platform_name(&self) -> String {
        self.platform
            .as_deref()
            .or(self.kind.as_deref())
            .unwrap_or_default()
            .to_lowercase()
    }

    /// Resolve the social entry to a full URL, building one from the handle
    /// when the payload only carries platform + handle.
    fn resolve_url(&self) -> Option<String> {
        if let Some(url) = &self.url {
            if !url.is_empty() {
                return Some(url.clone());
            }
        }
        let handle = self.handle.as_deref().filter(|h| !h.is_empty())?;
        let platform = self.platform_name();
        if platform.contains("twitter") {
            Some(format!("https://twitter.com/{handle}"))
        } else if platform.contains("telegram") {
            Some(format!("https://t.me/{handle}"))
        } else {
            None
        }
    }
}

impl RawPair {
    pub(crate) fn into_snapshot(self) -> TokenSnapshot {
        let mut snapshot = TokenSnapshot::default();

        if let Some(base) = self.base_token {
            snapshot.address = base.address.unwrap_or_default();
            snapshot.name = base.name.unwrap_or_default();
            snapshot.symbol = base.symbol.unwrap_or_default();
        }

        snapshot.chain_id = self.chain_id.unwrap_or_default();
        snapshot.venue_id = self.dex_id.unwrap_or_default();
        snapshot.pair_address = self.pair_address.unwrap_or_default();
        snapshot.url = self.url;
        snapshot.price_usd = self.price_usd.and_then(|p| p.parse().ok());
        snapshot.market_cap_usd = self.market_cap;
        snapshot.fdv_usd = self.fdv;
        snapshot.liquidity_usd = self.liquidity.and_then(|l| l.usd);
        snapshot.pair_created_at_ms = self.pair_created_at;

        if let Some(volume) = self.volume {
            snapshot.volume_24h_usd = volume.h24;
        }

        if let Some(change) = self.price_change {
            snapshot.price_change_5m_pct = change.m5;
            snapshot.price_change_1h_pct = change.h1;
            snapshot.price_change_6h_pct = change.h6;
            snapshot.price_change_24h_pct = change.h24;
        }

        if let Some(txns) = self.txns {
            if let Some(m5) = txns.m5 {
                snapshot.txns_5m_buys = m5.buys;
                snapshot.txns_5m_sells = m5.sells;
            }
            if let Some(h1) = txns.h1 {
                snapshot.txns_1h_buys = h1.buys;
                snapshot.txns_1h_sells = h1.sells;
            }
        }

        if let Some(info) = self.info {
            snapshot.image_url = info.image_url.filter(|u| !u.is_empty());
            snapshot.website_url = info
                .websites
                .unwrap_or_default()
                .into_iter()
                .find_map(|w| w.url.filter(|u| !u.is_empty()));
            for social in info.socials.unwrap_or_default() {
                let platform = social.platform_name();
                if platform.contains("twitter") && snapshot.twitter_url.is_none() {
                    snapshot.twitter_url = social.resolve_url();
                } else if platform.contains("telegram") && snapshot.telegram_url.is_none() {
                    snapshot.telegram_url = social.resolve_url();
                }
            }
        }

        snapshot
    }
}

/// One entry of the token-profiles / token-boosts discovery feeds.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawFeedItem {
    pub chain_id: Option<String>,
    pub token_address: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAIR_JSON: &str = r#"{
        "chainId": "solana",
        "dexId": "pumpswap",
        "url": "https://dexscreener.com/solana/Pair111",
        "pairAddress": "Pair111",
        "baseToken": {
            "address": "Mint111",
            "name": "Test Meme",
            "symbol": "MEME"
        },
        "priceUsd": "0.0015",
        "txns": {
            "m5": {"buys": 12, "sells": 7},
            "h1": {"buys": 80, "sells": 55}
        },
        "volume": {"h24": 150000.5},
        "priceChange": {"m5": 1.2, "h1": -3.4, "h6": 8.0, "h24": 12.0},
        "liquidity": {"usd": 42000.0},
        "fdv": 900000.0,
        "marketCap": 500000.0,
        "pairCreatedAt": 1700000000000,
        "info": {
            "imageUrl": "https://img.example/meme.png",
            "websites": [{"url": "https://meme.example"}],
            "socials": [
                {"platform": "twitter", "handle": "meme"},
                {"platform": "telegram", "handle": "memechat"}
            ]
        }
    }"#;

    #[test]
    fn test_full_pair_decodes_to_snapshot() {
        let raw: RawPair = serde_json::from_str(PAIR_JSON).unwrap();
        let snap = raw.into_snapshot();

        assert_eq!(snap.address, "Mint111");
        assert_eq!(snap.pair_address, "Pair111");
        assert_eq!(snap.chain_id, "solana");
        assert_eq!(snap.venue_id, "pumpswap");
        assert_eq!(snap.symbol, "MEME");
        assert_eq!(snap.price_usd, Some(0.0015));
        assert_eq!(snap.market_cap_usd, Some(500_000.0));
        assert_eq!(snap.fdv_usd, Some(900_000.0));
        assert_eq!(snap.liquidity_usd, Some(42_000.0));
        assert_eq!(snap.volume_24h_usd, Some(150_000.5));
        assert_eq!(snap.price_change_24h_pct, Some(12.0));
        assert_eq!(snap.price_change_1h_pct, Some(-3.4));
        assert_eq!(snap.txns_5m_buys, Some(12));
        assert_eq!(snap.txns_1h_sells, Some(55));
        assert_eq!(snap.pair_created_at_ms, Some(1_700_000_000_000));
        assert_eq!(snap.website_url.as_deref(), Some("https://meme.example"));
        assert_eq!(snap.twitter_url.as_deref(), Some("https://twitter.com/meme"));
        assert_eq!(snap.telegram_url.as_deref(), Some("https://t.me/memechat"));
        assert!(snap.has_profile());
    }

    #[test]
    fn test_sparse_pair_decodes_without_error() {
        let raw: RawPair = serde_json::from_str(r#"{"pairAddress": "P1"}"#).unwrap();
        let snap = raw.into_snapshot();
        assert_eq!(snap.pair_address, "P1");
        assert!(snap.address.is_empty());
        assert!(snap.price_usd.is_none());
        assert!(snap.pair_created_at_ms.is_none());
        assert!(!snap.has_profile());
    }

    #[test]
    fn test_unparseable_price_becomes_none() {
        let raw: RawPair =
            serde_json::from_str(r#"{"pairAddress": "P1", "priceUsd": "n/a"}"#).unwrap();
        assert!(raw.into_snapshot().price_usd.is_none());
    }

    #[test]
    fn test_socials_with_type_and_url_shape() {
        let json = r#"{
            "pairAddress": "P1",
            "info": {"socials": [
                {"type": "twitter", "url": "https://x.com/meme"},
                {"type": "telegram", "url": "https://t.me/memechat"}
            ]}
        }"#;
        let snap: TokenSnapshot = serde_json::from_str::<RawPair>(json)
            .unwrap()
            .into_snapshot();
        assert_eq!(snap.twitter_url.as_deref(), Some("https://x.com/meme"));
        assert_eq!(snap.telegram_url.as_deref(), Some("https://t.me/memechat"));
    }

    #[test]
    fn test_pairs_envelope_with_null_pairs() {
        let env: PairsEnvelope = serde_json::from_str(r#"{"pairs": null}"#).unwrap();
        assert!(env.pairs.is_none());

        let env: PairsEnvelope = serde_json::from_str(r#"{"pairs": []}"#).unwrap();
        assert_eq!(env.pairs.unwrap().len(), 0);
    }

    #[test]
    fn test_feed_item_decoding() {
        let item: RawFeedItem = serde_json::from_str(
            r#"{"chainId": "solana", "tokenAddress": "Mint111", "icon": "x"}"#,
        )
        .unwrap();
        assert_eq!(item.chain_id.as_deref(), Some("solana"));
        assert_eq!(item.token_address.as_deref(), Some("Mint111"));
    }
}
