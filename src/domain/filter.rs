//! Filter Evaluation
//!
//! A [`FilterConfig`] names one market-condition filter; [`passes`] is the
//! pure predicate deciding whether a snapshot currently satisfies it.
//! Missing or malformed provider fields degrade to failing the clause they
//! belong to instead of erroring out of a cycle.

use serde::{Deserialize, Serialize};

use super::snapshot::TokenSnapshot;

/// What to do with the age clause while the pair creation time is unknown.
///
/// The provider learns creation times asynchronously, so fresh tokens can
/// sit without one for several cycles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnknownAgePolicy {
    /// Skip the age clause; the token is judged on the other criteria only.
    #[default]
    Pass,
    /// Treat an unknown age as failing the filter outright.
    Fail,
}

/// How often one address may alert for one filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlertPolicy {
    /// At most one alert per address, ever, even across re-entries.
    #[default]
    OnceEver,
    /// One alert per entry event; leaving and re-entering re-alerts.
    OnEntry,
}

/// Immutable configuration of one filter, loaded once at startup from the
/// `[[filters]]` array in config.toml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Short unique key, also used to namespace persisted state.
    pub key: String,
    /// Human-readable label used in alert and status messages.
    pub label: String,
    #[serde(default)]
    pub min_market_cap: f64,
    /// Omitted in TOML = unbounded.
    #[serde(default = "default_max_market_cap")]
    pub max_market_cap: f64,
    #[serde(default)]
    pub min_age_hours: f64,
    #[serde(default = "default_max_age_hours")]
    pub max_age_hours: f64,
    #[serde(default)]
    pub min_volume_24h: f64,
    #[serde(default)]
    pub min_change_24h_pct: f64,
    #[serde(default)]
    pub require_profile: bool,
    #[serde(default)]
    pub unknown_age: UnknownAgePolicy,
    #[serde(default)]
    pub alert_policy: AlertPolicy,
}

fn default_max_market_cap() -> f64 {
    f64::INFINITY
}

fn default_max_age_hours() -> f64 {
    720.0
}

impl FilterConfig {
    /// One-line summary used in banners and /help replies.
    pub fn summary(&self) -> String {
        let max_mcap = if self.max_market_cap.is_finite() {
            format!("${:.0}K", self.max_market_cap / 1_000.0)
        } else {
            "unlimited".to_string()
        };
        format!(
            "MCap ${:.0}K-{} | Vol >=${:.0}K | 24H >={:+.0}% | Age {:.0}-{:.0}h{}",
            self.min_market_cap / 1_000.0,
            max_mcap,
            self.min_volume_24h / 1_000.0,
            self.min_change_24h_pct,
            self.min_age_hours,
            self.max_age_hours,
            if self.require_profile { " | Has profile" } else { "" },
        )
    }
}

/// Pure predicate: does `snapshot` satisfy `cfg` at wall-clock `now_ms`?
///
/// All bounds are inclusive. Market cap falls back to FDV; missing volume
/// and change values count as 0, which fails any positive floor.
pub fn passes(snapshot: &TokenSnapshot, cfg: &FilterConfig, now_ms: i64) -> bool {
    let mcap = snapshot.effective_market_cap();
    if mcap < cfg.min_market_cap || mcap > cfg.max_market_cap {
        return false;
    }

    if snapshot.volume_24h_usd.unwrap_or(0.0) < cfg.min_volume_24h {
        return false;
    }

    if snapshot.price_change_24h_pct.unwrap_or(0.0) < cfg.min_change_24h_pct {
        return false;
    }

    match snapshot.age_hours(now_ms) {
        Some(age) => {
            if age < cfg.min_age_hours || age > cfg.max_age_hours {
                return false;
            }
        }
        None => {
            if cfg.unknown_age == UnknownAgePolicy::Fail {
                return false;
            }
        }
    }

    if cfg.require_profile && !snapshot.has_profile() {
        return false;
    }

    true
}
