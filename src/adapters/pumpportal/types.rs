//! PumpPortal Wire Types

use serde::{Deserialize, Serialize};

/// Subscription request sent right after connecting.
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeMessage {
    pub method: String,
}

impl SubscribeMessage {
    /// Subscribe to bonding-curve graduation (migration) events.
    pub fn migrations() -> Self {
        Self {
            method: "subscribeMigration".to_string(),
        }
    }
}

/// One "token graduated" event. The feed has carried the mint under
/// different keys over time, so all three are accepted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraduationEvent {
    #[serde(default)]
    pub mint: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub pool: Option<String>,
}

impl GraduationEvent {
    /// The graduated mint address, whichever key it arrived under.
    pub fn mint_address(&self) -> Option<&str> {
        self.mint
            .as_deref()
            .or(self.token.as_deref())
            .or(self.address.as_deref())
            .filter(|a| !a.is_empty())
    }
}
