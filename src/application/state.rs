//! Shared Mutable State
//!
//! The one state object every task receives. Each logical structure sits
//! behind its own `RwLock`; locks are taken for the duration of a snapshot
//! or replace and never across network I/O.

use std::collections::{BTreeMap, HashSet};

use tokio::sync::RwLock;

use crate::domain::{FilterConfig, KnownTokenRegistry, TokenSnapshot};

/// Wall-clock stamp used in operator-facing messages.
pub fn now_stamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Read-only view of one filter's last cycle, served to status queries.
#[derive(Debug, Clone, Default)]
pub struct FilterStatus {
    pub key: String,
    pub label: String,
    /// Currently passing snapshots, sorted by market cap descending.
    pub passing: Vec<TokenSnapshot>,
    pub expired_count: usize,
    pub updated_at: Option<String>,
}

pub struct SharedState {
    registry: RwLock<KnownTokenRegistry>,
    graduated: RwLock<HashSet<String>>,
    filters: RwLock<BTreeMap<String, FilterStatus>>,
    last_cycle: RwLock<Option<String>>,
}

impl SharedState {
    pub fn new(filters: &[FilterConfig]) -> Self {
        let statuses: BTreeMap<String, FilterStatus> = filters
            .iter()
            .map(|f| {
                (
                    f.key.clone(),
                    FilterStatus {
                        key: f.key.clone(),
                        label: f.label.clone(),
                        ..Default::default()
                    },
                )
            })
            .collect();

        Self {
            registry: RwLock::new(KnownTokenRegistry::new()),
            graduated: RwLock::new(HashSet::new()),
            filters: RwLock::new(statuses),
            last_cycle: RwLock::new(None),
        }
    }

    /// Load the persisted mirrors on startup.
    pub async fn restore(&self, registry: KnownTokenRegistry, graduated: HashSet<String>) {
        *self.registry.write().await = registry;
        *self.graduated.write().await = graduated;
    }

    /// Record a token sighting; returns whether the persisted row changed.
    pub async fn observe_token(&self, address: &str, created_at_ms: i64) -> bool {
        self.registry.write().await.observe(address, created_at_ms)
    }

    pub async fn known_addresses(&self) -> Vec<String> {
        self.registry.read().await.addresses()
    }

    pub async fn known_count(&self) -> usize {
        self.registry.read().await.len()
    }

    pub async fn purge_known(&self, cutoff_ms: i64) -> Vec<String> {
        self.registry.write().await.purge_older_than(cutoff_ms)
    }

    pub async fn is_graduated(&self, mint: &str) -> bool {
        self.graduated.read().await.contains(mint)
    }

    pub async fn add_graduated(&self, mint: &str) {
        self.graduated.write().await.insert(mint.to_string());
    }

    pub async fn graduated_count(&self) -> usize {
        self.graduated.read().await.len()
    }

    /// Replace one filter's status snapshot after a cycle.
    pub async fn set_filter_status(
        &self,
        key: &str,
        mut passing: Vec<TokenSnapshot>,
        expired_count: usize,
    ) {
        passing.sort_by(|a, b| {
            b.effective_market_cap()
                .partial_cmp(&a.effective_market_cap())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let mut filters = self.filters.write().await;
        if let Some(status) = filters.get_mut(key) {
            status.passing = passing;
            status.expired_count = expired_count;
            status.updated_at = Some(now_stamp());
        }
    }

    pub async fn filter_statuses(&self) -> Vec<FilterStatus> {
        self.filters.read().await.values().cloned().collect()
    }

    pub async fn mark_cycle(&self) {
        *self.last_cycle.write().await = Some(now_stamp());
    }

    pub async fn last_cycle(&self) -> String {
        self.last_cycle
            .read()
            .await
            .clone()
            .unwrap_or_else(|| "never".to_string())
    }
}
