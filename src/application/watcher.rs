//! Per-Filter Watcher
//!
//! One watcher per configured filter, each on its own staggered loop. A
//! cycle fetches snapshots for every known address not yet expired for this
//! filter, ages out tokens past the ceiling, diffs the passing set against
//! the previous cycle and alerts the entrants, then persists both sets with
//! replace semantics so a restart never re-alerts.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::adapters::telegram::format;
use crate::domain::{now_ms, passes, AlertPolicy, FilterConfig, FilterLedger, TokenSnapshot};
use crate::ports::market_data::{snapshots_or_empty, MarketDataPort};
use crate::ports::messenger::MessengerPort;
use crate::ports::store::{consumers, StateStore};

use super::state::SharedState;

/// Pause between consecutive alert sends, to stay polite to the channel.
const ALERT_DELAY_MS: u64 = 500;

/// Counters from one watcher cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub checked: usize,
    pub passing: usize,
    pub entered: usize,
    pub alerted: usize,
    pub newly_expired: usize,
}

pub struct FilterWatcher {
    filter: FilterConfig,
    market: Arc<dyn MarketDataPort>,
    messenger: Arc<dyn MessengerPort>,
    store: Arc<dyn StateStore>,
    state: Arc<SharedState>,
    ledger: RwLock<FilterLedger>,
    seen: RwLock<HashSet<String>>,
    poll_interval: Duration,
}

impl FilterWatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        filter: FilterConfig,
        market: Arc<dyn MarketDataPort>,
        messenger: Arc<dyn MessengerPort>,
        store: Arc<dyn StateStore>,
        state: Arc<SharedState>,
        ledger: FilterLedger,
        seen: HashSet<String>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            filter,
            market,
            messenger,
            store,
            state,
            ledger: RwLock::new(ledger),
            seen: RwLock::new(seen),
            poll_interval,
        }
    }

    pub fn key(&self) -> &str {
        &self.filter.key
    }

    /// True when nothing was restored from the store for this filter.
    pub async fn needs_initial_scan(&self) -> bool {
        self.ledger.read().await.is_empty()
    }

    /// First-run pre-population: record the tokens that already pass the
    /// filter without alerting them, so a fresh deployment does not flood
    /// the channel with everything that currently matches.
    pub async fn initial_scan(&self) {
        let addresses = self.state.known_addresses().await;
        if addresses.is_empty() {
            return;
        }
        info!("[{}] initial scan of {} tokens", self.filter.key, addresses.len());

        let snapshots = snapshots_or_empty(
            self.market.fetch_by_addresses(&addresses).await,
            "initial scan fetch",
        );
        let now = now_ms();
        let passing: HashSet<String> = snapshots
            .iter()
            .filter(|s| !s.address.is_empty() && passes(s, &self.filter, now))
            .map(|s| s.address.clone())
            .collect();

        let currently = {
            let mut ledger = self.ledger.write().await;
            ledger.advance(passing);
            ledger.currently().clone()
        };

        if let Err(e) = self
            .store
            .save_set(&consumers::currently(&self.filter.key), &currently)
        {
            warn!("[{}] failed to persist initial scan: {}", self.filter.key, e);
        }
        info!(
            "[{}] {} tokens currently passing (will not re-alert these)",
            self.filter.key,
            currently.len()
        );
    }

    /// Staggered evaluation loop; runs until the shared flag flips.
    pub async fn run(&self, running: Arc<RwLock<bool>>, initial_delay: Duration) {
        if !initial_delay.is_zero() {
            debug!(
                "[{}] waiting {:?} before first cycle (stagger)",
                self.filter.key, initial_delay
            );
            tokio::time::sleep(initial_delay).await;
        }
        info!(
            "[{}] filter loop started (every {}s) — {}",
            self.filter.key,
            self.poll_interval.as_secs(),
            self.filter.label
        );

        while *running.read().await {
            let report = self.tick().await;
            if report.entered > 0 || report.newly_expired > 0 {
                info!(
                    "[{}] {} passing, {} just entered, {} alerted, {} expired",
                    self.filter.key,
                    report.passing,
                    report.entered,
                    report.alerted,
                    report.newly_expired
                );
            }
            tokio::time::sleep(self.poll_interval).await;
        }
        info!("[{}] filter loop stopped", self.filter.key);
    }

    /// One evaluation cycle.
    pub async fn tick(&self) -> CycleReport {
        let mut report = CycleReport::default();
        let now = now_ms();

        let known = self.state.known_addresses().await;
        let to_check: Vec<String> = {
            let ledger = self.ledger.read().await;
            known
                .into_iter()
                .filter(|addr| !ledger.is_expired(addr))
                .collect()
        };
        report.checked = to_check.len();
        if to_check.is_empty() {
            return report;
        }

        let snapshots = snapshots_or_empty(
            self.market.fetch_by_addresses(&to_check).await,
            "watcher fetch",
        );

        let mut passing: HashSet<String> = HashSet::new();
        let mut newly_expired: Vec<String> = Vec::new();
        for snapshot in &snapshots {
            if snapshot.address.is_empty() {
                continue;
            }
            if let Some(age) = snapshot.age_hours(now) {
                if age > self.filter.max_age_hours {
                    newly_expired.push(snapshot.address.clone());
                    continue;
                }
            }
            if passes(snapshot, &self.filter, now) {
                passing.insert(snapshot.address.clone());
            }
        }

        // Transition under one lock so the entrants come from a single
        // consistent view of `currently`.
        let (entered, currently, expired) = {
            let mut ledger = self.ledger.write().await;
            for address in &newly_expired {
                ledger.mark_expired(address);
            }
            let entered = ledger.advance(passing);
            (entered, ledger.currently().clone(), ledger.expired().clone())
        };
        report.passing = currently.len();
        report.entered = entered.len();
        report.newly_expired = newly_expired.len();

        report.alerted = self.dispatch_alerts(&entered, &snapshots, now).await;

        // Replace-persist both sets every cycle; a restart reconstructs
        // exact state from these.
        if let Err(e) = self
            .store
            .save_set(&consumers::currently(&self.filter.key), &currently)
        {
            warn!("[{}] failed to persist currently set: {}", self.filter.key, e);
        }
        if let Err(e) = self
            .store
            .save_set(&consumers::expired(&self.filter.key), &expired)
        {
            warn!("[{}] failed to persist expired set: {}", self.filter.key, e);
        }

        let mut status_seen = HashSet::new();
        let status: Vec<TokenSnapshot> = snapshots
            .iter()
            .filter(|s| currently.contains(&s.address) && status_seen.insert(s.address.clone()))
            .cloned()
            .collect();
        self.state
            .set_filter_status(&self.filter.key, status, expired.len())
            .await;

        report
    }

    /// Alert each entrant, honoring the filter's alert policy. The seen
    /// record is written only after a successful send, so a failed delivery
    /// leaves the token eligible for a later entry event instead of going
    /// silently missing.
    async fn dispatch_alerts(
        &self,
        entered: &[String],
        snapshots: &[TokenSnapshot],
        now: i64,
    ) -> usize {
        let mut alerted = 0;
        for address in entered {
            if self.filter.alert_policy == AlertPolicy::OnceEver
                && self.seen.read().await.contains(address)
            {
                continue;
            }

            let Some(snapshot) = snapshots.iter().find(|s| &s.address == address) else {
                continue;
            };

            let text = format::entry_alert(snapshot, &self.filter.label, now);
            match self.messenger.send(&text, true).await {
                Ok(()) => {
                    info!(
                        "[{}] alert: {} | {}",
                        self.filter.key, snapshot.symbol, address
                    );
                    alerted += 1;
                    if self.filter.alert_policy == AlertPolicy::OnceEver {
                        if let Err(e) = self
                            .store
                            .insert_into_set(&consumers::seen(&self.filter.key), address)
                        {
                            warn!("[{}] failed to record seen {}: {}", self.filter.key, address, e);
                        }
                        self.seen.write().await.insert(address.clone());
                    }
                }
                Err(e) => {
                    warn!("[{}] alert send failed for {}: {}", self.filter.key, address, e);
                }
            }
            tokio::time::sleep(Duration::from_millis(ALERT_DELAY_MS)).await;
        }
        alerted
    }
}
