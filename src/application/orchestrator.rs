//! Orchestrator
//!
//! Restores persisted state, pre-populates empty filter ledgers, sends the
//! startup banner and spawns the long-running activities: the discovery
//! loop, the graduation stream + handler, one staggered watcher per filter
//! and the command listener. Tasks share only [`SharedState`] and the
//! store; shutdown is cooperative through the `is_running` flag.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::adapters::pumpportal::{PumpPortalStream, StreamConfig};
use crate::adapters::telegram::format::startup_banner;
use crate::config::Config;
use crate::domain::{FilterLedger, KnownTokenRegistry};
use crate::ports::market_data::MarketDataPort;
use crate::ports::messenger::MessengerPort;
use crate::ports::store::{consumers, StateStore, StoreError};

use super::commands::CommandRouter;
use super::discovery::{DiscoveryAggregator, DiscoveryConfig};
use super::graduation::GraduationHandler;
use super::state::SharedState;
use super::watcher::FilterWatcher;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("configuration error: {0}")]
    Config(String),
}

/// Status snapshot for diagnostic surfaces.
#[derive(Debug, Clone)]
pub struct OrchestratorStatus {
    pub is_running: bool,
    pub known_tokens: usize,
    pub graduated_tokens: usize,
    pub last_cycle: String,
}

pub struct Orchestrator {
    config: Config,
    market: Arc<dyn MarketDataPort>,
    messenger: Arc<dyn MessengerPort>,
    store: Arc<dyn StateStore>,
    state: Arc<SharedState>,
    is_running: Arc<RwLock<bool>>,
}

impl Orchestrator {
    pub fn new(
        config: Config,
        market: Arc<dyn MarketDataPort>,
        messenger: Arc<dyn MessengerPort>,
        store: Arc<dyn StateStore>,
    ) -> Result<Self, OrchestratorError> {
        config
            .validate()
            .map_err(|e| OrchestratorError::Config(e.to_string()))?;

        let state = Arc::new(SharedState::new(&config.filters));
        Ok(Self {
            config,
            market,
            messenger,
            store,
            state,
            is_running: Arc::new(RwLock::new(false)),
        })
    }

    pub fn state(&self) -> Arc<SharedState> {
        Arc::clone(&self.state)
    }

    /// Run until [`stop`](Self::stop) is called.
    pub async fn run(&self) -> Result<(), OrchestratorError> {
        *self.is_running.write().await = true;

        self.restore_state().await;
        let watchers = self.build_watchers().await;

        let banner = startup_banner(
            &self.config.filters,
            self.config.service.poll_interval_secs,
            self.config.stream.enabled,
        );
        if let Err(e) = self.messenger.send(&banner, false).await {
            warn!("startup banner send failed: {}", e);
        }

        let mut handles: Vec<JoinHandle<()>> = Vec::new();
        handles.push(self.spawn_discovery_loop());
        handles.extend(self.spawn_stream());
        handles.extend(self.spawn_watchers(watchers));
        handles.push(self.spawn_command_listener()?);

        info!(
            "pumpwatch running: {} filter(s), discovery every {}s",
            self.config.filters.len(),
            self.config.service.poll_interval_secs
        );

        for handle in handles {
            if let Err(e) = handle.await {
                error!("task ended abnormally: {}", e);
            }
        }
        info!("pumpwatch stopped");
        Ok(())
    }

    /// Signal every loop to end after its current cycle.
    pub async fn stop(&self) {
        *self.is_running.write().await = false;
        info!("stop signal sent");
    }

    pub async fn status(&self) -> OrchestratorStatus {
        OrchestratorStatus {
            is_running: *self.is_running.read().await,
            known_tokens: self.state.known_count().await,
            graduated_tokens: self.state.graduated_count().await,
            last_cycle: self.state.last_cycle().await,
        }
    }

    /// Rebuild the in-memory mirrors from the store. A corrupted or
    /// unreadable record degrades to an empty one: the service re-derives
    /// it over the next cycles rather than refusing to start.
    async fn restore_state(&self) {
        let known = match self.store.load_map(consumers::KNOWN) {
            Ok(known) => known,
            Err(e) => {
                warn!("known-token state unavailable, starting empty: {}", e);
                Default::default()
            }
        };
        let graduated = match self.store.load_set(consumers::GRADUATED) {
            Ok(graduated) => graduated,
            Err(e) => {
                warn!("graduated state unavailable, starting empty: {}", e);
                Default::default()
            }
        };

        info!(
            "restored state: {} known token(s), {} graduated",
            known.len(),
            graduated.len()
        );
        self.state
            .restore(KnownTokenRegistry::from_entries(known), graduated)
            .await;
    }

    fn load_set_or_empty(&self, consumer: &str) -> HashSet<String> {
        match self.store.load_set(consumer) {
            Ok(set) => set,
            Err(e @ StoreError::Corrupted { .. }) => {
                warn!("{}", e);
                HashSet::new()
            }
            Err(e) => {
                warn!("state load failed: {}", e);
                HashSet::new()
            }
        }
    }

    async fn build_watchers(&self) -> Vec<Arc<FilterWatcher>> {
        let mut watchers = Vec::new();
        for filter in &self.config.filters {
            let ledger = FilterLedger::restore(
                self.load_set_or_empty(&consumers::currently(&filter.key)),
                self.load_set_or_empty(&consumers::expired(&filter.key)),
            );
            let seen = self.load_set_or_empty(&consumers::seen(&filter.key));

            let watcher = Arc::new(FilterWatcher::new(
                filter.clone(),
                Arc::clone(&self.market),
                Arc::clone(&self.messenger),
                Arc::clone(&self.store),
                Arc::clone(&self.state),
                ledger,
                seen,
                Duration::from_secs(self.config.service.filter_poll_secs),
            ));

            // First deployment for this filter: mark what already passes
            // so the launch does not flood the channel.
            if watcher.needs_initial_scan().await {
                watcher.initial_scan().await;
            }
            watchers.push(watcher);
        }
        watchers
    }

    fn spawn_discovery_loop(&self) -> JoinHandle<()> {
        let aggregator = DiscoveryAggregator::new(
            Arc::clone(&self.market),
            Arc::clone(&self.store),
            Arc::clone(&self.state),
            DiscoveryConfig {
                search_queries: self.config.provider.search_queries.clone(),
                max_age_hours: self.config.max_filter_age_hours(),
                cleanup_buffer_hours: self.config.service.cleanup_buffer_hours,
            },
        );
        let state = Arc::clone(&self.state);
        let running = Arc::clone(&self.is_running);
        let interval = Duration::from_secs(self.config.service.poll_interval_secs);

        tokio::spawn(async move {
            while *running.read().await {
                let started = Instant::now();
                info!("=== discovery cycle ===");
                let (_, report) = aggregator.run_cycle().await;
                state.mark_cycle().await;
                info!(
                    "discovery cycle done in {:.1}s: {} unique pairs, +{} known, -{} purged",
                    started.elapsed().as_secs_f64(),
                    report.unique_pairs,
                    report.newly_known,
                    report.purged
                );
                tokio::time::sleep(interval).await;
            }
        })
    }

    fn spawn_stream(&self) -> Vec<JoinHandle<()>> {
        if !self.config.stream.enabled {
            info!("graduation stream disabled");
            return Vec::new();
        }

        let (stream, events) = PumpPortalStream::new(StreamConfig {
            ws_url: self.config.stream.ws_url.clone(),
            reconnect_delay: Duration::from_secs(self.config.stream.reconnect_secs),
        });
        let handler = GraduationHandler::new(
            Arc::clone(&self.market),
            Arc::clone(&self.messenger),
            Arc::clone(&self.store),
            Arc::clone(&self.state),
            self.config.stream.meta_retries,
            Duration::from_secs(self.config.stream.meta_retry_delay_secs),
        );
        let running = Arc::clone(&self.is_running);

        vec![
            tokio::spawn(async move { stream.run().await }),
            tokio::spawn(async move { handler.run(events, running).await }),
        ]
    }

    fn spawn_watchers(&self, watchers: Vec<Arc<FilterWatcher>>) -> Vec<JoinHandle<()>> {
        // Stagger loop starts to spread provider load across the interval.
        let count = watchers.len().max(1) as u32;
        let stagger = Duration::from_secs(self.config.service.filter_poll_secs) / count;

        watchers
            .into_iter()
            .enumerate()
            .map(|(i, watcher)| {
                let running = Arc::clone(&self.is_running);
                let delay = stagger * (i as u32);
                tokio::spawn(async move { watcher.run(running, delay).await })
            })
            .collect()
    }

    fn spawn_command_listener(&self) -> Result<JoinHandle<()>, OrchestratorError> {
        let chat_id = self
            .config
            .telegram
            .chat_id_i64()
            .ok_or_else(|| OrchestratorError::Config("chat id is not an integer".to_string()))?;

        let router = CommandRouter::new(
            Arc::clone(&self.messenger),
            Arc::clone(&self.market),
            Arc::clone(&self.state),
            self.config.filters.clone(),
            chat_id,
        );
        let running = Arc::clone(&self.is_running);

        Ok(tokio::spawn(async move { router.run(running).await }))
    }
}
