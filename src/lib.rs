//! PumpWatch - PumpSwap Token Discovery & Alert Service
//!
//! Tracks the population of PumpSwap (Solana) tokens through DexScreener
//! discovery feeds, free-text search and the PumpPortal graduation stream,
//! evaluates every token against the configured market-condition filters
//! each cycle, and alerts a Telegram channel once per token per qualifying
//! transition - surviving restarts without repeating or missing alerts.
//!
//! # Modules
//!
//! - `domain`: Pure logic (TokenSnapshot, filters, registry, alert ledger)
//! - `ports`: Trait abstractions (MarketDataPort, MessengerPort, StateStore)
//! - `adapters`: External implementations (DexScreener, Telegram, PumpPortal, JSON store)
//! - `config`: Configuration loading and validation
//! - `application`: Discovery cycle, watchers, command router, orchestrator

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
