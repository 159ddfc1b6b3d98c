//! Persistence Gateway Port
//!
//! Durable membership storage keyed by (consumer id, token address). The
//! engine behind it is deliberately small: sets of addresses, one map of
//! address -> creation time, and an age-based delete. All operations are
//! idempotent and safe to retry; callers treat a store error as "log and
//! carry on", keeping in-memory state authoritative for the process.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read state for '{consumer}': {reason}")]
    Read { consumer: String, reason: String },

    #[error("failed to write state for '{consumer}': {reason}")]
    Write { consumer: String, reason: String },

    #[error("state for '{consumer}' is corrupted: {reason}")]
    Corrupted { consumer: String, reason: String },
}

/// Well-known consumer ids. Filter-scoped consumers are derived from the
/// filter key so every filter owns its own rows.
pub mod consumers {
    /// Map of every tracked token address to its creation time.
    pub const KNOWN: &str = "known";
    /// Addresses already alerted by the graduation stream.
    pub const GRADUATED: &str = "graduated";

    pub fn seen(filter_key: &str) -> String {
        format!("seen-{filter_key}")
    }

    pub fn currently(filter_key: &str) -> String {
        format!("currently-{filter_key}")
    }

    pub fn expired(filter_key: &str) -> String {
        format!("expired-{filter_key}")
    }
}

/// Key-value membership store contract.
pub trait StateStore: Send + Sync {
    /// Load a full address set; a consumer that was never written is empty.
    fn load_set(&self, consumer: &str) -> Result<HashSet<String>, StoreError>;

    /// Replace a consumer's address set wholesale.
    fn save_set(&self, consumer: &str, addresses: &HashSet<String>) -> Result<(), StoreError>;

    /// Add one address to a set. Inserting a duplicate is a no-op.
    fn insert_into_set(&self, consumer: &str, address: &str) -> Result<(), StoreError>;

    /// Load the address -> timestamp map for a consumer.
    fn load_map(&self, consumer: &str) -> Result<HashMap<String, i64>, StoreError>;

    /// Insert new rows and upgrade rows whose stored timestamp is 0 to a
    /// nonzero value. A stored nonzero timestamp is never changed.
    fn upsert_map(&self, consumer: &str, entries: &HashMap<String, i64>) -> Result<(), StoreError>;

    /// Delete map rows with a known timestamp at or before `cutoff_ms`.
    /// Rows with timestamp 0 are kept. Returns the number removed.
    fn delete_where_older(&self, consumer: &str, cutoff_ms: i64) -> Result<usize, StoreError>;
}
