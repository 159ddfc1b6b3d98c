//! Known-Token Registry
//!
//! The canonical set of every token the service has ever discovered and
//! still tracks, with the pair creation time learned for each. The registry
//! is the in-memory mirror of the `known` store consumer; the store stays
//! the source of truth across restarts.
//!
//! Timestamp semantics: `0` means "creation time unknown, keep re-checking".
//! The 0 -> nonzero transition is one-way; a known timestamp is never
//! overwritten or reset.

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct KnownTokenRegistry {
    entries: HashMap<String, i64>,
}

impl KnownTokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the registry from persisted entries on startup.
    pub fn from_entries(entries: HashMap<String, i64>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.entries.contains_key(address)
    }

    pub fn created_at(&self, address: &str) -> Option<i64> {
        self.entries.get(address).copied()
    }

    /// Record a sighting of `address` with the creation time the provider
    /// reported (`0` when absent). Returns `true` when the persisted row
    /// must change: the address is new, or a previously unknown creation
    /// time just became known. A known timestamp is never replaced.
    pub fn observe(&mut self, address: &str, created_at_ms: i64) -> bool {
        let created_at_ms = created_at_ms.max(0);
        match self.entries.get(address) {
            None => {
                self.entries.insert(address.to_string(), created_at_ms);
                true
            }
            Some(0) if created_at_ms > 0 => {
                self.entries.insert(address.to_string(), created_at_ms);
                true
            }
            Some(_) => false,
        }
    }

    /// Drop every entry whose creation time is known and at or before
    /// `cutoff_ms`. Entries with an unknown creation time are never removed
    /// by age. Returns the removed addresses.
    pub fn purge_older_than(&mut self, cutoff_ms: i64) -> Vec<String> {
        let removed: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, ts)| **ts > 0 && **ts <= cutoff_ms)
            .map(|(addr, _)| addr.clone())
            .collect();
        for addr in &removed {
            self.entries.remove(addr);
        }
        removed
    }

    pub fn addresses(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}
