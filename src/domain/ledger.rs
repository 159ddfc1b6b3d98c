//! Per-Filter Alert Ledger
//!
//! For each filter the service tracks two disjoint address sets:
//! `currently` (satisfies the filter as of the last cycle) and `expired`
//! (aged past the filter's ceiling, terminal). The per-address state machine
//! is `Unseen -> Passing <-> NotPassing` with `Expired` absorbing from any
//! non-expired state. Both sets are persisted with replace semantics after
//! every cycle so a restart reconstructs them exactly.

use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct FilterLedger {
    currently: HashSet<String>,
    expired: HashSet<String>,
}

impl FilterLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted sets. Expiry wins when a row shows up in
    /// both sets (possible only after a crash between the two writes).
    pub fn restore(currently: HashSet<String>, expired: HashSet<String>) -> Self {
        let currently = currently
            .into_iter()
            .filter(|addr| !expired.contains(addr))
            .collect();
        Self { currently, expired }
    }

    pub fn is_expired(&self, address: &str) -> bool {
        self.expired.contains(address)
    }

    pub fn is_empty(&self) -> bool {
        self.currently.is_empty() && self.expired.is_empty()
    }

    /// Move an address into the terminal expired set. It is removed from
    /// `currently` and will never re-enter it.
    pub fn mark_expired(&mut self, address: &str) {
        self.currently.remove(address);
        self.expired.insert(address.to_string());
    }

    /// Replace `currently` with the freshly computed passing set and return
    /// the addresses that just entered, sorted for deterministic dispatch
    /// order. Expired addresses are ignored even if the caller passes them.
    pub fn advance(&mut self, passing: HashSet<String>) -> Vec<String> {
        let passing: HashSet<String> = passing
            .into_iter()
            .filter(|addr| !self.expired.contains(addr))
            .collect();

        let mut entered: Vec<String> = passing.difference(&self.currently).cloned().collect();
        entered.sort();

        self.currently = passing;
        entered
    }

    pub fn currently(&self) -> &HashSet<String> {
        &self.currently
    }

    pub fn expired(&self) -> &HashSet<String> {
        &self.expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(addrs: &[&str]) -> HashSet<String> {
        addrs.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn test_advance_reports_entrants() {
        let mut ledger = FilterLedger::new();

        let entered = ledger.advance(set(&["a", "b"]));
        assert_eq!(entered, vec!["a".to_string(), "b".to_string()]);

        // Same passing set next cycle: nothing new.
        let entered = ledger.advance(set(&["a", "b"]));
        assert!(entered.is_empty());

        // "b" drops out, "c" enters.
        let entered = ledger.advance(set(&["a", "c"]));
        assert_eq!(entered, vec!["c".to_string()]);
        assert!(!ledger.currently().contains("b"));
    }

    #[test]
    fn test_reentry_after_leaving() {
        let mut ledger = FilterLedger::new();
        ledger.advance(set(&["a"]));
        ledger.advance(set(&[]));

        // Re-entry shows up as a fresh entry event; alert-once policy is
        // enforced by the caller via the seen set, not here.
        let entered = ledger.advance(set(&["a"]));
        assert_eq!(entered, vec!["a".to_string()]);
    }

    #[test]
    fn test_expiry_is_terminal() {
        let mut ledger = FilterLedger::new();
        ledger.advance(set(&["a"]));
        ledger.mark_expired("a");

        assert!(ledger.is_expired("a"));
        assert!(!ledger.currently().contains("a"));

        // No snapshot content can bring an expired address back.
        for _ in 0..3 {
            let entered = ledger.advance(set(&["a"]));
            assert!(entered.is_empty());
            assert!(!ledger.currently().contains("a"));
        }
        assert!(ledger.is_expired("a"));
    }

    #[test]
    fn test_sets_stay_disjoint() {
        let mut ledger = FilterLedger::new();
        ledger.advance(set(&["a", "b"]));
        ledger.mark_expired("a");

        assert!(ledger.currently().contains("b"));
        assert!(!ledger.currently().contains("a"));
        assert!(ledger.expired().contains("a"));
    }

    #[test]
    fn test_restore_prefers_expired_on_overlap() {
        let ledger = FilterLedger::restore(set(&["a", "b"]), set(&["a"]));
        assert!(ledger.is_expired("a"));
        assert!(!ledger.currently().contains("a"));
        assert!(ledger.currently().contains("b"));
    }

    #[test]
    fn test_restore_empty_is_empty() {
        let ledger = FilterLedger::restore(HashSet::new(), HashSet::new());
        assert!(ledger.is_empty());
    }
}
