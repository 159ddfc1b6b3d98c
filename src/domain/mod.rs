//! Core domain logic for token discovery and alerting.
//!
//! Everything in this module is pure: no I/O, no clocks other than the
//! millisecond timestamps passed in by callers. The adapters produce
//! [`TokenSnapshot`]s; the application layer drives [`KnownTokenRegistry`]
//! and [`FilterLedger`] through their transitions.

pub mod filter;
pub mod ledger;
pub mod registry;
pub mod snapshot;

pub use filter::{passes, AlertPolicy, FilterConfig, UnknownAgePolicy};
pub use ledger::FilterLedger;
pub use registry::KnownTokenRegistry;
pub use snapshot::{dedup_by_pair, TokenSnapshot};

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds per hour, used for every age computation.
pub const MS_PER_HOUR: f64 = 3_600_000.0;

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
