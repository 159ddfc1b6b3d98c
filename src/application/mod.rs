//! Application Layer - the long-running activities wired over the ports:
//! discovery cycles, per-filter watchers, the graduation-event handler,
//! the operator command router and the orchestrator that spawns them all.
//! Tasks coordinate only through [`state::SharedState`] and the store.

pub mod commands;
pub mod discovery;
pub mod graduation;
pub mod orchestrator;
pub mod state;
pub mod watcher;

pub use orchestrator::{Orchestrator, OrchestratorError};
pub use state::SharedState;
