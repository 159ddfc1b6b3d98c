//! PumpPortal Adapter
//!
//! Persistent websocket subscription to the PumpPortal data feed for
//! token-graduation events. The stream task only parses and forwards;
//! everything stateful happens in the application-layer handler consuming
//! the event channel.

pub mod stream;
pub mod types;

pub use stream::{PumpPortalStream, StreamConfig, DEFAULT_WS_URL};
pub use types::GraduationEvent;
