//! Session orchestration: per-user turn locking and the streaming reply
//! pipeline.

pub mod coordinator;
pub mod service;

pub use coordinator::{TurnCoordinator, TurnGuard};
pub use service::ChatService;
