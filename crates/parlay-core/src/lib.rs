//! Business logic for Parlay.
//!
//! Defines the repository and gateway traits (implemented in parlay-infra)
//! and owns the turn orchestration engine: the per-user session coordinator,
//! the streaming reply pipeline, and the background title worker.

pub mod agent;
pub mod conversation;
pub mod session;
pub mod title;

#[cfg(test)]
pub(crate) mod test_support;
