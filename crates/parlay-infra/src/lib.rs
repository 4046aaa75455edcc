//! Infrastructure implementations for Parlay.
//!
//! SQLite-backed repositories (sqlx, split reader/writer WAL pools) and the
//! HTTP gateway to the external agent service.

pub mod agent;
pub mod config;
pub mod sqlite;
