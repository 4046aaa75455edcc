//! Shared domain types for Parlay.
//!
//! This crate has no business logic and no infrastructure dependencies;
//! it defines the data shapes and error taxonomies used by every other
//! crate in the workspace.

pub mod agent;
pub mod config;
pub mod conversation;
pub mod error;
