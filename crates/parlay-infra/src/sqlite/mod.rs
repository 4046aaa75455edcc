//! SQLite persistence layer.

pub mod binding;
pub mod conversation;
pub mod pool;
