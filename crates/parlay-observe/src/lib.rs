//! Observability for Parlay: tracing subscriber setup and span attribute
//! conventions for agent calls.

pub mod agent_attrs;
pub mod tracing_setup;
