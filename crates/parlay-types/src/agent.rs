//! Agent binding and normalized fragment stream types.
//!
//! The external agent service holds each user's durable memory. Everything
//! downstream of the gateway consumes only the normalized [`AgentEvent`]
//! shape; upstream wire formats never leak past the gateway boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One-to-one association between a user and their external agent identity.
///
/// The `agent_ref` is an opaque identifier minted by the agent service; it
/// carries the user's memory across all of that user's conversations. The
/// binding is the one genuinely shared mutable resource in the system and
/// is only ever touched while a turn lock is held.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentBinding {
    pub user_id: Uuid,
    pub agent_ref: String,
    pub created_at: DateTime<Utc>,
}

impl AgentBinding {
    /// Create a fresh binding for a user. The agent ref is derived from the
    /// user id so a binding can be minted without an upstream round trip.
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            agent_ref: format!("agent-{user_id}"),
            created_at: Utc::now(),
        }
    }
}

/// Normalized events produced by the agent gateway during generation.
///
/// A well-formed stream is zero or more `Delta`s followed by exactly one
/// `Done`. Errors travel in the surrounding `Result`, not in this enum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// One incremental fragment of generated text.
    Delta { text: String },

    /// End-of-stream marker; the generation finished normally.
    Done,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_agent_ref_is_stable_per_user() {
        let user_id = Uuid::now_v7();
        let a = AgentBinding::new(user_id);
        let b = AgentBinding::new(user_id);
        assert_eq!(a.agent_ref, b.agent_ref);
        assert!(a.agent_ref.starts_with("agent-"));
    }

    #[test]
    fn test_agent_event_serde() {
        let ev = AgentEvent::Delta {
            text: "chunk".to_string(),
        };
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains("\"type\":\"delta\""));

        let done: AgentEvent = serde_json::from_str(r#"{"type":"done"}"#).unwrap();
        assert_eq!(done, AgentEvent::Done);
    }
}
