//! Conversation and message types.
//!
//! A conversation is an ordered thread of messages owned by one user.
//! Messages are immutable once created and carry a per-conversation
//! sequence number that is strictly increasing with no gaps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Role of a message within a conversation.
///
/// Maps to the CHECK constraint in the SQLite schema:
/// `CHECK (role IN ('user', 'assistant'))`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(format!("invalid message role: '{other}'")),
        }
    }
}

/// A conversation thread belonging to a single user.
///
/// `updated_at` always equals the creation timestamp of the newest message.
/// `next_sequence` is the persistence-side counter messages are numbered
/// from; it is only ever advanced inside the append transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: Option<String>,
    pub next_sequence: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single message within a conversation. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    /// Per-conversation sequence number, starting at 1.
    pub sequence: i64,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle phase of one generation turn.
///
/// `Pending -> Streaming -> {Complete | Failed | Cancelled}`. Ephemeral:
/// a turn is never persisted as its own row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnPhase {
    Pending,
    Streaming,
    Complete,
    Failed,
    Cancelled,
}

impl TurnPhase {
    /// Whether this phase ends the turn.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TurnPhase::Complete | TurnPhase::Failed | TurnPhase::Cancelled
        )
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: TurnPhase) -> bool {
        match (self, next) {
            (TurnPhase::Pending, TurnPhase::Streaming) => true,
            (TurnPhase::Pending | TurnPhase::Streaming, p) if p.is_terminal() => true,
            _ => false,
        }
    }
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnPhase::Pending => write!(f, "pending"),
            TurnPhase::Streaming => write!(f, "streaming"),
            TurnPhase::Complete => write!(f, "complete"),
            TurnPhase::Failed => write!(f, "failed"),
            TurnPhase::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Events yielded to the caller over the lifetime of one generation turn.
///
/// The sequence is finite and non-restartable: exactly one `UserMessage`,
/// zero or more `Delta`s in arrival order, then exactly one terminal event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// The persisted user message that opened the turn.
    UserMessage(Message),

    /// One incremental fragment of generated text.
    Delta { text: String },

    /// The turn completed; carries the persisted assistant message.
    Completed(Message),

    /// The turn failed upstream. The user message remains persisted;
    /// no assistant message was created.
    Failed { message: String },

    /// The turn was cancelled before completion.
    Cancelled,
}
