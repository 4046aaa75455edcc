use thiserror::Error;

/// Errors surfaced by chat operations.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("conversation not found")]
    NotFound,

    #[error("a turn is already in flight for this user")]
    Busy,

    #[error("upstream agent timed out")]
    UpstreamTimeout,

    #[error("malformed upstream response: {0}")]
    UpstreamProtocol(String),

    #[error("upstream agent error: {0}")]
    Upstream(String),

    #[error("persistence error: {0}")]
    Persistence(String),
}

/// Errors from repository operations (used by trait definitions in parlay-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

impl From<RepositoryError> for ChatError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => ChatError::NotFound,
            other => ChatError::Persistence(other.to_string()),
        }
    }
}

/// Errors from the agent gateway boundary.
///
/// Upstream protocol failures are translated into this taxonomy at the
/// gateway; nothing downstream sees provider-specific error shapes.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent request timed out")]
    Timeout,

    #[error("malformed agent response: {0}")]
    Protocol(String),

    #[error("rate limited (retry after {retry_after_ms:?}ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("agent error: {0}")]
    Upstream(String),

    #[error("generation cancelled")]
    Cancelled,
}

impl From<AgentError> for ChatError {
    fn from(e: AgentError) -> Self {
        match e {
            AgentError::Timeout => ChatError::UpstreamTimeout,
            AgentError::Protocol(msg) => ChatError::UpstreamProtocol(msg),
            AgentError::RateLimited { .. } => {
                ChatError::Upstream("agent rate limited".to_string())
            }
            AgentError::Upstream(msg) => ChatError::Upstream(msg),
            AgentError::Cancelled => ChatError::Upstream("generation cancelled".to_string()),
        }
    }
}
