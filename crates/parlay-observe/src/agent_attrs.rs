//! OpenTelemetry GenAI Semantic Convention attribute constants.
//!
//! Used as field names in `tracing::span!` / `tracing::info_span!` when
//! instrumenting calls to the agent service, so traces stay compatible with
//! the OTel GenAI conventions.

/// The name of the operation being performed (e.g., "invoke_agent").
pub const GEN_AI_OPERATION_NAME: &str = "gen_ai.operation.name";

/// The conversation the operation belongs to.
pub const GEN_AI_CONVERSATION_ID: &str = "gen_ai.conversation.id";

// --- Operation name values ---

/// Streaming message generation turn.
pub const OP_INVOKE_AGENT: &str = "invoke_agent";
