//! Repository trait definitions for conversations and agent bindings.
//!
//! Implementations live in parlay-infra (e.g. `SqliteConversationRepository`).
//! Uses native async fn in traits (RPITIT, Rust 2024 edition).

use parlay_types::agent::AgentBinding;
use parlay_types::conversation::{Conversation, Message, MessageRole};
use parlay_types::error::RepositoryError;
use uuid::Uuid;

/// Repository trait for conversation and message persistence.
///
/// All lookups are scoped by the owning user and fail closed: a query for
/// another user's conversation behaves as if the conversation does not
/// exist. Every write is a single transaction; no cross-conversation
/// transaction is ever required.
pub trait ConversationRepository: Send + Sync {
    /// Create a conversation with a null title and sequence counter at zero.
    fn create_conversation(
        &self,
        user_id: Uuid,
    ) -> impl std::future::Future<Output = Result<Conversation, RepositoryError>> + Send;

    /// Get a conversation by id, scoped to its owner.
    fn get_conversation(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Conversation>, RepositoryError>> + Send;

    /// List a user's conversations, ordered by `updated_at` DESC.
    fn list_conversations(
        &self,
        user_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<Conversation>, RepositoryError>> + Send;

    /// Append a message, atomically claiming the next sequence number and
    /// bumping the conversation's `updated_at`. All-or-nothing: on any
    /// failure no partial write remains. `NotFound` if the conversation
    /// does not exist or does not belong to `user_id`.
    fn append_message(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
        role: MessageRole,
        content: &str,
    ) -> impl std::future::Future<Output = Result<Message, RepositoryError>> + Send;

    /// List messages for a conversation, ordered by sequence ASC.
    fn list_messages(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, RepositoryError>> + Send;

    /// Number of user-role messages in a conversation (title trigger check).
    fn count_user_messages(
        &self,
        conversation_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<i64, RepositoryError>> + Send;

    /// Set the title only if it is still null. Returns whether the write
    /// landed. Safe to call twice for the same conversation.
    fn set_title_if_absent(
        &self,
        conversation_id: &Uuid,
        title: &str,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;
}

/// Repository trait for user-to-agent bindings.
pub trait AgentBindingRepository: Send + Sync {
    /// Get the binding for a user, if one exists.
    fn get_binding(
        &self,
        user_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<AgentBinding>, RepositoryError>> + Send;

    /// Insert or replace the binding for a user.
    fn upsert_binding(
        &self,
        binding: &AgentBinding,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
