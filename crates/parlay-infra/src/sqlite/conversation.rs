//! SQLite conversation repository implementation.
//!
//! Implements `ConversationRepository` from `parlay-core` using sqlx with
//! split read/write pools: raw queries, private Row structs, rfc3339 text
//! timestamps.

use chrono::{DateTime, Utc};
use parlay_core::conversation::ConversationRepository;
use parlay_types::conversation::{Conversation, Message, MessageRole};
use parlay_types::error::RepositoryError;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ConversationRepository`.
pub struct SqliteConversationRepository {
    pool: DatabasePool,
}

impl SqliteConversationRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

/// Internal row type for mapping SQLite rows to domain Conversation.
struct ConversationRow {
    id: String,
    user_id: String,
    title: Option<String>,
    next_sequence: i64,
    created_at: String,
    updated_at: String,
}

impl ConversationRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            title: row.try_get("title")?,
            next_sequence: row.try_get("next_sequence")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_conversation(self) -> Result<Conversation, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid conversation id: {e}")))?;
        let user_id = Uuid::parse_str(&self.user_id)
            .map_err(|e| RepositoryError::Query(format!("invalid user_id: {e}")))?;
        let created_at = parse_datetime(&self.created_at)?;
        let updated_at = parse_datetime(&self.updated_at)?;

        Ok(Conversation {
            id,
            user_id,
            title: self.title,
            next_sequence: self.next_sequence,
            created_at,
            updated_at,
        })
    }
}

/// Internal row type for mapping SQLite rows to domain Message.
struct MessageRow {
    id: String,
    conversation_id: String,
    role: String,
    content: String,
    sequence: i64,
    created_at: String,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            conversation_id: row.try_get("conversation_id")?,
            role: row.try_get("role")?,
            content: row.try_get("content")?,
            sequence: row.try_get("sequence")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_message(self) -> Result<Message, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid message id: {e}")))?;
        let conversation_id = Uuid::parse_str(&self.conversation_id)
            .map_err(|e| RepositoryError::Query(format!("invalid conversation_id: {e}")))?;
        let role: MessageRole = self
            .role
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;
        let created_at = parse_datetime(&self.created_at)?;

        Ok(Message {
            id,
            conversation_id,
            role,
            content: self.content,
            sequence: self.sequence,
            created_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

// ---------------------------------------------------------------------------
// ConversationRepository implementation
// ---------------------------------------------------------------------------

impl ConversationRepository for SqliteConversationRepository {
    async fn create_conversation(&self, user_id: Uuid) -> Result<Conversation, RepositoryError> {
        let now = Utc::now();
        let conversation = Conversation {
            id: Uuid::now_v7(),
            user_id,
            title: None,
            next_sequence: 0,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"INSERT INTO conversations (id, user_id, title, next_sequence, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(conversation.id.to_string())
        .bind(conversation.user_id.to_string())
        .bind(&conversation.title)
        .bind(conversation.next_sequence)
        .bind(format_datetime(&conversation.created_at))
        .bind(format_datetime(&conversation.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(conversation)
    }

    async fn get_conversation(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM conversations WHERE id = ? AND user_id = ?")
            .bind(conversation_id.to_string())
            .bind(user_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let conversation_row = ConversationRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(conversation_row.into_conversation()?))
            }
            None => Ok(None),
        }
    }

    async fn list_conversations(
        &self,
        user_id: &Uuid,
    ) -> Result<Vec<Conversation>, RepositoryError> {
        let rows =
            sqlx::query("SELECT * FROM conversations WHERE user_id = ? ORDER BY updated_at DESC")
                .bind(user_id.to_string())
                .fetch_all(&self.pool.reader)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut conversations = Vec::with_capacity(rows.len());
        for row in &rows {
            let conversation_row = ConversationRow::from_row(row)
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            conversations.push(conversation_row.into_conversation()?);
        }

        Ok(conversations)
    }

    async fn append_message(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
        role: MessageRole,
        content: &str,
    ) -> Result<Message, RepositoryError> {
        let now = Utc::now();

        // Claim the next sequence number and insert the message in one
        // transaction so sequences stay gapless even under concurrent writes.
        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let row = sqlx::query(
            r#"UPDATE conversations
               SET next_sequence = next_sequence + 1, updated_at = ?
               WHERE id = ? AND user_id = ?
               RETURNING next_sequence"#,
        )
        .bind(format_datetime(&now))
        .bind(conversation_id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let Some(row) = row else {
            return Err(RepositoryError::NotFound);
        };
        let sequence: i64 = row
            .try_get("next_sequence")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let message = Message {
            id: Uuid::now_v7(),
            conversation_id: *conversation_id,
            role,
            content: content.to_string(),
            sequence,
            created_at: now,
        };

        sqlx::query(
            r#"INSERT INTO messages (id, conversation_id, role, content, sequence, created_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(message.id.to_string())
        .bind(message.conversation_id.to_string())
        .bind(message.role.to_string())
        .bind(&message.content)
        .bind(message.sequence)
        .bind(format_datetime(&message.created_at))
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(message)
    }

    async fn list_messages(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<Vec<Message>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT m.* FROM messages m
               JOIN conversations c ON c.id = m.conversation_id
               WHERE m.conversation_id = ? AND c.user_id = ?
               ORDER BY m.sequence ASC"#,
        )
        .bind(conversation_id.to_string())
        .bind(user_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            let message_row =
                MessageRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            messages.push(message_row.into_message()?);
        }

        Ok(messages)
    }

    async fn count_user_messages(&self, conversation_id: &Uuid) -> Result<i64, RepositoryError> {
        let row = sqlx::query(
            "SELECT COUNT(*) as cnt FROM messages WHERE conversation_id = ? AND role = 'user'",
        )
        .bind(conversation_id.to_string())
        .fetch_one(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row.try_get("cnt")
            .map_err(|e| RepositoryError::Query(e.to_string()))
    }

    async fn set_title_if_absent(
        &self,
        conversation_id: &Uuid,
        title: &str,
    ) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("UPDATE conversations SET title = ? WHERE id = ? AND title IS NULL")
                .bind(title)
                .bind(conversation_id.to_string())
                .execute(&self.pool.writer)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::pool::DatabasePool;

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        // Leak tempdir so it lives for the test
        std::mem::forget(dir);
        DatabasePool::new(&url).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get_conversation() {
        let pool = test_pool().await;
        let repo = SqliteConversationRepository::new(pool);
        let user_id = Uuid::now_v7();

        let created = repo.create_conversation(user_id).await.unwrap();
        assert_eq!(created.user_id, user_id);
        assert!(created.title.is_none());
        assert_eq!(created.next_sequence, 0);

        let found = repo
            .get_conversation(&created.id, &user_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.user_id, user_id);
    }

    #[tokio::test]
    async fn test_get_conversation_wrong_user() {
        let pool = test_pool().await;
        let repo = SqliteConversationRepository::new(pool);

        let owner = Uuid::now_v7();
        let other = Uuid::now_v7();
        let conversation = repo.create_conversation(owner).await.unwrap();

        let found = repo.get_conversation(&conversation.id, &other).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_list_conversations_most_recent_first() {
        let pool = test_pool().await;
        let repo = SqliteConversationRepository::new(pool);
        let user_id = Uuid::now_v7();

        let first = repo.create_conversation(user_id).await.unwrap();
        let second = repo.create_conversation(user_id).await.unwrap();

        // Appending to the first conversation bumps updated_at
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        repo.append_message(&first.id, &user_id, MessageRole::User, "hello")
            .await
            .unwrap();

        let list = repo.list_conversations(&user_id).await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, first.id);
        assert_eq!(list[1].id, second.id);
    }

    #[tokio::test]
    async fn test_append_message_sequences_are_gapless() {
        let pool = test_pool().await;
        let repo = SqliteConversationRepository::new(pool);
        let user_id = Uuid::now_v7();
        let conversation = repo.create_conversation(user_id).await.unwrap();

        let m1 = repo
            .append_message(&conversation.id, &user_id, MessageRole::User, "one")
            .await
            .unwrap();
        let m2 = repo
            .append_message(&conversation.id, &user_id, MessageRole::Assistant, "two")
            .await
            .unwrap();
        let m3 = repo
            .append_message(&conversation.id, &user_id, MessageRole::User, "three")
            .await
            .unwrap();

        assert_eq!(m1.sequence, 1);
        assert_eq!(m2.sequence, 2);
        assert_eq!(m3.sequence, 3);

        let found = repo
            .get_conversation(&conversation.id, &user_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.next_sequence, 3);
    }

    #[tokio::test]
    async fn test_append_message_unknown_conversation() {
        let pool = test_pool().await;
        let repo = SqliteConversationRepository::new(pool);

        let result = repo
            .append_message(&Uuid::now_v7(), &Uuid::now_v7(), MessageRole::User, "hi")
            .await;
        assert!(matches!(result, Err(RepositoryError::NotFound)));
    }

    #[tokio::test]
    async fn test_append_message_wrong_user_rejected() {
        let pool = test_pool().await;
        let repo = SqliteConversationRepository::new(pool);

        let owner = Uuid::now_v7();
        let other = Uuid::now_v7();
        let conversation = repo.create_conversation(owner).await.unwrap();

        let result = repo
            .append_message(&conversation.id, &other, MessageRole::User, "hi")
            .await;
        assert!(matches!(result, Err(RepositoryError::NotFound)));
    }

    #[tokio::test]
    async fn test_list_messages_in_sequence_order() {
        let pool = test_pool().await;
        let repo = SqliteConversationRepository::new(pool);
        let user_id = Uuid::now_v7();
        let conversation = repo.create_conversation(user_id).await.unwrap();

        for (role, content) in [
            (MessageRole::User, "Hi, my name is Joe"),
            (MessageRole::Assistant, "Nice to meet you, Joe."),
            (MessageRole::User, "What's my name?"),
            (MessageRole::Assistant, "Your name is Joe."),
        ] {
            repo.append_message(&conversation.id, &user_id, role, content)
                .await
                .unwrap();
        }

        let messages = repo
            .list_messages(&conversation.id, &user_id)
            .await
            .unwrap();
        assert_eq!(messages.len(), 4);
        let sequences: Vec<i64> = messages.iter().map(|m| m.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3, 4]);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[3].content, "Your name is Joe.");

        // Another user sees nothing
        let other = repo
            .list_messages(&conversation.id, &Uuid::now_v7())
            .await
            .unwrap();
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn test_count_user_messages() {
        let pool = test_pool().await;
        let repo = SqliteConversationRepository::new(pool);
        let user_id = Uuid::now_v7();
        let conversation = repo.create_conversation(user_id).await.unwrap();

        assert_eq!(repo.count_user_messages(&conversation.id).await.unwrap(), 0);

        repo.append_message(&conversation.id, &user_id, MessageRole::User, "one")
            .await
            .unwrap();
        repo.append_message(&conversation.id, &user_id, MessageRole::Assistant, "reply")
            .await
            .unwrap();
        repo.append_message(&conversation.id, &user_id, MessageRole::User, "two")
            .await
            .unwrap();

        assert_eq!(repo.count_user_messages(&conversation.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_set_title_if_absent_is_write_once() {
        let pool = test_pool().await;
        let repo = SqliteConversationRepository::new(pool);
        let user_id = Uuid::now_v7();
        let conversation = repo.create_conversation(user_id).await.unwrap();

        let wrote = repo
            .set_title_if_absent(&conversation.id, "Rust questions")
            .await
            .unwrap();
        assert!(wrote);

        let wrote_again = repo
            .set_title_if_absent(&conversation.id, "Something else")
            .await
            .unwrap();
        assert!(!wrote_again);

        let found = repo
            .get_conversation(&conversation.id, &user_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.title.as_deref(), Some("Rust questions"));
    }
}
