//! SQLite agent binding repository implementation.

use chrono::{DateTime, Utc};
use parlay_core::conversation::AgentBindingRepository;
use parlay_types::agent::AgentBinding;
use parlay_types::error::RepositoryError;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `AgentBindingRepository`.
///
/// Bindings are keyed by user id: one remote agent per user, shared across
/// all of that user's conversations.
pub struct SqliteAgentBindingRepository {
    pool: DatabasePool,
}

impl SqliteAgentBindingRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct AgentBindingRow {
    user_id: String,
    agent_ref: String,
    created_at: String,
}

impl AgentBindingRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            user_id: row.try_get("user_id")?,
            agent_ref: row.try_get("agent_ref")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_binding(self) -> Result<AgentBinding, RepositoryError> {
        let user_id = Uuid::parse_str(&self.user_id)
            .map_err(|e| RepositoryError::Query(format!("invalid user_id: {e}")))?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))?;

        Ok(AgentBinding {
            user_id,
            agent_ref: self.agent_ref,
            created_at,
        })
    }
}

impl AgentBindingRepository for SqliteAgentBindingRepository {
    async fn get_binding(&self, user_id: &Uuid) -> Result<Option<AgentBinding>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM agent_bindings WHERE user_id = ?")
            .bind(user_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let binding_row = AgentBindingRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(binding_row.into_binding()?))
            }
            None => Ok(None),
        }
    }

    async fn upsert_binding(&self, binding: &AgentBinding) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO agent_bindings (user_id, agent_ref, created_at)
               VALUES (?, ?, ?)
               ON CONFLICT(user_id) DO UPDATE SET agent_ref = excluded.agent_ref"#,
        )
        .bind(binding.user_id.to_string())
        .bind(&binding.agent_ref)
        .bind(binding.created_at.to_rfc3339())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }
}
