//! API key authentication extractor.
//!
//! Extracts and verifies API keys from:
//! - `Authorization: Bearer <key>` header
//! - `X-API-Key: <key>` header
//!
//! Keys are SHA-256 hashed and compared against the `api_keys` table. Each
//! key belongs to a user; the extractor resolves the caller's user id, which
//! scopes every conversation query downstream.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use sha2::{Digest, Sha256};
use sqlx::Row;
use uuid::Uuid;

use crate::http::error::AppError;
use crate::state::AppState;

/// Authenticated caller. Extracting this validates the API key.
pub struct Authenticated {
    pub user_id: Uuid,
}

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Extract API key from headers
        let api_key = extract_api_key(parts)?;

        // Hash the provided key
        let key_hash = hash_api_key(&api_key);

        // Verify against database
        let result = sqlx::query("SELECT id, user_id FROM api_keys WHERE key_hash = ?")
            .bind(&key_hash)
            .fetch_optional(&state.db_pool.reader)
            .await
            .map_err(|e| AppError::Internal(format!("Database error: {e}")))?;

        match result {
            Some(row) => {
                let id: String = row.get("id");
                let user_id: String = row.get("user_id");
                let user_id = user_id
                    .parse::<Uuid>()
                    .map_err(|_| AppError::Internal("Corrupt api_keys row".to_string()))?;

                // Update last_used_at (best effort, don't fail the request)
                let now = chrono::Utc::now().to_rfc3339();
                let _ = sqlx::query("UPDATE api_keys SET last_used_at = ? WHERE id = ?")
                    .bind(&now)
                    .bind(&id)
                    .execute(&state.db_pool.writer)
                    .await;

                Ok(Authenticated { user_id })
            }
            None => Err(AppError::Unauthorized(
                "Invalid API key. Provide a valid key via 'Authorization: Bearer <key>' or 'X-API-Key: <key>' header.".to_string(),
            )),
        }
    }
}

/// Extract the API key from request headers.
fn extract_api_key(parts: &Parts) -> Result<String, AppError> {
    // Try Authorization: Bearer <key>
    if let Some(auth) = parts.headers.get("authorization") {
        let auth_str = auth.to_str().map_err(|_| {
            AppError::Unauthorized("Invalid Authorization header encoding".to_string())
        })?;
        if let Some(key) = auth_str.strip_prefix("Bearer ") {
            return Ok(key.trim().to_string());
        }
    }

    // Try X-API-Key header
    if let Some(key) = parts.headers.get("x-api-key") {
        let key_str = key.to_str().map_err(|_| {
            AppError::Unauthorized("Invalid X-API-Key header encoding".to_string())
        })?;
        return Ok(key_str.trim().to_string());
    }

    Err(AppError::Unauthorized(
        "Missing API key. Provide via 'Authorization: Bearer <key>' or 'X-API-Key: <key>' header.".to_string(),
    ))
}

/// Compute SHA-256 hash of an API key (lowercase hex).
pub fn hash_api_key(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    format!("{:x}", digest)
}

/// Generate a new API key for a user and store its hash in the database.
///
/// Returns the plaintext key (shown to the caller once).
pub async fn create_api_key(
    pool: &parlay_infra::sqlite::pool::DatabasePool,
    user_id: Uuid,
    name: &str,
) -> anyhow::Result<String> {
    use rand::RngCore;

    let mut key_bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut key_bytes);
    let plaintext_key = format!(
        "parlay_{}",
        key_bytes.iter().map(|b| format!("{b:02x}")).collect::<String>()
    );

    let key_hash = hash_api_key(&plaintext_key);
    let id = Uuid::now_v7().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO api_keys (id, key_hash, user_id, name, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&key_hash)
    .bind(user_id.to_string())
    .bind(name)
    .bind(&now)
    .execute(&pool.writer)
    .await?;

    Ok(plaintext_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlay_infra::sqlite::pool::DatabasePool;

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        std::mem::forget(dir);
        DatabasePool::new(&url).await.unwrap()
    }

    #[test]
    fn test_hash_is_stable_hex() {
        let a = hash_api_key("parlay_abc");
        let b = hash_api_key("parlay_abc");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_create_api_key_stores_hash_not_plaintext() {
        let pool = test_pool().await;
        let user_id = Uuid::now_v7();

        let key = create_api_key(&pool, user_id, "default").await.unwrap();
        assert!(key.starts_with("parlay_"));

        let row = sqlx::query("SELECT key_hash, user_id FROM api_keys")
            .fetch_one(&pool.reader)
            .await
            .unwrap();
        let stored_hash: String = row.get("key_hash");
        let stored_user: String = row.get("user_id");
        assert_eq!(stored_hash, hash_api_key(&key));
        assert_ne!(stored_hash, key);
        assert_eq!(stored_user, user_id.to_string());
    }
}
