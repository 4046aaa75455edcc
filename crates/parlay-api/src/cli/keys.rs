//! API key management commands.

use sqlx::Row;
use uuid::Uuid;

use crate::http::extractors::auth::create_api_key;
use crate::state::AppState;

/// `parlay keys create` — mint a new key bound to a fresh user id.
///
/// The plaintext key is printed exactly once; only its hash is stored.
pub async fn create_key(state: &AppState, name: &str, json: bool) -> anyhow::Result<()> {
    let user_id = Uuid::now_v7();
    let key = create_api_key(&state.db_pool, user_id, name).await?;

    if json {
        let out = serde_json::json!({
            "name": name,
            "user_id": user_id.to_string(),
            "key": key,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!();
        println!("  API key created (save this -- it won't be shown again):");
        println!();
        println!("  {key}");
        println!();
        println!("  user: {user_id}  name: {name}");
        println!();
    }

    Ok(())
}

/// `parlay keys list` — show key metadata, never hashes.
pub async fn list_keys(state: &AppState, json: bool) -> anyhow::Result<()> {
    let rows = sqlx::query(
        "SELECT name, user_id, created_at, last_used_at FROM api_keys ORDER BY created_at",
    )
    .fetch_all(&state.db_pool.reader)
    .await?;

    if json {
        let keys: Vec<serde_json::Value> = rows
            .iter()
            .map(|row| {
                serde_json::json!({
                    "name": row.get::<String, _>("name"),
                    "user_id": row.get::<String, _>("user_id"),
                    "created_at": row.get::<String, _>("created_at"),
                    "last_used_at": row.get::<Option<String>, _>("last_used_at"),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&keys)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No API keys. Create one with `parlay keys create`.");
        return Ok(());
    }

    for row in &rows {
        let name: String = row.get("name");
        let user_id: String = row.get("user_id");
        let last_used: Option<String> = row.get("last_used_at");
        println!(
            "  {name}  user={user_id}  last_used={}",
            last_used.as_deref().unwrap_or("never")
        );
    }

    Ok(())
}
