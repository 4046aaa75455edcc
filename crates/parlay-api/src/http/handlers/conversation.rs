//! Conversation CRUD HTTP handlers.
//!
//! Endpoints:
//! - POST /api/v1/conversations                - Create a conversation
//! - GET  /api/v1/conversations                - List the caller's conversations
//! - GET  /api/v1/conversations/{id}          - Get a single conversation
//! - GET  /api/v1/conversations/{id}/messages - Get messages in sequence order

use std::time::Instant;

use axum::extract::{Path, State};
use uuid::Uuid;

use parlay_types::conversation::{Conversation, Message};

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// Parse a UUID from a path parameter, returning a 400 error on invalid format.
fn parse_uuid(s: &str) -> Result<Uuid, AppError> {
    s.parse::<Uuid>()
        .map_err(|_| AppError::Validation(format!("Invalid UUID: {s}")))
}

/// POST /api/v1/conversations - Create a new conversation for the caller.
pub async fn create_conversation(
    State(state): State<AppState>,
    auth: Authenticated,
) -> Result<ApiResponse<Conversation>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let conversation = state.chat_service.create_conversation(auth.user_id).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(ApiResponse::success(conversation, request_id, elapsed))
}

/// GET /api/v1/conversations - List the caller's conversations, most
/// recently active first.
pub async fn list_conversations(
    State(state): State<AppState>,
    auth: Authenticated,
) -> Result<ApiResponse<Vec<Conversation>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let conversations = state.chat_service.list_conversations(auth.user_id).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(ApiResponse::success(conversations, request_id, elapsed))
}

/// GET /api/v1/conversations/{id} - Get a conversation by ID.
pub async fn get_conversation(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(conversation_id): Path<String>,
) -> Result<ApiResponse<Conversation>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let id = parse_uuid(&conversation_id)?;
    let conversation = state.chat_service.get_conversation(auth.user_id, id).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(ApiResponse::success(conversation, request_id, elapsed))
}

/// GET /api/v1/conversations/{id}/messages - Get messages in sequence order.
pub async fn list_messages(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(conversation_id): Path<String>,
) -> Result<ApiResponse<Vec<Message>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let id = parse_uuid(&conversation_id)?;
    let messages = state.chat_service.list_messages(auth.user_id, id).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(ApiResponse::success(messages, request_id, elapsed))
}
