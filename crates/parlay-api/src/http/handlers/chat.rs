//! SSE streaming message endpoint.
//!
//! POST /api/v1/conversations/{id}/messages
//!
//! Starts a generation turn and streams the reply as Server-Sent Events.
//! Validation, ownership, and the busy check all happen before the stream
//! opens, so those failures come back as plain JSON errors; once the SSE
//! stream is open, failures arrive as `error` events.
//!
//! SSE event types:
//! - `user_message` — the persisted user message with its sequence number
//! - `delta` — incremental reply text: `{ "text": "..." }`
//! - `assistant_message` — the persisted assistant message on completion
//! - `cancelled` — the turn was cancelled before completing: `{}`
//! - `error` — the turn failed: `{ "message": "..." }`
//! - `done` — stream complete: `{}`

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use tracing::Instrument;
use uuid::Uuid;

use parlay_observe::agent_attrs;
use parlay_types::conversation::TurnEvent;

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::state::AppState;

/// Request body for the streaming message endpoint.
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    /// The user message to send.
    pub content: String,
}

/// POST /api/v1/conversations/{id}/messages — SSE streaming reply.
pub async fn send_message(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(conversation_id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let conversation_id = conversation_id
        .parse::<Uuid>()
        .map_err(|_| AppError::Validation(format!("Invalid UUID: {conversation_id}")))?;

    let span = tracing::info_span!(
        "invoke_agent",
        { agent_attrs::GEN_AI_OPERATION_NAME } = agent_attrs::OP_INVOKE_AGENT,
        { agent_attrs::GEN_AI_CONVERSATION_ID } = %conversation_id,
    );

    let turn_stream = state
        .chat_service
        .send_message(auth.user_id, conversation_id, body.content)
        .instrument(span)
        .await?;

    let sse_stream = async_stream::stream! {
        let mut turn_stream = turn_stream;
        while let Some(event) = turn_stream.next().await {
            let sse_event = match &event {
                TurnEvent::UserMessage(message) => Event::default()
                    .event("user_message")
                    .data(serde_json::to_string(message).unwrap_or_default()),
                TurnEvent::Delta { text } => Event::default()
                    .event("delta")
                    .data(serde_json::json!({ "text": text }).to_string()),
                TurnEvent::Completed(message) => Event::default()
                    .event("assistant_message")
                    .data(serde_json::to_string(message).unwrap_or_default()),
                TurnEvent::Failed { message } => Event::default()
                    .event("error")
                    .data(serde_json::json!({ "message": message }).to_string()),
                TurnEvent::Cancelled => Event::default().event("cancelled").data("{}"),
            };
            yield Ok::<_, Infallible>(sse_event);
        }

        yield Ok(Event::default().event("done").data("{}"));
    };

    Ok(Sse::new(sse_stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}
