//! Chat service orchestrating the full generation-turn lifecycle.
//!
//! `send_message` is the streaming reply pipeline: acquire the user's turn
//! slot, persist the user message, stream normalized fragments from the
//! agent gateway, finalize persistence exactly once, release the slot, and
//! trigger the background title job. Each turn walks the
//! `Pending -> Streaming -> {Complete | Failed | Cancelled}` state machine.

use std::pin::Pin;
use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use parlay_types::agent::{AgentBinding, AgentEvent};
use parlay_types::conversation::{Conversation, Message, MessageRole, TurnEvent, TurnPhase};
use parlay_types::error::ChatError;

use crate::agent::AgentGateway;
use crate::conversation::{AgentBindingRepository, ConversationRepository};
use crate::session::coordinator::TurnCoordinator;
use crate::title::TitleJob;

/// Number of user messages a conversation must hold before it is titled.
const TITLE_TRIGGER_USER_MESSAGES: i64 = 2;

/// Boxed event stream returned by [`ChatService::send_message`].
pub type TurnStream = Pin<Box<dyn Stream<Item = TurnEvent> + Send + 'static>>;

/// Orchestrates conversations, generation turns, and title scheduling.
///
/// Generic over the repository and gateway traits so parlay-core never
/// depends on parlay-infra.
pub struct ChatService<C, B, G> {
    conversations: Arc<C>,
    bindings: Arc<B>,
    gateway: Arc<G>,
    coordinator: TurnCoordinator,
    title_tx: Option<mpsc::Sender<TitleJob>>,
    max_message_bytes: usize,
}

impl<C, B, G> ChatService<C, B, G>
where
    C: ConversationRepository + 'static,
    B: AgentBindingRepository + 'static,
    G: AgentGateway + 'static,
{
    pub fn new(
        conversations: Arc<C>,
        bindings: Arc<B>,
        gateway: Arc<G>,
        coordinator: TurnCoordinator,
        title_tx: Option<mpsc::Sender<TitleJob>>,
        max_message_bytes: usize,
    ) -> Self {
        Self {
            conversations,
            bindings,
            gateway,
            coordinator,
            title_tx,
            max_message_bytes,
        }
    }

    /// Create a new conversation for a user (explicit "new chat" action).
    pub async fn create_conversation(&self, user_id: Uuid) -> Result<Conversation, ChatError> {
        Ok(self.conversations.create_conversation(user_id).await?)
    }

    /// List a user's conversations, most recently active first.
    pub async fn list_conversations(&self, user_id: Uuid) -> Result<Vec<Conversation>, ChatError> {
        Ok(self.conversations.list_conversations(&user_id).await?)
    }

    /// Fetch one conversation.
    ///
    /// Fails closed with `NotFound` when the conversation is missing or
    /// belongs to another user.
    pub async fn get_conversation(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
    ) -> Result<Conversation, ChatError> {
        self.conversations
            .get_conversation(&conversation_id, &user_id)
            .await?
            .ok_or(ChatError::NotFound)
    }

    /// List a conversation's messages in sequence order.
    ///
    /// Fails closed with `NotFound` when the conversation is missing or
    /// belongs to another user.
    pub async fn list_messages(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
    ) -> Result<Vec<Message>, ChatError> {
        self.conversations
            .get_conversation(&conversation_id, &user_id)
            .await?
            .ok_or(ChatError::NotFound)?;
        Ok(self
            .conversations
            .list_messages(&conversation_id, &user_id)
            .await?)
    }

    /// Start a generation turn.
    ///
    /// Validation, ownership, the `Busy` check, and user-message persistence
    /// all happen before the stream is returned, so those failures surface
    /// as plain errors. The returned stream yields the persisted user
    /// message, then fragments in arrival order, then exactly one terminal
    /// event. Dropping the stream (client disconnect) releases the turn slot.
    pub async fn send_message(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
        content: String,
    ) -> Result<TurnStream, ChatError> {
        let content = content.trim().to_string();
        if content.is_empty() {
            return Err(ChatError::Validation("message content is empty".to_string()));
        }
        if content.len() > self.max_message_bytes {
            return Err(ChatError::Validation(format!(
                "message content exceeds {} bytes",
                self.max_message_bytes
            )));
        }

        self.conversations
            .get_conversation(&conversation_id, &user_id)
            .await?
            .ok_or(ChatError::NotFound)?;

        // Per-user slot: one binding backs all of this user's conversations.
        let guard = self.coordinator.begin_turn(user_id)?;

        let binding = self.resolve_binding(user_id).await?;

        let user_message = self
            .conversations
            .append_message(&conversation_id, &user_id, MessageRole::User, &content)
            .await?;

        let conversations = Arc::clone(&self.conversations);
        let gateway = Arc::clone(&self.gateway);
        let title_tx = self.title_tx.clone();
        let token = guard.token();

        let stream = async_stream::stream! {
            // The guard lives inside the stream; any exit path drops it and
            // frees the slot. The watchdog covers a never-polled stream.
            let _guard = guard;
            let mut phase = TurnPhase::Pending;

            yield TurnEvent::UserMessage(user_message);

            // Client disconnect drops this stream mid-turn; the sentinel
            // then requests an upstream cancel so the binding's generation
            // does not keep running unobserved. Disarmed once the turn
            // reaches a terminal event.
            let mut upstream_cancel = CancelOnDrop {
                gateway: Arc::clone(&gateway),
                binding: binding.clone(),
                armed: true,
            };

            let mut upstream = std::pin::pin!(gateway.send_and_stream(&binding, &content));
            let mut accumulated = String::new();

            let terminal = loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        gateway.cancel(&binding).await;
                        break TurnEvent::Cancelled;
                    }
                    fragment = upstream.next() => match fragment {
                        Some(Ok(AgentEvent::Delta { text })) => {
                            if phase == TurnPhase::Pending {
                                advance_phase(&conversation_id, &mut phase, TurnPhase::Streaming);
                            }
                            accumulated.push_str(&text);
                            yield TurnEvent::Delta { text };
                        }
                        Some(Ok(AgentEvent::Done)) | None => {
                            break finalize_turn(
                                conversations.as_ref(),
                                &conversation_id,
                                &user_id,
                                &accumulated,
                                title_tx.as_ref(),
                            )
                            .await;
                        }
                        Some(Err(e)) => {
                            // Partial text is discarded; the user message
                            // stays so the caller can retry without loss.
                            let err: ChatError = e.into();
                            break TurnEvent::Failed { message: err.to_string() };
                        }
                    }
                }
            };
            upstream_cancel.armed = false;

            let next_phase = match &terminal {
                TurnEvent::Completed(_) => TurnPhase::Complete,
                TurnEvent::Cancelled => TurnPhase::Cancelled,
                _ => TurnPhase::Failed,
            };
            advance_phase(&conversation_id, &mut phase, next_phase);
            yield terminal;
        };

        Ok(Box::pin(stream))
    }

    async fn resolve_binding(&self, user_id: Uuid) -> Result<AgentBinding, ChatError> {
        if let Some(binding) = self.bindings.get_binding(&user_id).await? {
            return Ok(binding);
        }
        let binding = AgentBinding::new(user_id);
        self.bindings.upsert_binding(&binding).await?;
        Ok(binding)
    }
}

/// Sentinel that requests a best-effort upstream cancel when a turn is torn
/// down before reaching a terminal event.
struct CancelOnDrop<G: AgentGateway + 'static> {
    gateway: Arc<G>,
    binding: AgentBinding,
    armed: bool,
}

impl<G: AgentGateway + 'static> Drop for CancelOnDrop<G> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let gateway = Arc::clone(&self.gateway);
        let binding = self.binding.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                debug!(agent_ref = %binding.agent_ref, "turn dropped mid-stream, cancelling upstream");
                gateway.cancel(&binding).await;
            });
        }
    }
}

/// Record one legal turn-phase transition.
fn advance_phase(conversation_id: &Uuid, phase: &mut TurnPhase, next: TurnPhase) {
    debug_assert!(
        phase.can_transition_to(next),
        "illegal turn phase transition {phase} -> {next}"
    );
    debug!(%conversation_id, from = %phase, to = %next, "turn phase");
    *phase = next;
}

/// Persist the accumulated assistant text as exactly one message and decide
/// the terminal event. Enqueues the title job when this turn leaves the
/// conversation with exactly two user messages.
async fn finalize_turn<C: ConversationRepository>(
    conversations: &C,
    conversation_id: &Uuid,
    user_id: &Uuid,
    accumulated: &str,
    title_tx: Option<&mpsc::Sender<TitleJob>>,
) -> TurnEvent {
    if accumulated.is_empty() {
        return TurnEvent::Failed {
            message: ChatError::UpstreamProtocol("agent produced no output".to_string())
                .to_string(),
        };
    }

    let assistant = match conversations
        .append_message(conversation_id, user_id, MessageRole::Assistant, accumulated)
        .await
    {
        Ok(message) => message,
        Err(e) => {
            let err: ChatError = e.into();
            return TurnEvent::Failed {
                message: err.to_string(),
            };
        }
    };

    if let Some(tx) = title_tx {
        match conversations.count_user_messages(conversation_id).await {
            Ok(TITLE_TRIGGER_USER_MESSAGES) => {
                let job = TitleJob {
                    conversation_id: *conversation_id,
                    user_id: *user_id,
                };
                if let Err(e) = tx.try_send(job) {
                    warn!(%conversation_id, error = %e, "title job queue rejected job");
                }
            }
            Ok(_) => {}
            Err(e) => warn!(%conversation_id, error = %e, "title trigger count failed"),
        }
    }

    TurnEvent::Completed(assistant)
}
