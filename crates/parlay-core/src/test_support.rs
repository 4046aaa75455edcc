//! In-memory repository and scripted gateway for core tests.
//!
//! `MemoryStore` implements the repository traits over plain mutex-guarded
//! maps (no await while a lock is held). `MockGateway` keeps a rolling
//! per-binding transcript so recall across turns is observable without a
//! real agent service.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use futures_util::StreamExt;
use uuid::Uuid;

use parlay_types::agent::{AgentBinding, AgentEvent};
use parlay_types::conversation::{Conversation, Message, MessageRole, TurnEvent};
use parlay_types::error::{AgentError, RepositoryError};

use crate::agent::{AgentGateway, AgentStream};
use crate::conversation::{AgentBindingRepository, ConversationRepository};
use crate::session::service::TurnStream;

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

pub struct MemoryStore {
    conversations: Mutex<HashMap<Uuid, Conversation>>,
    messages: Mutex<HashMap<Uuid, Vec<Message>>>,
    bindings: Mutex<HashMap<Uuid, AgentBinding>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            conversations: Mutex::new(HashMap::new()),
            messages: Mutex::new(HashMap::new()),
            bindings: Mutex::new(HashMap::new()),
        }
    }
}

impl ConversationRepository for MemoryStore {
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
        self.conversations
            .lock()
            .unwrap()
            .insert(conversation.id, conversation.clone());
        Ok(conversation)
    }

    async fn get_conversation(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<Option<Conversation>, RepositoryError> {
        Ok(self
            .conversations
            .lock()
            .unwrap()
            .get(conversation_id)
            .filter(|c| c.user_id == *user_id)
            .cloned())
    }

    async fn list_conversations(
        &self,
        user_id: &Uuid,
    ) -> Result<Vec<Conversation>, RepositoryError> {
        let mut list: Vec<Conversation> = self
            .conversations
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.user_id == *user_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(list)
    }

    async fn append_message(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
        role: MessageRole,
        content: &str,
    ) -> Result<Message, RepositoryError> {
        let mut conversations = self.conversations.lock().unwrap();
        let conversation = conversations
            .get_mut(conversation_id)
            .filter(|c| c.user_id == *user_id)
            .ok_or(RepositoryError::NotFound)?;

        conversation.next_sequence += 1;
        let now = Utc::now();
        conversation.updated_at = now;

        let message = Message {
            id: Uuid::now_v7(),
            conversation_id: *conversation_id,
            role,
            content: content.to_string(),
            sequence: conversation.next_sequence,
            created_at: now,
        };
        self.messages
            .lock()
            .unwrap()
            .entry(*conversation_id)
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    async fn list_messages(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<Vec<Message>, RepositoryError> {
        if self
            .conversations
            .lock()
            .unwrap()
            .get(conversation_id)
            .filter(|c| c.user_id == *user_id)
            .is_none()
        {
            return Ok(Vec::new());
        }
        Ok(self
            .messages
            .lock()
            .unwrap()
            .get(conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn count_user_messages(&self, conversation_id: &Uuid) -> Result<i64, RepositoryError> {
        Ok(self
            .messages
            .lock()
            .unwrap()
            .get(conversation_id)
            .map(|m| m.iter().filter(|m| m.role == MessageRole::User).count() as i64)
            .unwrap_or(0))
    }

    async fn set_title_if_absent(
        &self,
        conversation_id: &Uuid,
        title: &str,
    ) -> Result<bool, RepositoryError> {
        let mut conversations = self.conversations.lock().unwrap();
        let conversation = conversations
            .get_mut(conversation_id)
            .ok_or(RepositoryError::NotFound)?;
        if conversation.title.is_some() {
            return Ok(false);
        }
        conversation.title = Some(title.to_string());
        Ok(true)
    }
}

impl AgentBindingRepository for MemoryStore {
    async fn get_binding(&self, user_id: &Uuid) -> Result<Option<AgentBinding>, RepositoryError> {
        Ok(self.bindings.lock().unwrap().get(user_id).cloned())
    }

    async fn upsert_binding(&self, binding: &AgentBinding) -> Result<(), RepositoryError> {
        self.bindings
            .lock()
            .unwrap()
            .insert(binding.user_id, binding.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockGateway
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub enum MockMode {
    /// Stream fragments then a clean `Done`.
    Normal,
    /// Stream N fragments then an upstream error.
    FailAfter(usize),
    /// Stream one fragment then hang until cancelled or dropped.
    Stall,
}

pub struct MockGateway {
    mode: Mutex<MockMode>,
    memory: Mutex<HashMap<String, Vec<String>>>,
    cancelled: AtomicBool,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            mode: Mutex::new(MockMode::Normal),
            memory: Mutex::new(HashMap::new()),
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn set_mode(&self, mode: MockMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn was_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Compute a scripted reply and record the message in the binding's
    /// rolling memory.
    fn reply_for(&self, agent_ref: &str, content: &str) -> String {
        let mut memory = self.memory.lock().unwrap();
        let history = memory.entry(agent_ref.to_string()).or_default();

        let reply = if let Some(name) = extract_name(content) {
            format!("Nice to meet you, {name}.")
        } else if content.contains("What's my name") {
            match history.iter().rev().find_map(|m| extract_name(m)) {
                Some(name) => format!("Your name is {name}."),
                None => "I don't know your name yet.".to_string(),
            }
        } else {
            format!("You said: {content}")
        };

        history.push(content.to_string());
        reply
    }
}

impl AgentGateway for MockGateway {
    fn send_and_stream(&self, binding: &AgentBinding, content: &str) -> AgentStream {
        let mode = *self.mode.lock().unwrap();
        let reply = self.reply_for(&binding.agent_ref, content);
        let fragments: Vec<String> = reply.split_inclusive(' ').map(String::from).collect();

        match mode {
            MockMode::Normal => Box::pin(async_stream::stream! {
                for fragment in fragments {
                    yield Ok(AgentEvent::Delta { text: fragment });
                }
                yield Ok(AgentEvent::Done);
            }),
            MockMode::FailAfter(n) => Box::pin(async_stream::stream! {
                for fragment in fragments.into_iter().take(n) {
                    yield Ok(AgentEvent::Delta { text: fragment });
                }
                yield Err(AgentError::Upstream("mock upstream failure".to_string()));
            }),
            MockMode::Stall => Box::pin(async_stream::stream! {
                yield Ok(AgentEvent::Delta {
                    text: fragments.first().cloned().unwrap_or_default(),
                });
                std::future::pending::<()>().await;
            }),
        }
    }

    async fn summarize(
        &self,
        _binding: &AgentBinding,
        transcript: &[Message],
    ) -> Result<String, AgentError> {
        let first = transcript
            .first()
            .map(|m| m.content.as_str())
            .unwrap_or("nothing");
        let topic: String = first.split_whitespace().take(3).collect::<Vec<_>>().join(" ");
        Ok(format!("\"Chat about {topic}\""))
    }

    async fn cancel(&self, _binding: &AgentBinding) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

/// Pull a name out of "my name is <name>" phrasing, if present.
fn extract_name(content: &str) -> Option<String> {
    let idx = content.find("my name is ")?;
    let rest = &content[idx + "my name is ".len()..];
    let name: String = rest
        .split_whitespace()
        .next()?
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_string();
    (!name.is_empty()).then_some(name)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Drain a turn stream to completion.
pub async fn collect_turn(mut stream: TurnStream) -> Vec<TurnEvent> {
    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        events.push(event);
    }
    events
}

/// Seed a conversation with a two-exchange transcript and an agent binding.
pub async fn seed_exchange(store: &MemoryStore, user_id: Uuid) -> Uuid {
    store
        .upsert_binding(&AgentBinding::new(user_id))
        .await
        .unwrap();
    let conversation = store.create_conversation(user_id).await.unwrap();
    for (role, content) in [
        (MessageRole::User, "Hi, my name is Joe"),
        (MessageRole::Assistant, "Nice to meet you, Joe."),
        (MessageRole::User, "What's my name?"),
        (MessageRole::Assistant, "Your name is Joe."),
    ] {
        store
            .append_message(&conversation.id, &user_id, role, content)
            .await
            .unwrap();
    }
    conversation.id
}
