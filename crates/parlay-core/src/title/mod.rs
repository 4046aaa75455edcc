//! Background conversation title generation.
//!
//! A single worker task drains a bounded queue of title jobs, summarizes the
//! transcript through the agent gateway, and persists the result with a
//! conditional update-if-null write. Duplicate scheduling is harmless: the
//! second write simply does not land. The worker never sits on the critical
//! path of the turn that triggered it.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use parlay_types::error::ChatError;

use crate::agent::AgentGateway;
use crate::conversation::{AgentBindingRepository, ConversationRepository};

/// One queued title-generation request.
#[derive(Debug, Clone)]
pub struct TitleJob {
    pub conversation_id: Uuid,
    pub user_id: Uuid,
}

/// Spawn the title worker task. Returns the job sender; dropping every
/// sender shuts the worker down.
pub fn spawn_title_worker<C, B, G>(
    conversations: Arc<C>,
    bindings: Arc<B>,
    gateway: Arc<G>,
    queue_capacity: usize,
) -> mpsc::Sender<TitleJob>
where
    C: ConversationRepository + 'static,
    B: AgentBindingRepository + 'static,
    G: AgentGateway + 'static,
{
    let (tx, mut rx) = mpsc::channel::<TitleJob>(queue_capacity);

    tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            let conversation_id = job.conversation_id;
            let span = info_span!(
                "generate_title",
                gen_ai.operation.name = "generate_title",
                gen_ai.conversation.id = %conversation_id,
                gen_ai.agent.id = tracing::field::Empty,
            );
            if let Err(e) =
                run_title_job(conversations.as_ref(), bindings.as_ref(), gateway.as_ref(), job)
                    .instrument(span)
                    .await
            {
                warn!(%conversation_id, error = %e, "title generation failed");
            }
        }
        debug!("title worker shut down");
    });

    tx
}

/// Generate and persist a title for one conversation.
async fn run_title_job<C, B, G>(
    conversations: &C,
    bindings: &B,
    gateway: &G,
    job: TitleJob,
) -> Result<(), ChatError>
where
    C: ConversationRepository,
    B: AgentBindingRepository,
    G: AgentGateway,
{
    let binding = bindings
        .get_binding(&job.user_id)
        .await?
        .ok_or(ChatError::NotFound)?;
    tracing::Span::current().record("gen_ai.agent.id", binding.agent_ref.as_str());

    let transcript = conversations
        .list_messages(&job.conversation_id, &job.user_id)
        .await?;
    if transcript.is_empty() {
        return Err(ChatError::NotFound);
    }

    let raw = gateway.summarize(&binding, &transcript).await?;
    let title = trim_title(&raw);
    if title.is_empty() {
        return Err(ChatError::UpstreamProtocol(
            "summarizer returned an empty title".to_string(),
        ));
    }

    let updated = conversations
        .set_title_if_absent(&job.conversation_id, &title)
        .await?;
    if updated {
        info!(conversation_id = %job.conversation_id, %title, "conversation titled");
    } else {
        debug!(conversation_id = %job.conversation_id, "title already set, skipping");
    }
    Ok(())
}

/// Strip whitespace and surrounding quotes from a generated title.
fn trim_title(raw: &str) -> String {
    raw.trim()
        .trim_matches('"')
        .trim_matches('\'')
        .trim()
        .to_string()
}
