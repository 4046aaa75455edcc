//! AgentGateway trait definition.
//!
//! The one abstraction over the external generation/memory service. Uses
//! RPITIT for `summarize` and `cancel`, and `Pin<Box<dyn Stream>>` for the
//! fragment stream (streams need a nameable type at the call sites that
//! store them).

use std::pin::Pin;

use futures_util::Stream;

use parlay_types::agent::{AgentBinding, AgentEvent};
use parlay_types::conversation::Message;
use parlay_types::error::AgentError;

/// Boxed fragment stream produced by [`AgentGateway::send_and_stream`].
pub type AgentStream = Pin<Box<dyn Stream<Item = Result<AgentEvent, AgentError>> + Send + 'static>>;

/// Adapter to the external stateful agent service.
///
/// The binding's memory state lives upstream and is not safe for concurrent
/// mutation; callers must hold the user's turn lock for the full lifetime of
/// a `send_and_stream` call. The gateway never retries mid-stream -- a
/// retried partial stream would risk duplicated output, so any retry is the
/// caller's decision and goes through a fresh turn.
pub trait AgentGateway: Send + Sync {
    /// Send a user message to the bound agent and stream back normalized
    /// text fragments. The stream is finite: zero or more `Delta`s followed
    /// by `Done`, or an error item that ends it.
    fn send_and_stream(&self, binding: &AgentBinding, content: &str) -> AgentStream;

    /// Summarize a transcript into a short conversation title.
    /// Lighter-weight entry point used by the title worker.
    fn summarize(
        &self,
        binding: &AgentBinding,
        transcript: &[Message],
    ) -> impl std::future::Future<Output = Result<String, AgentError>> + Send;

    /// Ask the agent service to stop an in-flight generation. Best effort:
    /// failures are logged by implementations, never surfaced.
    fn cancel(
        &self,
        binding: &AgentBinding,
    ) -> impl std::future::Future<Output = ()> + Send;
}
