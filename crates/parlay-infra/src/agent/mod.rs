//! HTTP gateway to the external agent service.
//!
//! Implements `AgentGateway` from `parlay-core` over the agent service's
//! REST + SSE surface:
//!
//! - `POST /v1/agents/{agent_ref}/messages` -- send a user message, response
//!   is an SSE stream of `delta` / `done` / `error` events
//! - `POST /v1/agents/{agent_ref}/summarize` -- one-shot title summarization
//! - `POST /v1/agents/{agent_ref}/cancel` -- best-effort abort of the
//!   in-flight generation

use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use parlay_core::agent::{AgentGateway, AgentStream};
use parlay_types::agent::{AgentBinding, AgentEvent};
use parlay_types::config::AgentServiceConfig;
use parlay_types::conversation::Message;
use parlay_types::error::AgentError;

/// Client for the remote agent service.
pub struct HttpAgentGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    request_timeout: std::time::Duration,
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    content: &'a str,
}

#[derive(Serialize)]
struct SummarizeRequest<'a> {
    transcript: Vec<TranscriptEntry<'a>>,
}

#[derive(Serialize)]
struct TranscriptEntry<'a> {
    role: String,
    content: &'a str,
}

#[derive(Deserialize)]
struct SummarizeResponse {
    title: String,
}

#[derive(Deserialize)]
struct DeltaPayload {
    text: String,
}

#[derive(Deserialize)]
struct ErrorPayload {
    message: String,
}

impl HttpAgentGateway {
    pub fn new(config: &AgentServiceConfig) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| AgentError::Upstream(format!("building http client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().map(SecretString::from),
            request_timeout: std::time::Duration::from_secs(config.request_timeout_secs),
        })
    }

    fn agent_url(&self, agent_ref: &str, action: &str) -> String {
        format!("{}/v1/agents/{agent_ref}/{action}", self.base_url)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.bearer_auth(key.expose_secret()),
            None => req,
        }
    }
}

/// Translate a reqwest failure into the agent error taxonomy.
fn translate_request_error(err: reqwest::Error) -> AgentError {
    if err.is_timeout() {
        AgentError::Timeout
    } else {
        AgentError::Upstream(err.to_string())
    }
}

/// Translate a non-success HTTP status into the agent error taxonomy.
fn translate_status(response: &reqwest::Response) -> Option<AgentError> {
    let status = response.status();
    if status.is_success() {
        return None;
    }
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after_ms = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(|secs| secs * 1000);
        return Some(AgentError::RateLimited { retry_after_ms });
    }
    Some(AgentError::Upstream(format!("agent service returned {status}")))
}

impl AgentGateway for HttpAgentGateway {
    fn send_and_stream(&self, binding: &AgentBinding, content: &str) -> AgentStream {
        let request = self
            .authorize(self.client.post(self.agent_url(&binding.agent_ref, "messages")))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&SendMessageRequest { content });

        Box::pin(async_stream::stream! {
            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    yield Err(translate_request_error(e));
                    return;
                }
            };
            if let Some(err) = translate_status(&response) {
                yield Err(err);
                return;
            }

            let mut events = response.bytes_stream().eventsource();
            while let Some(event) = events.next().await {
                let event = match event {
                    Ok(event) => event,
                    Err(e) => {
                        yield Err(AgentError::Protocol(e.to_string()));
                        return;
                    }
                };

                match event.event.as_str() {
                    "delta" => {
                        match serde_json::from_str::<DeltaPayload>(&event.data) {
                            Ok(payload) => yield Ok(AgentEvent::Delta { text: payload.text }),
                            Err(e) => {
                                yield Err(AgentError::Protocol(format!("malformed delta: {e}")));
                                return;
                            }
                        }
                    }
                    "done" => {
                        yield Ok(AgentEvent::Done);
                        return;
                    }
                    "error" => {
                        let message = serde_json::from_str::<ErrorPayload>(&event.data)
                            .map(|p| p.message)
                            .unwrap_or(event.data);
                        yield Err(AgentError::Upstream(message));
                        return;
                    }
                    other => {
                        // Keepalives and unknown event types are skipped
                        tracing::trace!(event = other, "ignoring agent stream event");
                    }
                }
            }

            // Connection closed without a terminal event
            yield Err(AgentError::Protocol(
                "agent stream ended without done event".to_string(),
            ));
        })
    }

    async fn summarize(
        &self,
        binding: &AgentBinding,
        transcript: &[Message],
    ) -> Result<String, AgentError> {
        let body = SummarizeRequest {
            transcript: transcript
                .iter()
                .map(|m| TranscriptEntry {
                    role: m.role.to_string(),
                    content: &m.content,
                })
                .collect(),
        };

        // The per-request timeout applies only to unary calls; the message
        // stream has its own hard-timeout watchdog upstream.
        let response = self
            .authorize(self.client.post(self.agent_url(&binding.agent_ref, "summarize")))
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await
            .map_err(translate_request_error)?;

        if let Some(err) = translate_status(&response) {
            return Err(err);
        }

        let parsed: SummarizeResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Protocol(format!("malformed summarize response: {e}")))?;

        Ok(parsed.title)
    }

    async fn cancel(&self, binding: &AgentBinding) {
        // Best effort: a failed cancel only means the upstream finishes on
        // its own. The local turn is already being torn down.
        let result = self
            .authorize(self.client.post(self.agent_url(&binding.agent_ref, "cancel")))
            .timeout(self.request_timeout)
            .send()
            .await;
        if let Err(e) = result {
            tracing::debug!(agent_ref = %binding.agent_ref, error = %e, "cancel request failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(base_url: &str) -> AgentServiceConfig {
        AgentServiceConfig {
            base_url: base_url.to_string(),
            api_key: None,
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }

    #[test]
    fn test_agent_url_joins_cleanly() {
        let gateway = HttpAgentGateway::new(&test_config("http://127.0.0.1:8601/")).unwrap();
        assert_eq!(
            gateway.agent_url("agent-abc", "messages"),
            "http://127.0.0.1:8601/v1/agents/agent-abc/messages"
        );
        assert_eq!(
            gateway.agent_url("agent-abc", "cancel"),
            "http://127.0.0.1:8601/v1/agents/agent-abc/cancel"
        );
    }

    #[test]
    fn test_delta_payload_parses() {
        let payload: DeltaPayload = serde_json::from_str(r#"{"text":"Hello, "}"#).unwrap();
        assert_eq!(payload.text, "Hello, ");
    }

    #[test]
    fn test_summarize_response_parses() {
        let parsed: SummarizeResponse =
            serde_json::from_str(r#"{"title":"Rust questions"}"#).unwrap();
        assert_eq!(parsed.title, "Rust questions");
    }

    #[tokio::test]
    async fn test_stream_against_unreachable_service_yields_error() {
        let gateway = HttpAgentGateway::new(&test_config("http://127.0.0.1:1")).unwrap();
        let binding = AgentBinding::new(uuid::Uuid::now_v7());

        let mut stream = gateway.send_and_stream(&binding, "hello");
        let first = stream.next().await;
        assert!(matches!(
            first,
            Some(Err(AgentError::Upstream(_) | AgentError::Timeout))
        ));
    }
}
