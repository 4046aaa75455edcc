//! Application configuration shapes.
//!
//! Deserialized from `{data_dir}/config.toml`; every field has a default so
//! a missing or partial file still yields a working configuration.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub agent: AgentServiceConfig,
    #[serde(default)]
    pub turn: TurnConfig,
    #[serde(default)]
    pub title: TitleConfig,
}

/// Connection settings for the external agent service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentServiceConfig {
    /// Base URL of the agent service.
    #[serde(default = "default_agent_base_url")]
    pub base_url: String,
    /// API key for the agent service, if it requires one.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Timeout for unary requests (summarize, cancel), in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Connect timeout for the streaming generation call, in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for AgentServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_agent_base_url(),
            api_key: None,
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// Generation turn limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnConfig {
    /// Hard backstop: a turn still holding its lock after this many seconds
    /// is force-released regardless of client behavior.
    #[serde(default = "default_hard_timeout_secs")]
    pub hard_timeout_secs: u64,
    /// Maximum user message size in bytes.
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            hard_timeout_secs: default_hard_timeout_secs(),
            max_message_bytes: default_max_message_bytes(),
        }
    }
}

/// Title generation worker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TitleConfig {
    /// Capacity of the background title job queue.
    #[serde(default = "default_title_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for TitleConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_title_queue_capacity(),
        }
    }
}

fn default_agent_base_url() -> String {
    "http://127.0.0.1:8601".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_hard_timeout_secs() -> u64 {
    300
}

fn default_max_message_bytes() -> usize {
    32 * 1024
}

fn default_title_queue_capacity() -> usize {
    64
}
