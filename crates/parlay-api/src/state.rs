//! Application state wiring all services together.
//!
//! AppState holds the concrete service instance used by both CLI and REST
//! API. The service is generic over repository/gateway traits, but AppState
//! pins it to the concrete infra implementations.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parlay_core::session::coordinator::TurnCoordinator;
use parlay_core::session::service::ChatService;
use parlay_core::title::spawn_title_worker;
use parlay_infra::agent::HttpAgentGateway;
use parlay_infra::config::load_app_config;
use parlay_infra::sqlite::binding::SqliteAgentBindingRepository;
use parlay_infra::sqlite::conversation::SqliteConversationRepository;
use parlay_infra::sqlite::pool::{resolve_data_dir, DatabasePool};
use parlay_types::config::AppConfig;

/// Concrete type alias for the service generics pinned to infra implementations.
pub type ConcreteChatService =
    ChatService<SqliteConversationRepository, SqliteAgentBindingRepository, HttpAgentGateway>;

/// Shared application state holding the chat service and pool.
///
/// Used by both CLI commands and REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub chat_service: Arc<ConcreteChatService>,
    pub config: Arc<AppConfig>,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
}

impl AppState {
    /// Initialize the application state: connect to DB, wire services.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();

        // Ensure data directory exists
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_app_config(&data_dir).await;

        // Initialize database
        let db_url = format!("sqlite://{}?mode=rwc", data_dir.join("parlay.db").display());
        let db_pool = DatabasePool::new(&db_url).await?;

        // Repositories and gateway
        let conversations = Arc::new(SqliteConversationRepository::new(db_pool.clone()));
        let bindings = Arc::new(SqliteAgentBindingRepository::new(db_pool.clone()));
        let gateway = Arc::new(
            HttpAgentGateway::new(&config.agent)
                .map_err(|e| anyhow::anyhow!("agent gateway setup: {e}"))?,
        );

        let coordinator = TurnCoordinator::new(Duration::from_secs(config.turn.hard_timeout_secs));

        // Title generation runs on its own worker task, decoupled from turns.
        let title_tx = spawn_title_worker(
            Arc::clone(&conversations),
            Arc::clone(&bindings),
            Arc::clone(&gateway),
            config.title.queue_capacity,
        );

        let chat_service = ChatService::new(
            conversations,
            bindings,
            gateway,
            coordinator,
            Some(title_tx),
            config.turn.max_message_bytes,
        );

        Ok(Self {
            chat_service: Arc::new(chat_service),
            config: Arc::new(config),
            data_dir,
            db_pool,
        })
    }
}
