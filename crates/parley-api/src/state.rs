//! Application state wiring the pipeline together.
//!
//! AppState holds the loaded configuration and the concrete store instance.
//! The orchestrator itself is built per command because its settings depend
//! on which identity the command runs under.

use std::path::Path;

use parley_core::gate::GenerationGate;
use parley_core::orchestrator::{Orchestrator, OrchestratorSettings, ResponseMessages};
use parley_infra::config::AppConfig;
use parley_infra::llm::ReqwestBackendFactory;
use parley_infra::sqlite::pool::DatabasePool;
use parley_infra::sqlite::store::SqliteChatStore;
use parley_types::chat::BotIdentity;

pub type ConcreteOrchestrator = Orchestrator<SqliteChatStore, ReqwestBackendFactory>;

pub struct AppState {
    pub config: AppConfig,
    pub store: SqliteChatStore,
}

impl AppState {
    /// Load configuration and connect to the database.
    pub async fn init(config_path: Option<&Path>) -> anyhow::Result<Self> {
        let config = AppConfig::load(config_path)?;
        let url = config.database_url();
        let pool = DatabasePool::new(&url).await?;
        tracing::debug!(url = %url, "database ready");
        Ok(Self {
            config,
            store: SqliteChatStore::new(pool),
        })
    }

    pub fn bot_identity(&self) -> BotIdentity {
        BotIdentity {
            id: self.config.bot.id,
            username: self.config.bot.username.clone(),
            first_name: self.config.bot.first_name.clone(),
            last_name: self.config.bot.last_name.clone(),
        }
    }

    /// Build an orchestrator over the configured store and backend.
    pub fn orchestrator(&self) -> anyhow::Result<ConcreteOrchestrator> {
        let settings = OrchestratorSettings {
            bot: self.bot_identity(),
            mode: self.config.mode()?,
            global_backend: self.config.backend_settings()?,
            completion_template: self.config.genai.template.clone(),
            history_limit: self.config.database.history_fetch_limit,
            allow_untrusted_chats: self.config.bot.allow_untrusted_chats,
            messages: ResponseMessages {
                private_chat_disallowed: self.config.messages.private_chat_disallowed.clone(),
                internal_error: self.config.messages.internal_error.clone(),
                server_busy: self.config.messages.server_busy.clone(),
            },
        };

        let factory = ReqwestBackendFactory::new(self.config.genai_timeout());
        let gate = GenerationGate::new(
            self.config.genai.allow_concurrent,
            self.config.genai_timeout(),
        );

        Ok(Orchestrator::new(
            self.store.clone(),
            factory,
            gate,
            settings,
        ))
    }
}
