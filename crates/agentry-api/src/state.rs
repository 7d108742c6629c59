//! Application state wiring all services together.
//!
//! `AppState` is the composition root and the consumer-facing facade. It pins
//! the generic core services to the runtime-selected stores and owns the one
//! agent-instance cache shared by the orchestrator and the configuration
//! service. The engine factory stays generic so embedders (and tests) can
//! supply their own.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use agentry_core::chat::orchestrator::{ConversationOrchestrator, ConversationStream};
use agentry_core::engine::AgentEngineFactory;
use agentry_core::engine::cache::AgentCache;
use agentry_core::service::configuration::ConfigurationService;
use agentry_core::service::conversation::ConversationService;
use agentry_infra::config::{load_global_config, resolve_data_dir, resolve_database_url};
use agentry_infra::engine::ChatCompletionEngineFactory;
use agentry_infra::store::{ConfigurationStore, ConversationStore, open_stores};
use agentry_types::agent::{
    AgentConfiguration, CreateConfigurationRequest, UpdateConfigurationRequest,
};
use agentry_types::config::GlobalConfig;
use agentry_types::conversation::{ConversationSession, ExecutionResult};
use agentry_types::engine::CacheStats;

use crate::error::ApiError;
use crate::sweeper::spawn_eviction_sweeper;

pub type ConcreteConfigurationService = ConfigurationService<ConfigurationStore>;

pub type ConcreteConversationService = ConversationService<ConversationStore, ConfigurationStore>;

pub type ConcreteOrchestrator<F> = ConversationOrchestrator<ConfigurationStore, ConversationStore, F>;

/// Liveness summary.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub active_sessions: u64,
    pub cache: CacheStats,
    pub timestamp: DateTime<Utc>,
}

/// Shared application state holding all services.
pub struct AppState<F: AgentEngineFactory = ChatCompletionEngineFactory> {
    configurations: Arc<ConcreteConfigurationService>,
    conversations: Arc<ConcreteConversationService>,
    orchestrator: Arc<ConcreteOrchestrator<F>>,
    cache: Arc<AgentCache>,
    settings: Arc<GlobalConfig>,
    shutdown: CancellationToken,
}

impl<F: AgentEngineFactory> Clone for AppState<F> {
    fn clone(&self) -> Self {
        Self {
            configurations: Arc::clone(&self.configurations),
            conversations: Arc::clone(&self.conversations),
            orchestrator: Arc::clone(&self.orchestrator),
            cache: Arc::clone(&self.cache),
            settings: Arc::clone(&self.settings),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl AppState {
    /// Initialize from the data directory (`AGENTRY_DATA_DIR` or `~/.agentry`).
    pub async fn init() -> anyhow::Result<Self> {
        Self::open(&resolve_data_dir()).await
    }

    /// Initialize from an explicit data directory: load `config.toml`, open
    /// the configured stores, build the OpenAI-compatible engine factory and
    /// start the eviction sweeper.
    pub async fn open(data_dir: &Path) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(data_dir).await?;

        let settings = load_global_config(data_dir).await;
        let database_url = resolve_database_url(&settings, data_dir);
        let (configurations, conversations) =
            open_stores(settings.storage.backend, &database_url).await?;
        let factory = ChatCompletionEngineFactory::from_config(&settings.engine);

        tracing::info!(
            data_dir = %data_dir.display(),
            backend = ?settings.storage.backend,
            cache_max_size = settings.cache.max_size,
            model = %settings.engine.model,
            "Agentry initialized"
        );

        let state = Self::with_parts(settings, configurations, conversations, factory);
        state.start_sweeper();
        Ok(state)
    }
}

impl<F: AgentEngineFactory + 'static> AppState<F> {
    /// Wire services around already-opened stores and a factory.
    pub fn with_parts(
        settings: GlobalConfig,
        configurations: ConfigurationStore,
        conversations: ConversationStore,
        factory: F,
    ) -> Self {
        let cache = Arc::new(AgentCache::new(&settings.cache));
        let factory = Arc::new(factory);

        let configuration_service =
            ConfigurationService::new(configurations.clone(), Arc::clone(&cache));
        let conversation_service =
            ConversationService::new(conversations.clone(), configurations.clone());
        let orchestrator = ConversationOrchestrator::new(
            configurations,
            conversations,
            factory,
            Arc::clone(&cache),
        );

        Self {
            configurations: Arc::new(configuration_service),
            conversations: Arc::new(conversation_service),
            orchestrator: Arc::new(orchestrator),
            cache,
            settings: Arc::new(settings),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn settings(&self) -> &GlobalConfig {
        &self.settings
    }

    /// Spawn the background stale sweep, unless `sweep_interval_secs` is 0.
    pub fn start_sweeper(&self) -> Option<JoinHandle<()>> {
        let secs = self.settings.cache.sweep_interval_secs;
        if secs == 0 {
            return None;
        }
        Some(spawn_eviction_sweeper(
            Arc::clone(&self.cache),
            Duration::from_secs(secs),
            self.shutdown.child_token(),
        ))
    }

    /// Stop the sweeper and retire every cached engine.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.cache.clear().await;
        tracing::info!("Agentry shut down");
    }

    // --- Configurations ---

    pub async fn create_configuration(
        &self,
        request: CreateConfigurationRequest,
    ) -> Result<AgentConfiguration, ApiError> {
        Ok(self.configurations.create(request).await?)
    }

    pub async fn update_configuration(
        &self,
        config_id: &str,
        request: UpdateConfigurationRequest,
    ) -> Result<AgentConfiguration, ApiError> {
        Ok(self.configurations.update(config_id, request).await?)
    }

    pub async fn delete_configuration(&self, config_id: &str) -> Result<(), ApiError> {
        Ok(self.configurations.delete(config_id).await?)
    }

    pub async fn get_configuration(&self, config_id: &str) -> Result<AgentConfiguration, ApiError> {
        Ok(self.configurations.get(config_id).await?)
    }

    /// Active configurations, newest first.
    pub async fn list_configurations(&self) -> Result<Vec<AgentConfiguration>, ApiError> {
        Ok(self.configurations.list(true).await?)
    }

    // --- Conversations ---

    pub async fn start_conversation(
        &self,
        config_id: &str,
        session_id: Option<String>,
    ) -> Result<ConversationSession, ApiError> {
        Ok(self.conversations.start(config_id, session_id).await?)
    }

    pub async fn execute(
        &self,
        session_id: &str,
        text: &str,
    ) -> Result<ExecutionResult, ApiError> {
        Ok(self.orchestrator.execute(session_id, text).await?)
    }

    pub async fn execute_stream(
        &self,
        session_id: &str,
        text: &str,
    ) -> Result<ConversationStream, ApiError> {
        Ok(self.orchestrator.execute_stream(session_id, text).await?)
    }

    /// Active sessions, newest first, optionally for one configuration.
    pub async fn list_conversations(
        &self,
        config_id: Option<&str>,
    ) -> Result<Vec<ConversationSession>, ApiError> {
        Ok(self.conversations.list(config_id, true).await?)
    }

    pub async fn get_conversation(&self, session_id: &str) -> Result<ConversationSession, ApiError> {
        Ok(self.conversations.get(session_id).await?)
    }

    pub async fn delete_conversation(&self, session_id: &str) -> Result<(), ApiError> {
        Ok(self.conversations.delete(session_id).await?)
    }

    // --- Introspection ---

    pub async fn health(&self) -> Result<HealthReport, ApiError> {
        let active_sessions = self.conversations.count_active().await?;
        Ok(HealthReport {
            status: "healthy",
            active_sessions,
            cache: self.cache.stats().await,
            timestamp: Utc::now(),
        })
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }
}
