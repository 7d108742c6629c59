//! Runtime-selected storage backends.
//!
//! The backend comes from `config.toml`, so the composition root needs one
//! concrete type per repository trait. These enums dispatch to SQLite or the
//! in-memory maps.

use agentry_core::repository::configuration::ConfigurationRepository;
use agentry_core::repository::conversation::ConversationRepository;
use agentry_types::agent::AgentConfiguration;
use agentry_types::config::StorageBackend;
use agentry_types::conversation::ConversationSession;
use agentry_types::error::RepositoryError;

use crate::in_memory::{InMemoryConfigurationRepository, InMemoryConversationRepository};
use crate::sqlite::configuration::SqliteConfigurationRepository;
use crate::sqlite::conversation::SqliteConversationRepository;
use crate::sqlite::pool::DatabasePool;

#[derive(Clone)]
pub enum ConfigurationStore {
    Sqlite(SqliteConfigurationRepository),
    Memory(InMemoryConfigurationRepository),
}

#[derive(Clone)]
pub enum ConversationStore {
    Sqlite(SqliteConversationRepository),
    Memory(InMemoryConversationRepository),
}

/// Open both stores for the configured backend.
///
/// `database_url` is only used by the SQLite backend.
pub async fn open_stores(
    backend: StorageBackend,
    database_url: &str,
) -> Result<(ConfigurationStore, ConversationStore), sqlx::Error> {
    match backend {
        StorageBackend::Sqlite => {
            let pool = DatabasePool::new(database_url).await?;
            Ok((
                ConfigurationStore::Sqlite(SqliteConfigurationRepository::new(pool.clone())),
                ConversationStore::Sqlite(SqliteConversationRepository::new(pool)),
            ))
        }
        StorageBackend::Memory => Ok((
            ConfigurationStore::Memory(InMemoryConfigurationRepository::new()),
            ConversationStore::Memory(InMemoryConversationRepository::new()),
        )),
    }
}

impl ConfigurationRepository for ConfigurationStore {
    async fn create(&self, config: &AgentConfiguration) -> Result<String, RepositoryError> {
        match self {
            Self::Sqlite(repo) => repo.create(config).await,
            Self::Memory(repo) => repo.create(config).await,
        }
    }

    async fn get(&self, config_id: &str) -> Result<Option<AgentConfiguration>, RepositoryError> {
        match self {
            Self::Sqlite(repo) => repo.get(config_id).await,
            Self::Memory(repo) => repo.get(config_id).await,
        }
    }

    async fn update(&self, config: &AgentConfiguration) -> Result<bool, RepositoryError> {
        match self {
            Self::Sqlite(repo) => repo.update(config).await,
            Self::Memory(repo) => repo.update(config).await,
        }
    }

    async fn delete(&self, config_id: &str) -> Result<bool, RepositoryError> {
        match self {
            Self::Sqlite(repo) => repo.delete(config_id).await,
            Self::Memory(repo) => repo.delete(config_id).await,
        }
    }

    async fn purge(&self, config_id: &str) -> Result<bool, RepositoryError> {
        match self {
            Self::Sqlite(repo) => repo.purge(config_id).await,
            Self::Memory(repo) => repo.purge(config_id).await,
        }
    }

    async fn list(&self, active_only: bool) -> Result<Vec<AgentConfiguration>, RepositoryError> {
        match self {
            Self::Sqlite(repo) => repo.list(active_only).await,
            Self::Memory(repo) => repo.list(active_only).await,
        }
    }

    async fn exists(&self, config_id: &str) -> Result<bool, RepositoryError> {
        match self {
            Self::Sqlite(repo) => repo.exists(config_id).await,
            Self::Memory(repo) => repo.exists(config_id).await,
        }
    }
}

impl ConversationRepository for ConversationStore {
    async fn create(&self, session: &ConversationSession) -> Result<String, RepositoryError> {
        match self {
            Self::Sqlite(repo) => repo.create(session).await,
            Self::Memory(repo) => repo.create(session).await,
        }
    }

    async fn get(&self, session_id: &str) -> Result<Option<ConversationSession>, RepositoryError> {
        match self {
            Self::Sqlite(repo) => repo.get(session_id).await,
            Self::Memory(repo) => repo.get(session_id).await,
        }
    }

    async fn update(&self, session: &ConversationSession) -> Result<bool, RepositoryError> {
        match self {
            Self::Sqlite(repo) => repo.update(session).await,
            Self::Memory(repo) => repo.update(session).await,
        }
    }

    async fn delete(&self, session_id: &str) -> Result<bool, RepositoryError> {
        match self {
            Self::Sqlite(repo) => repo.delete(session_id).await,
            Self::Memory(repo) => repo.delete(session_id).await,
        }
    }

    async fn purge(&self, session_id: &str) -> Result<bool, RepositoryError> {
        match self {
            Self::Sqlite(repo) => repo.purge(session_id).await,
            Self::Memory(repo) => repo.purge(session_id).await,
        }
    }

    async fn list(
        &self,
        config_id: Option<&str>,
        active_only: bool,
    ) -> Result<Vec<ConversationSession>, RepositoryError> {
        match self {
            Self::Sqlite(repo) => repo.list(config_id, active_only).await,
            Self::Memory(repo) => repo.list(config_id, active_only).await,
        }
    }

    async fn exists(&self, session_id: &str) -> Result<bool, RepositoryError> {
        match self {
            Self::Sqlite(repo) => repo.exists(session_id).await,
            Self::Memory(repo) => repo.exists(session_id).await,
        }
    }

    async fn count(&self, active_only: bool) -> Result<u64, RepositoryError> {
        match self {
            Self::Sqlite(repo) => repo.count(active_only).await,
            Self::Memory(repo) => repo.count(active_only).await,
        }
    }
}
