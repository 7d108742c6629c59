//! In-memory repositories backed by `DashMap`.
//!
//! Used for `storage.backend = "memory"`. Clones share the same map, so one
//! store can be handed to several services. Values are cloned on read; no
//! `DashMap` guard is ever held across an await.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use agentry_core::repository::configuration::ConfigurationRepository;
use agentry_core::repository::conversation::ConversationRepository;
use agentry_types::agent::AgentConfiguration;
use agentry_types::conversation::ConversationSession;
use agentry_types::error::RepositoryError;

#[derive(Clone, Default)]
pub struct InMemoryConfigurationRepository {
    inner: Arc<DashMap<String, AgentConfiguration>>,
}

impl InMemoryConfigurationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigurationRepository for InMemoryConfigurationRepository {
    async fn create(&self, config: &AgentConfiguration) -> Result<String, RepositoryError> {
        match self.inner.entry(config.config_id.clone()) {
            Entry::Occupied(_) => Err(RepositoryError::Conflict(format!(
                "configuration '{}' already exists",
                config.config_id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(config.clone());
                Ok(config.config_id.clone())
            }
        }
    }

    async fn get(&self, config_id: &str) -> Result<Option<AgentConfiguration>, RepositoryError> {
        Ok(self.inner.get(config_id).map(|c| c.value().clone()))
    }

    async fn update(&self, config: &AgentConfiguration) -> Result<bool, RepositoryError> {
        match self.inner.get_mut(&config.config_id) {
            Some(mut slot) => {
                *slot = config.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, config_id: &str) -> Result<bool, RepositoryError> {
        match self.inner.get_mut(config_id) {
            Some(mut slot) => {
                slot.active = false;
                slot.updated_at = chrono::Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn purge(&self, config_id: &str) -> Result<bool, RepositoryError> {
        Ok(self.inner.remove(config_id).is_some())
    }

    async fn list(&self, active_only: bool) -> Result<Vec<AgentConfiguration>, RepositoryError> {
        let mut configs: Vec<AgentConfiguration> = self
            .inner
            .iter()
            .filter(|c| !active_only || c.active)
            .map(|c| c.value().clone())
            .collect();
        configs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(configs)
    }

    async fn exists(&self, config_id: &str) -> Result<bool, RepositoryError> {
        Ok(self.inner.contains_key(config_id))
    }
}

#[derive(Clone, Default)]
pub struct InMemoryConversationRepository {
    inner: Arc<DashMap<String, ConversationSession>>,
}

impl InMemoryConversationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConversationRepository for InMemoryConversationRepository {
    async fn create(&self, session: &ConversationSession) -> Result<String, RepositoryError> {
        match self.inner.entry(session.session_id.clone()) {
            Entry::Occupied(_) => Err(RepositoryError::Conflict(format!(
                "session '{}' already exists",
                session.session_id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(session.clone());
                Ok(session.session_id.clone())
            }
        }
    }

    async fn get(&self, session_id: &str) -> Result<Option<ConversationSession>, RepositoryError> {
        Ok(self.inner.get(session_id).map(|s| s.value().clone()))
    }

    async fn update(&self, session: &ConversationSession) -> Result<bool, RepositoryError> {
        match self.inner.get_mut(&session.session_id) {
            Some(mut slot) => {
                *slot = session.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, session_id: &str) -> Result<bool, RepositoryError> {
        match self.inner.get_mut(session_id) {
            Some(mut slot) => {
                slot.active = false;
                slot.updated_at = chrono::Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn purge(&self, session_id: &str) -> Result<bool, RepositoryError> {
        Ok(self.inner.remove(session_id).is_some())
    }

    async fn list(
        &self,
        config_id: Option<&str>,
        active_only: bool,
    ) -> Result<Vec<ConversationSession>, RepositoryError> {
        let mut sessions: Vec<ConversationSession> = self
            .inner
            .iter()
            .filter(|s| !active_only || s.active)
            .filter(|s| config_id.is_none_or(|id| s.config_id == id))
            .map(|s| s.value().clone())
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn exists(&self, session_id: &str) -> Result<bool, RepositoryError> {
        Ok(self.inner.contains_key(session_id))
    }

    async fn count(&self, active_only: bool) -> Result<u64, RepositoryError> {
        Ok(self
            .inner
            .iter()
            .filter(|s| !active_only || s.active)
            .count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentry_types::agent::ToolServerConfig;
    use agentry_types::conversation::ConversationMessage;

    fn make_config(name: &str) -> AgentConfiguration {
        AgentConfiguration::new(
            name,
            vec![ToolServerConfig::stdio("calc", "calc-server", vec![])],
            None,
            None,
        )
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let repo = InMemoryConfigurationRepository::new();
        let clone = repo.clone();
        let config = make_config("demo");

        repo.create(&config).await.unwrap();
        assert!(clone.exists(&config.config_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_configuration_lifecycle() {
        let repo = InMemoryConfigurationRepository::new();
        let config = make_config("demo");
        repo.create(&config).await.unwrap();

        assert!(matches!(
            repo.create(&config).await,
            Err(RepositoryError::Conflict(_))
        ));

        assert!(repo.delete(&config.config_id).await.unwrap());
        assert!(repo.list(true).await.unwrap().is_empty());
        assert!(!repo.get(&config.config_id).await.unwrap().unwrap().active);

        assert!(repo.purge(&config.config_id).await.unwrap());
        assert!(repo.get(&config.config_id).await.unwrap().is_none());
        assert!(!repo.delete(&config.config_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_session_update_and_filters() {
        let repo = InMemoryConversationRepository::new();
        let mut session = ConversationSession::new("cfg-1", None);
        repo.create(&session).await.unwrap();
        repo.create(&ConversationSession::new("cfg-2", None))
            .await
            .unwrap();

        session.messages.push(ConversationMessage::human("hi"));
        assert!(repo.update(&session).await.unwrap());
        let fetched = repo.get(&session.session_id).await.unwrap().unwrap();
        assert_eq!(fetched.messages.len(), 1);

        assert_eq!(repo.list(Some("cfg-1"), true).await.unwrap().len(), 1);
        assert_eq!(repo.count(true).await.unwrap(), 2);

        repo.delete(&session.session_id).await.unwrap();
        assert_eq!(repo.count(true).await.unwrap(), 1);
        assert_eq!(repo.count(false).await.unwrap(), 2);
    }
}
