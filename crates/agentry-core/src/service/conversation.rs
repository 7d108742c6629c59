//! Conversation session service.
//!
//! Starts, lists, and retires sessions. Executing turns is the job of
//! [`ConversationOrchestrator`](crate::chat::orchestrator::ConversationOrchestrator).

use tracing::info;

use agentry_types::conversation::ConversationSession;
use agentry_types::error::ConversationError;

use crate::repository::configuration::ConfigurationRepository;
use crate::repository::conversation::ConversationRepository;

/// Orchestrates session lifecycle.
///
/// Generic over both repositories: starting a session checks that its
/// configuration exists and is active.
pub struct ConversationService<V: ConversationRepository, C: ConfigurationRepository> {
    conversations: V,
    configurations: C,
}

impl<V: ConversationRepository, C: ConfigurationRepository> ConversationService<V, C> {
    pub fn new(conversations: V, configurations: C) -> Self {
        Self {
            conversations,
            configurations,
        }
    }

    /// Start a new, empty session against an active configuration.
    ///
    /// An explicit `session_id` that is already taken yields `Conflict`.
    pub async fn start(
        &self,
        config_id: &str,
        session_id: Option<String>,
    ) -> Result<ConversationSession, ConversationError> {
        let active = self
            .configurations
            .get(config_id)
            .await?
            .is_some_and(|c| c.active);
        if !active {
            return Err(ConversationError::ConfigurationNotFound(
                config_id.to_string(),
            ));
        }

        if let Some(id) = session_id.as_deref() {
            if self.conversations.exists(id).await? {
                return Err(ConversationError::Conflict(id.to_string()));
            }
        }

        let session = ConversationSession::new(config_id, session_id);
        self.conversations.create(&session).await?;
        info!(session_id = %session.session_id, config_id, "Started conversation");
        Ok(session)
    }

    /// Get an active session.
    pub async fn get(&self, session_id: &str) -> Result<ConversationSession, ConversationError> {
        self.conversations
            .get(session_id)
            .await?
            .filter(|s| s.active)
            .ok_or_else(|| ConversationError::SessionNotFound(session_id.to_string()))
    }

    pub async fn list(
        &self,
        config_id: Option<&str>,
        active_only: bool,
    ) -> Result<Vec<ConversationSession>, ConversationError> {
        Ok(self.conversations.list(config_id, active_only).await?)
    }

    /// Soft delete.
    pub async fn delete(&self, session_id: &str) -> Result<(), ConversationError> {
        self.get(session_id).await?;
        if !self.conversations.delete(session_id).await? {
            return Err(ConversationError::SessionNotFound(session_id.to_string()));
        }
        info!(session_id, "Deleted conversation");
        Ok(())
    }

    /// Physically remove a session, active or not.
    pub async fn purge(&self, session_id: &str) -> Result<(), ConversationError> {
        if !self.conversations.purge(session_id).await? {
            return Err(ConversationError::SessionNotFound(session_id.to_string()));
        }
        info!(session_id, "Purged conversation");
        Ok(())
    }

    pub async fn count_active(&self) -> Result<u64, ConversationError> {
        Ok(self.conversations.count(true).await?)
    }
}
