//! Agent configuration service.
//!
//! Validates and persists configurations. Updating or deleting a
//! configuration drops its cached engine so the next conversation turn
//! rebuilds it from the new definition.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use agentry_types::agent::{
    AgentConfiguration, CreateConfigurationRequest, UpdateConfigurationRequest,
};
use agentry_types::error::ConfigurationError;

use crate::engine::cache::AgentCache;
use crate::repository::configuration::ConfigurationRepository;

/// Check the structural rules of a configuration.
///
/// The name must be non-blank, there must be at least one tool server, every
/// tool server needs a name and a command, and names must be unique.
pub fn validate(config: &AgentConfiguration) -> Result<(), ConfigurationError> {
    if config.name.trim().is_empty() {
        return Err(ConfigurationError::Invalid(
            "configuration name cannot be empty".to_string(),
        ));
    }

    if config.tool_servers.is_empty() {
        return Err(ConfigurationError::Invalid(
            "at least one tool server must be configured".to_string(),
        ));
    }

    let mut names = HashSet::new();
    for server in &config.tool_servers {
        if server.name.trim().is_empty() {
            return Err(ConfigurationError::Invalid(
                "tool server name cannot be empty".to_string(),
            ));
        }
        if server.command.trim().is_empty() {
            return Err(ConfigurationError::Invalid(format!(
                "tool server '{}' has no command",
                server.name
            )));
        }
        if !names.insert(server.name.as_str()) {
            return Err(ConfigurationError::Invalid(format!(
                "tool server names must be unique (duplicate '{}')",
                server.name
            )));
        }
    }

    Ok(())
}

/// Service managing the configuration lifecycle.
///
/// Generic over `ConfigurationRepository` to maintain clean architecture
/// (agentry-core never depends on agentry-infra).
pub struct ConfigurationService<C: ConfigurationRepository> {
    repo: C,
    cache: Arc<AgentCache>,
}

impl<C: ConfigurationRepository> ConfigurationService<C> {
    pub fn new(repo: C, cache: Arc<AgentCache>) -> Self {
        Self { repo, cache }
    }

    /// Validate and persist a new configuration.
    pub async fn create(
        &self,
        request: CreateConfigurationRequest,
    ) -> Result<AgentConfiguration, ConfigurationError> {
        let config = AgentConfiguration::new(
            request.name.trim(),
            request.tool_servers,
            request.system_prompt,
            request.model_settings,
        );
        validate(&config)?;

        self.repo.create(&config).await?;
        info!(
            config_id = %config.config_id,
            name = %config.name,
            tool_servers = config.tool_servers.len(),
            "Created agent configuration"
        );
        Ok(config)
    }

    /// Get an active configuration.
    pub async fn get(&self, config_id: &str) -> Result<AgentConfiguration, ConfigurationError> {
        self.repo
            .get(config_id)
            .await?
            .filter(|c| c.active)
            .ok_or_else(|| ConfigurationError::NotFound(config_id.to_string()))
    }

    pub async fn list(
        &self,
        active_only: bool,
    ) -> Result<Vec<AgentConfiguration>, ConfigurationError> {
        Ok(self.repo.list(active_only).await?)
    }

    /// Apply a partial update, re-validate, and persist.
    pub async fn update(
        &self,
        config_id: &str,
        request: UpdateConfigurationRequest,
    ) -> Result<AgentConfiguration, ConfigurationError> {
        let mut config = self.get(config_id).await?;

        if let Some(name) = request.name {
            config.name = name.trim().to_string();
        }
        if let Some(tool_servers) = request.tool_servers {
            config.tool_servers = tool_servers;
        }
        if let Some(system_prompt) = request.system_prompt {
            config.system_prompt = system_prompt;
        }
        if let Some(model_settings) = request.model_settings {
            config.model_settings = model_settings;
        }
        validate(&config)?;

        let now = Utc::now();
        config.updated_at = if now > config.updated_at {
            now
        } else {
            config.updated_at + chrono::Duration::microseconds(1)
        };

        if !self.repo.update(&config).await? {
            return Err(ConfigurationError::NotFound(config_id.to_string()));
        }
        self.cache.invalidate(config_id).await;
        info!(config_id, "Updated agent configuration");
        Ok(config)
    }

    /// Soft delete. Sessions referencing the configuration are left in place.
    pub async fn delete(&self, config_id: &str) -> Result<(), ConfigurationError> {
        self.get(config_id).await?;
        if !self.repo.delete(config_id).await? {
            return Err(ConfigurationError::NotFound(config_id.to_string()));
        }
        self.cache.invalidate(config_id).await;
        info!(config_id, "Deleted agent configuration");
        Ok(())
    }

    /// Physically remove a configuration, active or not.
    pub async fn purge(&self, config_id: &str) -> Result<(), ConfigurationError> {
        if !self.repo.purge(config_id).await? {
            return Err(ConfigurationError::NotFound(config_id.to_string()));
        }
        self.cache.invalidate(config_id).await;
        info!(config_id, "Purged agent configuration");
        Ok(())
    }
}
