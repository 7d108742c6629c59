//! Configuration repository trait definition.

use agentry_types::agent::AgentConfiguration;
use agentry_types::error::RepositoryError;

/// Repository trait for agent configuration persistence.
///
/// Implementations live in agentry-infra (e.g., SqliteConfigurationRepository).
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait ConfigurationRepository: Send + Sync {
    /// Store a new configuration. Returns its id; a duplicate id is a `Conflict`.
    fn create(
        &self,
        config: &AgentConfiguration,
    ) -> impl std::future::Future<Output = Result<String, RepositoryError>> + Send;

    /// Get a configuration by id, active or not.
    fn get(
        &self,
        config_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<AgentConfiguration>, RepositoryError>> + Send;

    /// Replace a stored configuration. Returns false when the id is unknown.
    fn update(
        &self,
        config: &AgentConfiguration,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Soft delete. Returns false when the id is unknown.
    fn delete(
        &self,
        config_id: &str,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Physically remove a configuration. Returns false when the id is unknown.
    fn purge(
        &self,
        config_id: &str,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// List configurations, newest first.
    fn list(
        &self,
        active_only: bool,
    ) -> impl std::future::Future<Output = Result<Vec<AgentConfiguration>, RepositoryError>> + Send;

    fn exists(
        &self,
        config_id: &str,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;
}
