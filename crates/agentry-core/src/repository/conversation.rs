//! Conversation repository trait definition.

use agentry_types::conversation::ConversationSession;
use agentry_types::error::RepositoryError;

/// Repository trait for conversation session persistence.
///
/// A session is stored as one document: `update` replaces the whole message
/// sequence and history atomically. There is no optimistic concurrency
/// control, so concurrent writers to one session are last-writer-wins.
pub trait ConversationRepository: Send + Sync {
    /// Store a new session. Returns its id; a duplicate id is a `Conflict`.
    fn create(
        &self,
        session: &ConversationSession,
    ) -> impl std::future::Future<Output = Result<String, RepositoryError>> + Send;

    /// Get a session with its messages in order, active or not.
    fn get(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<ConversationSession>, RepositoryError>> + Send;

    /// Full replace. Returns false when the id is unknown.
    fn update(
        &self,
        session: &ConversationSession,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Soft delete. Returns false when the id is unknown.
    fn delete(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Physically remove a session and its messages.
    fn purge(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// List sessions, newest first, optionally for one configuration.
    fn list(
        &self,
        config_id: Option<&str>,
        active_only: bool,
    ) -> impl std::future::Future<Output = Result<Vec<ConversationSession>, RepositoryError>> + Send;

    fn exists(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    fn count(
        &self,
        active_only: bool,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
