use thiserror::Error;

/// Errors related to agent configuration operations.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("configuration '{0}' not found")]
    NotFound(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("configuration '{0}' already exists")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Errors related to conversation operations.
#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("session '{0}' not found")]
    SessionNotFound(String),

    #[error("configuration '{0}' not found")]
    ConfigurationNotFound(String),

    #[error("session '{0}' already exists")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Errors raised while building, invoking, or retiring an agent engine.
///
/// The conversation orchestrator recovers every variant into an apology turn.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine creation failed: {0}")]
    Creation(String),

    #[error("engine invocation failed: {0}")]
    Invocation(String),

    #[error("tool server '{name}' failed: {message}")]
    ToolServer { name: String, message: String },

    #[error("engine shutdown failed: {0}")]
    Shutdown(String),
}

/// Errors from repository operations (used by trait definitions in agentry-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("query error: {0}")]
    Query(String),

    #[error("conflict: {0}")]
    Conflict(String),
}

impl From<RepositoryError> for ConfigurationError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(id) => ConfigurationError::Conflict(id),
            other => ConfigurationError::Storage(other.to_string()),
        }
    }
}

impl From<RepositoryError> for ConversationError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(id) => ConversationError::Conflict(id),
            other => ConversationError::Storage(other.to_string()),
        }
    }
}
