//! Facade error type and its transport-neutral classification.

use agentry_types::error::{ConfigurationError, ConversationError};

/// Error returned by every [`AppState`](crate::AppState) operation.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Conversation(#[from] ConversationError),
}

/// Coarse error class an embedding transport maps to its own status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidConfiguration,
    Conflict,
    StorageFailure,
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Configuration(ConfigurationError::NotFound(_))
            | ApiError::Conversation(ConversationError::SessionNotFound(_))
            | ApiError::Conversation(ConversationError::ConfigurationNotFound(_)) => {
                ErrorKind::NotFound
            }
            ApiError::Configuration(ConfigurationError::Invalid(_)) => {
                ErrorKind::InvalidConfiguration
            }
            ApiError::Configuration(ConfigurationError::Conflict(_))
            | ApiError::Conversation(ConversationError::Conflict(_)) => ErrorKind::Conflict,
            ApiError::Configuration(ConfigurationError::Storage(_))
            | ApiError::Conversation(ConversationError::Storage(_)) => ErrorKind::StorageFailure,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Configuration(ConfigurationError::NotFound(_)) => "CONFIGURATION_NOT_FOUND",
            ApiError::Conversation(ConversationError::ConfigurationNotFound(_)) => {
                "CONFIGURATION_NOT_FOUND"
            }
            ApiError::Conversation(ConversationError::SessionNotFound(_)) => "SESSION_NOT_FOUND",
            ApiError::Configuration(ConfigurationError::Invalid(_)) => "VALIDATION_ERROR",
            ApiError::Configuration(ConfigurationError::Conflict(_))
            | ApiError::Conversation(ConversationError::Conflict(_)) => "CONFLICT",
            ApiError::Configuration(ConfigurationError::Storage(_))
            | ApiError::Conversation(ConversationError::Storage(_)) => "STORAGE_ERROR",
        }
    }
}
