//! Global configuration types for Agentry.
//!
//! `GlobalConfig` represents the top-level `config.toml` that controls the
//! agent-instance cache, the storage backend, and engine defaults.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::engine::CacheSettings;

/// Default system prompt used when a configuration carries no override.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant with access to various tools. \
Use the available tools to help answer questions and complete tasks. \
Be concise and accurate in your responses.";

/// Top-level configuration for Agentry.
///
/// Loaded from `~/.agentry/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub engine: EngineConfig,
}

/// Which store backs configurations and sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::Sqlite => write!(f, "sqlite"),
            StorageBackend::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Overrides `sqlite://{data_dir}/agentry.db`.
    #[serde(default)]
    pub database_url: Option<String>,
}

/// Defaults for the OpenAI-compatible engine adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_system_prompt")]
    pub default_system_prompt: String,

    #[serde(default)]
    pub temperature: f32,

    #[serde(default)]
    pub max_tokens: Option<u32>,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            default_system_prompt: default_system_prompt(),
            temperature: 0.0,
            max_tokens: None,
        }
    }
}
