//! Engine invocation results and agent-instance cache types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conversation::ConversationMessage;

/// Fixed answer used when an engine returns no messages.
pub const EMPTY_RESPONSE_TEXT: &str = "Agent executed but returned no response.";

/// Output of one engine invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvocationResult {
    /// Messages produced by the engine, in order. The last one is the answer.
    pub messages: Vec<ConversationMessage>,
}

impl InvocationResult {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            messages: vec![ConversationMessage::assistant(text)],
        }
    }

    /// Content of the last message, or [`EMPTY_RESPONSE_TEXT`] when there is none.
    pub fn final_text(&self) -> String {
        self.messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_else(|| EMPTY_RESPONSE_TEXT.to_string())
    }
}

/// Capacity and idle limits for the agent-instance cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_max_size")]
    pub max_size: usize,
    #[serde(default = "default_max_idle_secs")]
    pub max_idle_secs: u64,
    /// Cadence of the background stale sweep. `0` disables it.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_max_size() -> usize {
    50
}

fn default_max_idle_secs() -> u64 {
    30 * 60
}

fn default_sweep_interval_secs() -> u64 {
    5 * 60
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_size: default_max_size(),
            max_idle_secs: default_max_idle_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

/// Per-entry figures reported by the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntryStats {
    pub config_id: String,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    pub usage_count: u64,
}

/// Snapshot of the cache contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub max_idle_secs: u64,
    pub entries: Vec<CacheEntryStats>,
}
