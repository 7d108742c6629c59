//! Agent configuration types for Agentry.
//!
//! An [`AgentConfiguration`] is a reusable, named bundle of tool-server
//! descriptors plus prompt/model overrides. Many conversations execute
//! against one configuration and share a single engine instance built from it.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Model-settings mapping (e.g. `model`, `temperature`, `max_tokens`).
pub type ModelSettings = BTreeMap<String, serde_json::Value>;

/// How the engine talks to a tool server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    #[default]
    Stdio,
    Sse,
    StreamableHttp,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Stdio => write!(f, "stdio"),
            TransportKind::Sse => write!(f, "sse"),
            TransportKind::StreamableHttp => write!(f, "streamable_http"),
        }
    }
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stdio" => Ok(TransportKind::Stdio),
            "sse" => Ok(TransportKind::Sse),
            "streamable_http" => Ok(TransportKind::StreamableHttp),
            other => Err(format!("invalid transport kind: '{other}'")),
        }
    }
}

/// Descriptor for one external tool server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolServerConfig {
    /// Unique within the owning configuration.
    pub name: String,
    /// Launch command.
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub transport: TransportKind,
}

impl ToolServerConfig {
    /// Stdio tool server with no extra environment.
    pub fn stdio(name: impl Into<String>, command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args,
            env: BTreeMap::new(),
            transport: TransportKind::Stdio,
        }
    }
}

/// A reusable agent configuration.
///
/// `config_id` is assigned at creation and never changes. `active = false`
/// marks a soft-deleted configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfiguration {
    pub config_id: String,
    pub name: String,
    pub tool_servers: Vec<ToolServerConfig>,
    pub system_prompt: Option<String>,
    pub model_settings: Option<ModelSettings>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub active: bool,
}

impl AgentConfiguration {
    /// Build a new, active configuration with a freshly generated id.
    pub fn new(
        name: impl Into<String>,
        tool_servers: Vec<ToolServerConfig>,
        system_prompt: Option<String>,
        model_settings: Option<ModelSettings>,
    ) -> Self {
        let now = Utc::now();
        Self {
            config_id: Uuid::now_v7().to_string(),
            name: name.into(),
            tool_servers,
            system_prompt,
            model_settings,
            created_at: now,
            updated_at: now,
            active: true,
        }
    }

    /// Look up a string model setting.
    pub fn model_setting_str(&self, key: &str) -> Option<&str> {
        self.model_settings
            .as_ref()
            .and_then(|m| m.get(key))
            .and_then(|v| v.as_str())
    }

    /// Look up a numeric model setting.
    pub fn model_setting_f64(&self, key: &str) -> Option<f64> {
        self.model_settings
            .as_ref()
            .and_then(|m| m.get(key))
            .and_then(|v| v.as_f64())
    }
}

/// Request to create a new configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateConfigurationRequest {
    pub name: String,
    pub tool_servers: Vec<ToolServerConfig>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub model_settings: Option<ModelSettings>,
}

/// Partial update applied by `ConfigurationService::update`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateConfigurationRequest {
    pub name: Option<String>,
    pub tool_servers: Option<Vec<ToolServerConfig>>,
    /// `Some(None)` clears the override.
    pub system_prompt: Option<Option<String>>,
    pub model_settings: Option<Option<ModelSettings>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_kind_roundtrip() {
        for kind in [
            TransportKind::Stdio,
            TransportKind::Sse,
            TransportKind::StreamableHttp,
        ] {
            let parsed: TransportKind = kind.to_string().parse().unwrap();
            assert_eq!(kind, parsed);
        }
    }

    #[test]
    fn test_tool_server_defaults_on_deserialize() {
        let server: ToolServerConfig =
            serde_json::from_str(r#"{"name":"calc","command":"calc-server"}"#).unwrap();
        assert!(server.args.is_empty());
        assert!(server.env.is_empty());
        assert_eq!(server.transport, TransportKind::Stdio);
    }

    #[test]
    fn test_new_configuration_is_active_with_v7_id() {
        let config = AgentConfiguration::new(
            "demo",
            vec![ToolServerConfig::stdio("calc", "calc-server", vec![])],
            None,
            None,
        );
        assert!(config.active);
        assert_eq!(config.created_at, config.updated_at);
        let id = Uuid::parse_str(&config.config_id).unwrap();
        assert_eq!(id.get_version_num(), 7);
    }

    #[test]
    fn test_model_setting_lookups() {
        let mut settings = ModelSettings::new();
        settings.insert("model".into(), serde_json::json!("gpt-4o"));
        settings.insert("temperature".into(), serde_json::json!(0.2));
        let config = AgentConfiguration::new("demo", vec![], None, Some(settings));

        assert_eq!(config.model_setting_str("model"), Some("gpt-4o"));
        assert_eq!(config.model_setting_f64("temperature"), Some(0.2));
        assert_eq!(config.model_setting_str("temperature"), None);
        assert_eq!(config.model_setting_f64("missing"), None);
    }
}
