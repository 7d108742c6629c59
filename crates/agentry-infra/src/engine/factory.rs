//! Builds [`ChatCompletionEngine`]s from agent configurations.

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use secrecy::{ExposeSecret, SecretString};

use agentry_core::engine::{AgentEngineFactory, BoxAgentEngine};
use agentry_types::agent::AgentConfiguration;
use agentry_types::config::EngineConfig;
use agentry_types::error::EngineError;

use super::openai::{ChatCompletionEngine, RequestSettings};
use super::tool_servers::ToolServerSet;

/// Factory for OpenAI-compatible engines.
///
/// The API key is read once from the environment variable named by
/// `[engine] api_key_env` and wrapped in [`SecretString`]; it is never logged.
pub struct ChatCompletionEngineFactory {
    defaults: EngineConfig,
    api_key: SecretString,
}

impl ChatCompletionEngineFactory {
    pub fn new(defaults: EngineConfig, api_key: SecretString) -> Self {
        Self { defaults, api_key }
    }

    /// Read the API key from the environment. A missing key is allowed
    /// (local OpenAI-compatible servers often need none) but logged.
    pub fn from_config(defaults: &EngineConfig) -> Self {
        let api_key = match std::env::var(&defaults.api_key_env) {
            Ok(key) => key,
            Err(_) => {
                tracing::warn!(
                    env = %defaults.api_key_env,
                    "API key environment variable not set; requests will be unauthenticated"
                );
                String::new()
            }
        };
        Self::new(defaults.clone(), SecretString::from(api_key))
    }

    /// Resolve request parameters: configuration model settings first, then
    /// the `[engine]` defaults.
    pub fn request_settings(&self, config: &AgentConfiguration) -> RequestSettings {
        let system_prompt = config
            .system_prompt
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(&self.defaults.default_system_prompt)
            .to_string();

        RequestSettings {
            model: config
                .model_setting_str("model")
                .unwrap_or(&self.defaults.model)
                .to_string(),
            system_prompt,
            temperature: config
                .model_setting_f64("temperature")
                .map(|t| t as f32)
                .unwrap_or(self.defaults.temperature),
            max_tokens: config
                .model_setting_f64("max_tokens")
                .filter(|n| *n >= 1.0)
                .map(|n| n as u32)
                .or(self.defaults.max_tokens),
        }
    }

    fn client(&self) -> Client<OpenAIConfig> {
        let config = OpenAIConfig::new()
            .with_api_key(self.api_key.expose_secret())
            .with_api_base(&self.defaults.base_url);
        Client::with_config(config)
    }
}

impl AgentEngineFactory for ChatCompletionEngineFactory {
    async fn create_from_config(
        &self,
        config: &AgentConfiguration,
    ) -> Result<BoxAgentEngine, EngineError> {
        let settings = self.request_settings(config);
        let tool_servers = ToolServerSet::launch(&config.tool_servers)?;

        tracing::info!(
            config_id = %config.config_id,
            model = %settings.model,
            tool_servers = tool_servers.len(),
            "engine created"
        );

        Ok(BoxAgentEngine::new(ChatCompletionEngine::new(
            self.client(),
            settings,
            tool_servers,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentry_types::agent::{ModelSettings, ToolServerConfig};
    use agentry_types::config::DEFAULT_SYSTEM_PROMPT;

    fn factory() -> ChatCompletionEngineFactory {
        ChatCompletionEngineFactory::new(
            EngineConfig::default(),
            SecretString::from("sk-test".to_string()),
        )
    }

    fn config_with(settings: Option<ModelSettings>, prompt: Option<&str>) -> AgentConfiguration {
        AgentConfiguration::new(
            "demo",
            vec![ToolServerConfig::stdio("calc", "calc-server", vec![])],
            prompt.map(String::from),
            settings,
        )
    }

    #[test]
    fn test_request_settings_fall_back_to_defaults() {
        let settings = factory().request_settings(&config_with(None, None));
        assert_eq!(settings.model, "gpt-4o");
        assert_eq!(settings.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(settings.temperature, 0.0);
        assert_eq!(settings.max_tokens, None);
    }

    #[test]
    fn test_request_settings_prefer_model_settings() {
        let mut model_settings = ModelSettings::new();
        model_settings.insert("model".into(), serde_json::json!("gpt-4o-mini"));
        model_settings.insert("temperature".into(), serde_json::json!(0.5));
        model_settings.insert("max_tokens".into(), serde_json::json!(512));

        let settings = factory()
            .request_settings(&config_with(Some(model_settings), Some("You are a calculator.")));
        assert_eq!(settings.model, "gpt-4o-mini");
        assert_eq!(settings.system_prompt, "You are a calculator.");
        assert_eq!(settings.temperature, 0.5);
        assert_eq!(settings.max_tokens, Some(512));
    }

    #[test]
    fn test_blank_system_prompt_uses_default() {
        let settings = factory().request_settings(&config_with(None, Some("   ")));
        assert_eq!(settings.system_prompt, DEFAULT_SYSTEM_PROMPT);
    }

    #[tokio::test]
    async fn test_create_fails_when_tool_server_cannot_start() {
        let mut config = config_with(None, None);
        config.tool_servers = vec![ToolServerConfig::stdio(
            "calc",
            "/nonexistent/agentry-calc-server",
            vec![],
        )];

        let err = factory().create_from_config(&config).await.unwrap_err();
        assert!(matches!(err, EngineError::ToolServer { ref name, .. } if name == "calc"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_create_and_shutdown_engine() {
        let mut config = config_with(None, None);
        config.tool_servers = vec![ToolServerConfig::stdio(
            "sleeper",
            "sleep",
            vec!["30".to_string()],
        )];

        let engine = factory().create_from_config(&config).await.unwrap();
        engine.shutdown().await.unwrap();
    }
}
