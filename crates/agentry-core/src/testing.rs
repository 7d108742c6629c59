//! Hand-written test doubles shared by the service and orchestrator tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::RwLock;

use agentry_types::agent::{AgentConfiguration, ToolServerConfig};
use agentry_types::conversation::{ConversationMessage, ConversationSession};
use agentry_types::engine::InvocationResult;
use agentry_types::error::{EngineError, RepositoryError};

use crate::engine::{AgentEngine, AgentEngineFactory, BoxAgentEngine, FragmentStream};
use crate::repository::configuration::ConfigurationRepository;
use crate::repository::conversation::ConversationRepository;

#[derive(Clone, Default)]
pub struct MemoryConfigurations {
    inner: Arc<RwLock<HashMap<String, AgentConfiguration>>>,
}

impl ConfigurationRepository for MemoryConfigurations {
    async fn create(&self, config: &AgentConfiguration) -> Result<String, RepositoryError> {
        let mut map = self.inner.write().await;
        if map.contains_key(&config.config_id) {
            return Err(RepositoryError::Conflict(config.config_id.clone()));
        }
        map.insert(config.config_id.clone(), config.clone());
        Ok(config.config_id.clone())
    }

    async fn get(&self, config_id: &str) -> Result<Option<AgentConfiguration>, RepositoryError> {
        Ok(self.inner.read().await.get(config_id).cloned())
    }

    async fn update(&self, config: &AgentConfiguration) -> Result<bool, RepositoryError> {
        let mut map = self.inner.write().await;
        match map.get_mut(&config.config_id) {
            Some(slot) => {
                *slot = config.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, config_id: &str) -> Result<bool, RepositoryError> {
        let mut map = self.inner.write().await;
        Ok(map.get_mut(config_id).map(|c| c.active = false).is_some())
    }

    async fn purge(&self, config_id: &str) -> Result<bool, RepositoryError> {
        Ok(self.inner.write().await.remove(config_id).is_some())
    }

    async fn list(&self, active_only: bool) -> Result<Vec<AgentConfiguration>, RepositoryError> {
        let mut configs: Vec<_> = self
            .inner
            .read()
            .await
            .values()
            .filter(|c| !active_only || c.active)
            .cloned()
            .collect();
        configs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(configs)
    }

    async fn exists(&self, config_id: &str) -> Result<bool, RepositoryError> {
        Ok(self.inner.read().await.contains_key(config_id))
    }
}

/// Session store that can be told to fail every write.
#[derive(Clone, Default)]
pub struct MemoryConversations {
    inner: Arc<RwLock<HashMap<String, ConversationSession>>>,
    fail_updates: Arc<AtomicBool>,
    pub updates: Arc<AtomicUsize>,
}

impl MemoryConversations {
    pub fn fail_updates(&self) {
        self.fail_updates.store(true, Ordering::SeqCst);
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

impl ConversationRepository for MemoryConversations {
    async fn create(&self, session: &ConversationSession) -> Result<String, RepositoryError> {
        let mut map = self.inner.write().await;
        if map.contains_key(&session.session_id) {
            return Err(RepositoryError::Conflict(session.session_id.clone()));
        }
        map.insert(session.session_id.clone(), session.clone());
        Ok(session.session_id.clone())
    }

    async fn get(&self, session_id: &str) -> Result<Option<ConversationSession>, RepositoryError> {
        Ok(self.inner.read().await.get(session_id).cloned())
    }

    async fn update(&self, session: &ConversationSession) -> Result<bool, RepositoryError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(RepositoryError::Query("disk full".to_string()));
        }
        self.updates.fetch_add(1, Ordering::SeqCst);
        let mut map = self.inner.write().await;
        match map.get_mut(&session.session_id) {
            Some(slot) => {
                *slot = session.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, session_id: &str) -> Result<bool, RepositoryError> {
        let mut map = self.inner.write().await;
        Ok(map.get_mut(session_id).map(|s| s.active = false).is_some())
    }

    async fn purge(&self, session_id: &str) -> Result<bool, RepositoryError> {
        Ok(self.inner.write().await.remove(session_id).is_some())
    }

    async fn list(
        &self,
        config_id: Option<&str>,
        active_only: bool,
    ) -> Result<Vec<ConversationSession>, RepositoryError> {
        let mut sessions: Vec<_> = self
            .inner
            .read()
            .await
            .values()
            .filter(|s| !active_only || s.active)
            .filter(|s| config_id.is_none_or(|id| s.config_id == id))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn exists(&self, session_id: &str) -> Result<bool, RepositoryError> {
        Ok(self.inner.read().await.contains_key(session_id))
    }

    async fn count(&self, active_only: bool) -> Result<u64, RepositoryError> {
        let map = self.inner.read().await;
        Ok(map.values().filter(|s| !active_only || s.active).count() as u64)
    }
}

/// What a scripted engine does when invoked.
#[derive(Clone)]
pub enum Script {
    /// Answer "{prefix}{last human message}".
    Echo(String),
    /// Return no messages at all.
    Empty,
    /// Stream these fragments; `invoke` returns them joined.
    Fragments(Vec<String>),
    /// Stream these fragments, then fail.
    FailAfter(Vec<String>, String),
    /// Fail every invocation.
    FailInvoke(String),
    /// Fail while building the engine.
    FailCreate(String),
    /// Sleep this long, then echo.
    Slow(Duration),
}

pub struct ScriptedEngine {
    script: Script,
    /// Length of the history seen by each invocation.
    seen: Arc<Mutex<Vec<usize>>>,
}

impl ScriptedEngine {
    fn record(&self, messages: &[ConversationMessage]) {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(messages.len());
        }
    }
}

impl AgentEngine for ScriptedEngine {
    async fn invoke(
        &self,
        messages: &[ConversationMessage],
    ) -> Result<InvocationResult, EngineError> {
        self.record(messages);
        match &self.script {
            Script::Echo(prefix) => {
                let last = messages.last().map(|m| m.content.as_str()).unwrap_or("");
                Ok(InvocationResult::from_text(format!("{prefix}{last}")))
            }
            Script::Empty => Ok(InvocationResult::default()),
            Script::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                let last = messages.last().map(|m| m.content.as_str()).unwrap_or("");
                Ok(InvocationResult::from_text(last))
            }
            Script::Fragments(parts) => Ok(InvocationResult::from_text(parts.concat())),
            Script::FailAfter(_, msg) | Script::FailInvoke(msg) | Script::FailCreate(msg) => {
                Err(EngineError::Invocation(msg.clone()))
            }
        }
    }

    fn invoke_stream<'a>(&'a self, messages: Vec<ConversationMessage>) -> FragmentStream<'a> {
        self.record(&messages);
        let script = self.script.clone();
        Box::pin(async_stream::try_stream! {
            match script {
                Script::Fragments(parts) => {
                    for part in parts {
                        yield part;
                    }
                }
                Script::FailAfter(parts, msg) => {
                    for part in parts {
                        yield part;
                    }
                    Err(EngineError::Invocation(msg))?;
                }
                Script::Echo(prefix) => {
                    let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
                    yield format!("{prefix}{last}");
                }
                Script::Empty => {}
                Script::Slow(delay) => {
                    tokio::time::sleep(delay).await;
                    yield messages.last().map(|m| m.content.clone()).unwrap_or_default();
                }
                Script::FailInvoke(msg) | Script::FailCreate(msg) => {
                    Err(EngineError::Invocation(msg))?;
                }
            }
        })
    }
}

#[derive(Clone)]
pub struct ScriptedFactory {
    script: Script,
    pub builds: Arc<AtomicUsize>,
    pub seen: Arc<Mutex<Vec<usize>>>,
}

impl ScriptedFactory {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            builds: Arc::new(AtomicUsize::new(0)),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<usize> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl AgentEngineFactory for ScriptedFactory {
    async fn create_from_config(
        &self,
        _config: &AgentConfiguration,
    ) -> Result<BoxAgentEngine, EngineError> {
        if let Script::FailCreate(msg) = &self.script {
            return Err(EngineError::Creation(msg.clone()));
        }
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(BoxAgentEngine::new(ScriptedEngine {
            script: self.script.clone(),
            seen: Arc::clone(&self.seen),
        }))
    }
}

pub fn calc_config(name: &str) -> AgentConfiguration {
    AgentConfiguration::new(
        name,
        vec![ToolServerConfig::stdio(
            "calc",
            "python",
            vec!["-m".to_string(), "calc_server".to_string()],
        )],
        None,
        None,
    )
}
