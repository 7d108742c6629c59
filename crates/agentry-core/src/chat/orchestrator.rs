//! Conversation execution orchestrator.
//!
//! Runs one turn of a conversation: loads the session and its
//! configuration, appends the human turn, resolves the shared engine through
//! the agent cache, invokes it with the full history, appends the assistant
//! turn, and persists the session.
//!
//! Engine failures (creation or invocation) never escape. They become an
//! apology turn that is persisted and returned like a normal answer.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::{Stream, StreamExt};
use tracing::{Instrument, Span, debug, info_span, warn};

use agentry_types::agent::AgentConfiguration;
use agentry_types::conversation::{
    ConversationSession, ConversationStreamEvent, ExecutionResult,
};
use agentry_types::engine::EMPTY_RESPONSE_TEXT;
use agentry_types::error::{ConversationError, EngineError};

use crate::chat::session::SessionManager;
use crate::engine::cache::AgentCache;
use crate::engine::AgentEngineFactory;
use crate::repository::configuration::ConfigurationRepository;
use crate::repository::conversation::ConversationRepository;

/// Stream of events for one streaming turn.
pub type ConversationStream = Pin<Box<dyn Stream<Item = ConversationStreamEvent> + Send + 'static>>;

/// Assistant text recorded when the engine cannot produce an answer.
pub fn apology_text(error: &EngineError) -> String {
    format!("I apologize, but I encountered an error: {error}")
}

/// Executes conversation turns against shared, cached engines.
///
/// Cloning the repositories must be cheap (they share a pool or map), since
/// streaming turns take their own handles into the returned stream.
pub struct ConversationOrchestrator<C, V, F>
where
    C: ConfigurationRepository,
    V: ConversationRepository,
    F: AgentEngineFactory,
{
    configurations: C,
    conversations: V,
    factory: Arc<F>,
    cache: Arc<AgentCache>,
}

impl<C, V, F> ConversationOrchestrator<C, V, F>
where
    C: ConfigurationRepository,
    V: ConversationRepository + Clone + 'static,
    F: AgentEngineFactory + 'static,
{
    pub fn new(configurations: C, conversations: V, factory: Arc<F>, cache: Arc<AgentCache>) -> Self {
        Self {
            configurations,
            conversations,
            factory,
            cache,
        }
    }

    pub fn cache(&self) -> &Arc<AgentCache> {
        &self.cache
    }

    /// Run one non-streaming turn and return the assistant's answer.
    ///
    /// Only a missing session/configuration or a storage failure is an
    /// error; engine failures are answered with an apology. The human turn is
    /// stored before the engine runs, so dropping this future mid-invocation
    /// leaves the session with the question and no answer.
    pub async fn execute(
        &self,
        session_id: &str,
        user_text: &str,
    ) -> Result<ExecutionResult, ConversationError> {
        let (session, config) = self.load(session_id).await?;
        let span = info_span!(
            "conversation.execute",
            session_id = %session.session_id,
            config_id = %config.config_id,
            stream = false,
        );

        self.run_turn(session, config, user_text)
            .instrument(span)
            .await
    }

    /// Run one streaming turn.
    ///
    /// The human turn is persisted before this returns. The stream yields
    /// `Content` fragments and then `Done` once the concatenated response is
    /// persisted as a single assistant turn. Dropping the stream early
    /// leaves the session without an assistant turn.
    pub async fn execute_stream(
        &self,
        session_id: &str,
        user_text: &str,
    ) -> Result<ConversationStream, ConversationError> {
        let (session, config) = self.load(session_id).await?;
        let span = info_span!(
            "conversation.execute",
            session_id = %session.session_id,
            config_id = %config.config_id,
            stream = true,
        );

        let mut manager = SessionManager::new(session);
        manager.record_human_turn(user_text);
        if !self.conversations.update(manager.session()).await? {
            return Err(ConversationError::SessionNotFound(session_id.to_string()));
        }

        let conversations = self.conversations.clone();
        let factory = Arc::clone(&self.factory);
        let cache = Arc::clone(&self.cache);

        let events = async_stream::stream! {
            let mut response = String::new();

            match cache.get_or_create(&config, factory.as_ref()).await {
                Ok(engine) => {
                    let mut fragments = engine.invoke_stream(manager.messages().to_vec());
                    while let Some(item) = fragments.next().await {
                        match item {
                            Ok(text) if text.is_empty() => {}
                            Ok(text) => {
                                response.push_str(&text);
                                yield ConversationStreamEvent::Content { text };
                            }
                            Err(e) => {
                                warn!(error = %e, "Agent stream failed, recording apology");
                                let text = if response.is_empty() {
                                    apology_text(&e)
                                } else {
                                    format!("\n\n{}", apology_text(&e))
                                };
                                response.push_str(&text);
                                yield ConversationStreamEvent::Content { text };
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Agent engine unavailable, recording apology");
                    let text = apology_text(&e);
                    response.push_str(&text);
                    yield ConversationStreamEvent::Content { text };
                }
            }

            if response.is_empty() {
                response.push_str(EMPTY_RESPONSE_TEXT);
                yield ConversationStreamEvent::Content {
                    text: EMPTY_RESPONSE_TEXT.to_string(),
                };
            }

            manager.record_assistant_turn(&response);
            let message_count = manager.message_count();
            match conversations.update(manager.session()).await {
                Ok(true) => {
                    yield ConversationStreamEvent::Done { message_count };
                }
                Ok(false) => {
                    let message = format!("session '{}' no longer exists", manager.session().session_id);
                    yield ConversationStreamEvent::Error { message };
                }
                Err(e) => {
                    warn!(error = %e, "Failed to persist streamed turn");
                    yield ConversationStreamEvent::Error { message: e.to_string() };
                }
            }
        };

        Ok(Box::pin(StreamInSpan {
            inner: Box::pin(events),
            span,
        }))
    }

    /// Load an active session and its active configuration.
    async fn load(
        &self,
        session_id: &str,
    ) -> Result<(ConversationSession, AgentConfiguration), ConversationError> {
        let session = self
            .conversations
            .get(session_id)
            .await?
            .filter(|s| s.active)
            .ok_or_else(|| ConversationError::SessionNotFound(session_id.to_string()))?;

        let config = self
            .configurations
            .get(&session.config_id)
            .await?
            .filter(|c| c.active)
            .ok_or_else(|| ConversationError::ConfigurationNotFound(session.config_id.clone()))?;

        Ok((session, config))
    }

    async fn run_turn(
        &self,
        session: ConversationSession,
        config: AgentConfiguration,
        user_text: &str,
    ) -> Result<ExecutionResult, ConversationError> {
        let mut manager = SessionManager::new(session);
        manager.record_human_turn(user_text);
        // Persisted up front so a cancelled or timed-out call keeps the question.
        if !self.conversations.update(manager.session()).await? {
            return Err(ConversationError::SessionNotFound(
                manager.session().session_id.clone(),
            ));
        }

        let response = match self.invoke(&config, &manager).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Agent execution failed, recording apology");
                apology_text(&e)
            }
        };
        manager.record_assistant_turn(&response);

        let session = manager.into_session();
        if !self.conversations.update(&session).await? {
            return Err(ConversationError::SessionNotFound(session.session_id));
        }
        debug!(message_count = session.messages.len(), "Turn persisted");

        Ok(ExecutionResult {
            message_count: session.messages.len(),
            session_id: session.session_id,
            response,
        })
    }

    async fn invoke(
        &self,
        config: &AgentConfiguration,
        manager: &SessionManager,
    ) -> Result<String, EngineError> {
        let engine = self.cache.get_or_create(config, self.factory.as_ref()).await?;
        let result = engine.invoke(manager.messages()).await?;
        Ok(result.final_text())
    }
}

/// Keeps the turn's span entered while the stream is polled.
struct StreamInSpan {
    inner: ConversationStream,
    span: Span,
}

impl Stream for StreamInSpan {
    type Item = ConversationStreamEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let _enter = this.span.enter();
        this.inner.as_mut().poll_next(cx)
    }
}
