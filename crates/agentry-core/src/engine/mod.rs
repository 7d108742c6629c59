//! Agent engine ports and the shared agent-instance cache.
//!
//! `AgentEngine` is the narrow capability interface the orchestrator needs
//! from a tool-equipped execution engine. It uses RPITIT, so the
//! object-safe `AgentEngineDyn` + `BoxAgentEngine` pair provides dynamic
//! dispatch:
//! 1. `AgentEngineDyn` mirrors the trait with boxed futures and streams
//! 2. A blanket impl covers every `T: AgentEngine`
//! 3. `BoxAgentEngine` wraps `Box<dyn AgentEngineDyn>` and delegates

pub mod cache;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::Stream;

use agentry_types::agent::AgentConfiguration;
use agentry_types::conversation::ConversationMessage;
use agentry_types::engine::InvocationResult;
use agentry_types::error::EngineError;

/// Ordered stream of response text fragments.
pub type FragmentStream<'a> = Pin<Box<dyn Stream<Item = Result<String, EngineError>> + Send + 'a>>;

/// Engine handle shared between the cache and every in-flight conversation.
pub type SharedEngine = Arc<BoxAgentEngine>;

/// A tool-equipped execution engine bound to one configuration.
///
/// Implementations live in agentry-infra (e.g. `ChatCompletionEngine`).
/// The engine is stateless across calls: the full message history is
/// passed on every invocation.
pub trait AgentEngine: Send + Sync {
    /// Produce the engine's messages for the given history.
    fn invoke(
        &self,
        messages: &[ConversationMessage],
    ) -> impl Future<Output = Result<InvocationResult, EngineError>> + Send;

    /// Stream the response as text fragments.
    ///
    /// The default yields the final text of [`invoke`](Self::invoke) as a
    /// single fragment.
    fn invoke_stream<'a>(&'a self, messages: Vec<ConversationMessage>) -> FragmentStream<'a> {
        Box::pin(async_stream::try_stream! {
            let result = self.invoke(&messages).await?;
            yield result.final_text();
        })
    }

    /// Release external resources (tool-server processes, connections).
    ///
    /// The cache skips this for an evicted engine that is still in use, so
    /// implementations must also release their resources on drop.
    fn shutdown(&self) -> impl Future<Output = Result<(), EngineError>> + Send {
        async { Ok(()) }
    }
}

/// Builds engines from configurations. Creation is expensive (tool-server
/// startup), which is why results are cached.
pub trait AgentEngineFactory: Send + Sync {
    fn create_from_config(
        &self,
        config: &AgentConfiguration,
    ) -> impl Future<Output = Result<BoxAgentEngine, EngineError>> + Send;
}

/// Object-safe version of [`AgentEngine`] with boxed futures.
pub trait AgentEngineDyn: Send + Sync {
    fn invoke_boxed<'a>(
        &'a self,
        messages: &'a [ConversationMessage],
    ) -> Pin<Box<dyn Future<Output = Result<InvocationResult, EngineError>> + Send + 'a>>;

    fn invoke_stream_boxed<'a>(&'a self, messages: Vec<ConversationMessage>) -> FragmentStream<'a>;

    fn shutdown_boxed<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<(), EngineError>> + Send + 'a>>;
}

impl<T: AgentEngine> AgentEngineDyn for T {
    fn invoke_boxed<'a>(
        &'a self,
        messages: &'a [ConversationMessage],
    ) -> Pin<Box<dyn Future<Output = Result<InvocationResult, EngineError>> + Send + 'a>> {
        Box::pin(self.invoke(messages))
    }

    fn invoke_stream_boxed<'a>(&'a self, messages: Vec<ConversationMessage>) -> FragmentStream<'a> {
        self.invoke_stream(messages)
    }

    fn shutdown_boxed<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<(), EngineError>> + Send + 'a>> {
        Box::pin(self.shutdown())
    }
}

/// Type-erased agent engine.
///
/// Factories return this so the cache can hold engines of any concrete type.
pub struct BoxAgentEngine {
    inner: Box<dyn AgentEngineDyn + Send + Sync>,
}

impl BoxAgentEngine {
    pub fn new<T: AgentEngine + 'static>(engine: T) -> Self {
        Self {
            inner: Box::new(engine),
        }
    }

    pub async fn invoke(
        &self,
        messages: &[ConversationMessage],
    ) -> Result<InvocationResult, EngineError> {
        self.inner.invoke_boxed(messages).await
    }

    pub fn invoke_stream<'a>(&'a self, messages: Vec<ConversationMessage>) -> FragmentStream<'a> {
        self.inner.invoke_stream_boxed(messages)
    }

    pub async fn shutdown(&self) -> Result<(), EngineError> {
        self.inner.shutdown_boxed().await
    }
}

impl std::fmt::Debug for BoxAgentEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxAgentEngine").finish_non_exhaustive()
    }
}
