//! Chat-completion engine over any OpenAI-compatible API.
//!
//! Uses [`async_openai`] for request/response types and its built-in SSE
//! streaming. Each engine owns the tool servers launched for its
//! configuration and stops them on shutdown.

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
};
use futures_util::StreamExt;
use tracing::Instrument;
use tracing::field::Empty;

use agentry_core::engine::{AgentEngine, FragmentStream};
use agentry_observe::genai_attrs::{
    GEN_AI_RESPONSE_ID, GEN_AI_USAGE_INPUT_TOKENS, GEN_AI_USAGE_OUTPUT_TOKENS, OP_CHAT,
    OP_CHAT_STREAM, PROVIDER_OPENAI_COMPAT,
};
use agentry_types::conversation::{ConversationMessage, MessageRole};
use agentry_types::engine::InvocationResult;
use agentry_types::error::EngineError;

use super::tool_servers::ToolServerSet;

/// Per-engine request parameters, resolved from the configuration's model
/// settings with the global `[engine]` section as fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSettings {
    pub model: String,
    pub system_prompt: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

/// Engine bound to one agent configuration.
///
/// Does NOT derive Debug: the `async_openai::Client` holds the API key.
pub struct ChatCompletionEngine {
    client: Client<OpenAIConfig>,
    settings: RequestSettings,
    tool_servers: ToolServerSet,
}

impl ChatCompletionEngine {
    pub fn new(
        client: Client<OpenAIConfig>,
        settings: RequestSettings,
        tool_servers: ToolServerSet,
    ) -> Self {
        Self {
            client,
            settings,
            tool_servers,
        }
    }

    /// Build a [`CreateChatCompletionRequest`]: system prompt first, then the
    /// full conversation in order.
    fn build_request(
        &self,
        messages: &[ConversationMessage],
        stream: bool,
    ) -> CreateChatCompletionRequest {
        let mut oai_messages = Vec::with_capacity(messages.len() + 1);
        oai_messages.push(system_message(&self.settings.system_prompt));
        oai_messages.extend(messages.iter().map(to_openai_message));

        let mut req = CreateChatCompletionRequest {
            model: self.settings.model.clone(),
            messages: oai_messages,
            max_completion_tokens: self.settings.max_tokens,
            temperature: Some(self.settings.temperature),
            ..Default::default()
        };
        if stream {
            req.stream = Some(true);
        }
        req
    }

    fn span(&self, operation: &'static str) -> tracing::Span {
        tracing::info_span!(
            "gen_ai.chat",
            gen_ai.operation.name = operation,
            gen_ai.provider.name = PROVIDER_OPENAI_COMPAT,
            gen_ai.request.model = %self.settings.model,
            gen_ai.request.temperature = self.settings.temperature,
            gen_ai.request.max_tokens = ?self.settings.max_tokens,
            gen_ai.response.id = Empty,
            gen_ai.usage.input_tokens = Empty,
            gen_ai.usage.output_tokens = Empty,
        )
    }
}

fn system_message(text: &str) -> ChatCompletionRequestMessage {
    ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
        content: ChatCompletionRequestSystemMessageContent::Text(text.to_string()),
        name: None,
    })
}

fn to_openai_message(msg: &ConversationMessage) -> ChatCompletionRequestMessage {
    match msg.role {
        MessageRole::System => system_message(&msg.content),
        MessageRole::Human => {
            ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(msg.content.clone()),
                name: None,
            })
        }
        MessageRole::Assistant => {
            #[allow(deprecated)]
            ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                content: Some(ChatCompletionRequestAssistantMessageContent::Text(
                    msg.content.clone(),
                )),
                refusal: None,
                name: None,
                audio: None,
                tool_calls: None,
                function_call: None,
            })
        }
    }
}

impl AgentEngine for ChatCompletionEngine {
    async fn invoke(
        &self,
        messages: &[ConversationMessage],
    ) -> Result<InvocationResult, EngineError> {
        let request = self.build_request(messages, false);
        let span = self.span(OP_CHAT);

        let response = self
            .client
            .chat()
            .create(request)
            .instrument(span.clone())
            .await
            .map_err(map_openai_error)?;

        span.record(GEN_AI_RESPONSE_ID, response.id.as_str());
        if let Some(usage) = &response.usage {
            span.record(GEN_AI_USAGE_INPUT_TOKENS, usage.prompt_tokens);
            span.record(GEN_AI_USAGE_OUTPUT_TOKENS, usage.completion_tokens);
        }

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        // No text means no answer; the caller substitutes the fixed empty reply.
        if content.is_empty() {
            return Ok(InvocationResult::default());
        }
        Ok(InvocationResult::from_text(content))
    }

    fn invoke_stream<'a>(&'a self, messages: Vec<ConversationMessage>) -> FragmentStream<'a> {
        let request = self.build_request(&messages, true);
        let span = self.span(OP_CHAT_STREAM);

        Box::pin(async_stream::try_stream! {
            let mut chunks = self
                .client
                .chat()
                .create_stream(request)
                .instrument(span.clone())
                .await
                .map_err(map_openai_error)?;

            let mut fragments = 0usize;
            while let Some(chunk) = chunks.next().await {
                let chunk = chunk.map_err(map_openai_error)?;
                if fragments == 0 {
                    span.record(GEN_AI_RESPONSE_ID, chunk.id.as_str());
                }
                for choice in chunk.choices {
                    if let Some(text) = choice.delta.content {
                        if !text.is_empty() {
                            fragments += 1;
                            yield text;
                        }
                    }
                }
            }
            tracing::debug!(parent: &span, fragments, "stream finished");
        })
    }

    async fn shutdown(&self) -> Result<(), EngineError> {
        self.tool_servers.shutdown().await
    }
}

/// Map an `async_openai::error::OpenAIError` to [`EngineError::Invocation`].
fn map_openai_error(err: async_openai::error::OpenAIError) -> EngineError {
    use async_openai::error::OpenAIError;

    match &err {
        OpenAIError::ApiError(api_err) => {
            let code = api_err.code.as_deref().unwrap_or("unknown");
            EngineError::Invocation(format!("api error ({code}): {}", api_err.message))
        }
        OpenAIError::JSONDeserialize(_, content) => {
            EngineError::Invocation(format!("failed to parse response: {content}"))
        }
        OpenAIError::StreamError(stream_err) => {
            EngineError::Invocation(format!("stream error: {stream_err}"))
        }
        _ => EngineError::Invocation(err.to_string()),
    }
}
