//! OpenTelemetry GenAI Semantic Convention attribute names.
//!
//! Span fields are declared with these dotted names in `tracing::info_span!`
//! and filled in later through `Span::record(CONST, value)`.
//!
//! Span naming convention: `"gen_ai.{operation}"` (e.g., `"gen_ai.chat"`).

// --- Required attributes ---

/// The name of the operation being performed (e.g., "chat", "invoke_agent").
pub const GEN_AI_OPERATION_NAME: &str = "gen_ai.operation.name";

/// The name of the GenAI provider (e.g., "openai").
pub const GEN_AI_PROVIDER_NAME: &str = "gen_ai.provider.name";

// --- Recommended attributes ---

/// The model ID requested (e.g., "gpt-4o").
pub const GEN_AI_REQUEST_MODEL: &str = "gen_ai.request.model";

/// The number of input tokens consumed.
pub const GEN_AI_USAGE_INPUT_TOKENS: &str = "gen_ai.usage.input_tokens";

/// The number of output tokens generated.
pub const GEN_AI_USAGE_OUTPUT_TOKENS: &str = "gen_ai.usage.output_tokens";

/// The unique response ID from the provider.
pub const GEN_AI_RESPONSE_ID: &str = "gen_ai.response.id";

// --- Agent-specific attributes ---

/// The agent configuration id.
pub const GEN_AI_AGENT_ID: &str = "gen_ai.agent.id";

// --- Operation name values ---

/// Standard chat completion operation.
pub const OP_CHAT: &str = "chat";

/// Streaming chat completion operation.
pub const OP_CHAT_STREAM: &str = "chat_stream";

// --- Provider name values ---

/// Any OpenAI-compatible endpoint.
pub const PROVIDER_OPENAI_COMPAT: &str = "openai_compat";
