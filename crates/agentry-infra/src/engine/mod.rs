//! OpenAI-compatible engine adapter.
//!
//! [`ChatCompletionEngineFactory`] turns an agent configuration into a
//! [`ChatCompletionEngine`]: it launches the configuration's tool servers and
//! binds a chat-completion client with the resolved model settings.

pub mod factory;
pub mod openai;
pub mod tool_servers;

pub use factory::ChatCompletionEngineFactory;
pub use openai::{ChatCompletionEngine, RequestSettings};
