//! Language-model abstraction.
//!
//! The agent talks to the model through [`LlmClient`]; the production
//! implementation is [`OpenAiClient`], which speaks the OpenAI-compatible
//! chat completions protocol with function tools.

mod message;
mod openai;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ProviderError;

pub use message::{ConversationError, ConversationState, Message, ToolCall};
pub use openai::OpenAiClient;
pub(crate) use openai::POSITIONAL_ARG_KEY;

/// Tool definition advertised to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// What the model decided for one step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    /// Text content, if any
    pub content: Option<String>,

    /// Tool invocations requested, in issue order
    pub tool_calls: Vec<ToolCall>,
}

impl ModelResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: None,
            tool_calls,
        }
    }
}

/// A chat model able to answer or request tools.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Run one completion over the conversation.
    async fn complete(
        &self,
        system_prompt: &str,
        messages: &[Message],
        tools: &[ToolSchema],
    ) -> Result<ModelResponse, ProviderError>;
}
