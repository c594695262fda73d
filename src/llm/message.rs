//! Conversation message model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A structured tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifier, unique within its assistant message
    pub id: String,

    /// Name of the requested tool
    pub name: String,

    /// Arguments as issued by the model; `query` is the expected key
    pub arguments: BTreeMap<String, String>,
}

impl ToolCall {
    /// Build a call carrying a single `query` argument.
    pub fn with_query(id: impl Into<String>, name: impl Into<String>, query: &str) -> Self {
        let mut arguments = BTreeMap::new();
        arguments.insert("query".to_string(), query.to_string());
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// One entry in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    User {
        content: String,
    },
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    ToolResult {
        tool_call_id: String,
        content: String,
    },
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    /// A final assistant answer with no tool calls.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::ToolResult {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::User { content }
            | Self::Assistant { content, .. }
            | Self::ToolResult { content, .. } => content,
        }
    }

    /// Tool calls carried by this message (empty unless it is an assistant message).
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Self::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConversationError {
    #[error("tool result {0} does not answer a call from the preceding assistant message")]
    OrphanToolResult(String),
}

/// Ordered, append-only message history of one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    messages: Vec<Message>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message.
    ///
    /// A tool result must reference a call issued by the assistant message
    /// that precedes the current run of tool results.
    pub fn push(&mut self, message: Message) -> Result<(), ConversationError> {
        if let Message::ToolResult { tool_call_id, .. } = &message {
            let issuer = self
                .messages
                .iter()
                .rev()
                .find(|m| !matches!(m, Message::ToolResult { .. }));
            let answered = matches!(
                issuer,
                Some(Message::Assistant { tool_calls, .. })
                    if tool_calls.iter().any(|c| &c.id == tool_call_id)
            );
            if !answered {
                return Err(ConversationError::OrphanToolResult(tool_call_id.clone()));
            }
        }
        self.messages.push(message);
        Ok(())
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }
}
