//! Error taxonomy shared across the assistant.
//!
//! Provider and tool failures are recovered locally (see `agent` and `tools`);
//! only session lookups and startup configuration surface to callers.

use thiserror::Error;

use crate::config::ConfigError;
use crate::session::SessionError;

/// A call to an external provider (model, embedding, web search) failed.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} request failed: {message}")]
    Network {
        provider: &'static str,
        message: String,
    },

    #[error("{provider} returned HTTP {status}: {body}")]
    Http {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("{provider} returned a malformed response: {message}")]
    Malformed {
        provider: &'static str,
        message: String,
    },
}

impl ProviderError {
    /// Map a reqwest failure onto the network variant.
    pub fn network(provider: &'static str, err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("timed out: {}", err)
        } else {
            err.to_string()
        };
        Self::Network { provider, message }
    }

    pub fn malformed(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Malformed {
            provider,
            message: message.into(),
        }
    }
}

/// A tool could not produce a result for a call.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool {0} failed: unknown tool")]
    UnknownTool(String),

    #[error("Tool {tool} failed: {reason}")]
    Execution { tool: String, reason: String },
}

/// Top-level error for callers of the assistant.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    NotFound(#[from] SessionError),

    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error(transparent)]
    ToolExecution(#[from] ToolError),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_errors_name_the_tool() {
        let err = ToolError::Execution {
            tool: "web_search".to_string(),
            reason: "connection reset".to_string(),
        };
        assert_eq!(err.to_string(), "Tool web_search failed: connection reset");
        assert_eq!(
            ToolError::UnknownTool("flight_search".to_string()).to_string(),
            "Tool flight_search failed: unknown tool"
        );
    }

    #[test]
    fn session_errors_convert_to_not_found() {
        let err: Error = SessionError::NotFound("abc".to_string()).into();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(err.to_string(), "Session not found: abc");
    }
}
