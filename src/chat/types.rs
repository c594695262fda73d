//! Chat request and response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One inbound user turn.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    /// The user's message
    pub message: String,

    /// Session to continue; a new session is created when absent or unknown
    #[serde(default)]
    pub session_id: Option<String>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>, session_id: Option<String>) -> Self {
        Self {
            message: message.into(),
            session_id,
        }
    }
}

/// The assistant's answer to one turn.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    /// Final assistant text
    pub response: String,

    /// Session the turn was recorded in
    pub session_id: String,

    pub timestamp: DateTime<Utc>,

    /// Tool categories consulted during this turn, in first-use order
    pub sources_used: Vec<String>,
}
