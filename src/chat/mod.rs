//! Turn orchestration.
//!
//! A [`ChatService`] takes one [`ChatRequest`], resolves its session, runs
//! the agent over the session's conversation and records the new messages.

mod types;

use std::sync::Arc;

use chrono::Utc;

use crate::agent::Agent;
use crate::error::Result;
use crate::llm::Message;
use crate::session::SessionManager;
use crate::tools::ToolRegistry;

pub use types::{ChatRequest, ChatResponse};

pub struct ChatService {
    agent: Arc<Agent>,
    sessions: Arc<SessionManager>,
}

impl ChatService {
    pub fn new(agent: Arc<Agent>, sessions: Arc<SessionManager>) -> Self {
        Self { agent, sessions }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Answer one user message.
    ///
    /// Turns for the same session run one at a time. Model and tool failures
    /// are folded into the answer; the only error is `NotFound`, when the
    /// session is deleted or expires while the turn is in flight.
    pub async fn handle(&self, request: ChatRequest) -> Result<ChatResponse> {
        let (session_id, turn_lock) = self.sessions.begin_turn(request.session_id.as_deref());
        let _turn = turn_lock.lock().await;

        tracing::info!(session_id = %session_id, "Handling chat turn");

        self.sessions
            .append_turn(&session_id, Message::user(request.message))?;

        let mut conversation = self.sessions.get(&session_id)?;
        let start = conversation.len();
        let run = self.agent.run(&mut conversation).await;

        let new_messages = &conversation.messages()[start..];
        for message in new_messages {
            self.sessions.append_turn(&session_id, message.clone())?;
        }

        tracing::info!(
            session_id = %session_id,
            iterations = run.iterations,
            outcome = ?run.outcome,
            "Turn complete"
        );

        Ok(ChatResponse {
            response: run.answer,
            sources_used: sources_used(self.agent.tools(), new_messages),
            session_id,
            timestamp: Utc::now(),
        })
    }
}

/// Labels of the tools requested in `messages`, deduplicated in first-use order.
fn sources_used(tools: &ToolRegistry, messages: &[Message]) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for call in messages.iter().flat_map(|m| m.tool_calls()) {
        if let Some(label) = tools.source_label(&call.name) {
            if !sources.iter().any(|s| s == label) {
                sources.push(label.to_string());
            }
        }
    }
    sources
}
