//! In-memory session manager.
//!
//! Maps an opaque session id to its conversation and activity timestamps.
//! Sessions are bounded in number (least recently active is evicted first)
//! and expire after a period of inactivity. Each session carries an async
//! turn lock so that concurrent requests for the same id run one at a time.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::llm::{ConversationError, ConversationState, Message};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    InvalidMessage(#[from] ConversationError),
}

/// Public view of a session's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    /// Number of user turns
    pub message_count: usize,
}

/// A user question or final assistant answer, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptEntry {
    pub role: &'static str,
    pub content: String,
}

struct Session {
    conversation: ConversationState,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    message_count: usize,
    turn_lock: Arc<tokio::sync::Mutex<()>>,
}

impl Session {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            conversation: ConversationState::new(),
            created_at: now,
            last_activity: now,
            message_count: 0,
            turn_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    fn summary(&self, id: &str) -> SessionSummary {
        SessionSummary {
            session_id: id.to_string(),
            created_at: self.created_at,
            last_activity: self.last_activity,
            message_count: self.message_count,
        }
    }
}

pub struct SessionManager {
    sessions: Mutex<HashMap<String, Session>>,
    max_sessions: usize,
}

impl SessionManager {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            max_sessions: max_sessions.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return `id` if it names a live session (refreshing its activity),
    /// otherwise create a session under a fresh id.
    pub fn resolve_or_create(&self, id: Option<&str>) -> String {
        self.begin_turn(id).0
    }

    /// [`SessionManager::resolve_or_create`] plus the session's turn lock,
    /// taken under one map lock so the pair always refers to the same session.
    pub fn begin_turn(&self, id: Option<&str>) -> (String, Arc<tokio::sync::Mutex<()>>) {
        let now = Utc::now();
        let mut sessions = self.lock();

        if let Some((id, session)) =
            id.and_then(|id| sessions.get_mut(id).map(|session| (id, session)))
        {
            session.last_activity = now;
            return (id.to_string(), Arc::clone(&session.turn_lock));
        }

        if sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, s)| s.last_activity)
                .map(|(id, _)| id.clone());
            if let Some(oldest) = oldest {
                sessions.remove(&oldest);
                tracing::info!(session_id = %oldest, "Evicted least recently active session");
            }
        }

        let new_id = Uuid::new_v4().to_string();
        let session = Session::new(now);
        let turn_lock = Arc::clone(&session.turn_lock);
        sessions.insert(new_id.clone(), session);
        tracing::info!(session_id = %new_id, "Created session");
        (new_id, turn_lock)
    }

    /// Append a message to a session's conversation and refresh its activity.
    pub fn append_turn(&self, id: &str, message: Message) -> Result<(), SessionError> {
        let mut sessions = self.lock();
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;

        let is_user_turn = matches!(message, Message::User { .. });
        session.conversation.push(message)?;
        if is_user_turn {
            session.message_count += 1;
        }
        session.last_activity = Utc::now();
        Ok(())
    }

    /// Snapshot of a session's conversation.
    pub fn get(&self, id: &str) -> Result<ConversationState, SessionError> {
        self.lock()
            .get(id)
            .map(|s| s.conversation.clone())
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    pub fn info(&self, id: &str) -> Result<SessionSummary, SessionError> {
        self.lock()
            .get(id)
            .map(|s| s.summary(id))
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    /// User questions and final assistant answers, in order.
    pub fn transcript(&self, id: &str) -> Result<Vec<TranscriptEntry>, SessionError> {
        let conversation = self.get(id)?;
        Ok(conversation
            .messages()
            .iter()
            .filter_map(|m| match m {
                Message::User { content } => Some(TranscriptEntry {
                    role: "user",
                    content: content.clone(),
                }),
                Message::Assistant {
                    content,
                    tool_calls,
                } if tool_calls.is_empty() => Some(TranscriptEntry {
                    role: "assistant",
                    content: content.clone(),
                }),
                _ => None,
            })
            .collect())
    }

    pub fn delete(&self, id: &str) -> Result<(), SessionError> {
        self.lock()
            .remove(id)
            .map(|_| tracing::info!(session_id = %id, "Deleted session"))
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    /// Drop a session's history but keep the session itself.
    pub fn clear(&self, id: &str) -> Result<(), SessionError> {
        let mut sessions = self.lock();
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        session.conversation = ConversationState::new();
        session.message_count = 0;
        session.last_activity = Utc::now();
        Ok(())
    }

    /// Summaries of all live sessions, oldest first.
    pub fn list(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<SessionSummary> = self
            .lock()
            .iter()
            .map(|(id, s)| s.summary(id))
            .collect();
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        summaries
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Lock serializing turns within one session.
    pub fn turn_lock(&self, id: &str) -> Result<Arc<tokio::sync::Mutex<()>>, SessionError> {
        self.lock()
            .get(id)
            .map(|s| Arc::clone(&s.turn_lock))
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    /// Remove sessions idle for longer than `ttl`; returns how many were removed.
    pub fn sweep_expired(&self, ttl: Duration) -> usize {
        self.sweep_expired_at(Utc::now(), ttl)
    }

    /// Sweep as of `now`. A session idle for exactly `ttl` is kept.
    pub fn sweep_expired_at(&self, now: DateTime<Utc>, ttl: Duration) -> usize {
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, s| {
            let expired = now
                .signed_duration_since(s.last_activity)
                .to_std()
                .map(|age| age > ttl)
                .unwrap_or(false);
            !expired
        });
        let removed = before - sessions.len();
        tracing::info!("Cleaned up {} expired sessions", removed);
        removed
    }
}
