//! SessionStore - per-session conversation history.
//!
//! The planner receives prior turns so follow-ups like "move it to 4pm"
//! resolve against earlier context. History is trimmed to a bounded number
//! of messages on save.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use beckon_core::planner::HistoryItem;
use beckon_core::store::StoreError;

const DEFAULT_MAX_MESSAGES: usize = 50;

/// SessionStore trait - async interface for conversation history.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a session's turns, oldest first; empty for a fresh session.
    async fn load(&self, session_key: &str) -> Result<Vec<HistoryItem>, StoreError>;

    /// Replace a session's turns, trimming to the configured maximum.
    async fn save(&self, session_key: &str, history: Vec<HistoryItem>) -> Result<(), StoreError>;

    /// Delete a session.
    async fn clear(&self, session_key: &str) -> Result<(), StoreError>;
}

/// In-memory implementation for development and testing.
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Vec<HistoryItem>>>,
    max_messages: usize,
}

impl InMemorySessionStore {
    /// Create a store with the default message cap.
    pub fn new() -> Self {
        Self::with_max_messages(DEFAULT_MAX_MESSAGES)
    }

    /// Create a store keeping at most `max_messages` turns per session.
    pub fn with_max_messages(max_messages: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_messages: max_messages.max(1),
        }
    }

    fn trim(&self, mut history: Vec<HistoryItem>) -> Vec<HistoryItem> {
        if history.len() > self.max_messages {
            history.drain(..history.len() - self.max_messages);
        }
        history
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, session_key: &str) -> Result<Vec<HistoryItem>, StoreError> {
        let sessions = self
            .sessions
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(sessions.get(session_key).cloned().unwrap_or_default())
    }

    async fn save(&self, session_key: &str, history: Vec<HistoryItem>) -> Result<(), StoreError> {
        let trimmed = self.trim(history);
        let mut sessions = self
            .sessions
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        sessions.insert(session_key.to_string(), trimmed);
        Ok(())
    }

    async fn clear(&self, session_key: &str) -> Result<(), StoreError> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        sessions.remove(session_key);
        Ok(())
    }
}
