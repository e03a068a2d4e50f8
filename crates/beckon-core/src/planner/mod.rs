//! Planner module
//!
//! The Planner is responsible for:
//! - Converting a transcript plus conversation context into an ActionPlan
//! - Emitting only tool names present in the registry, with arguments that
//!   satisfy each tool's schema
//! - Asking a follow-up question when the request is missing information
//!
//! The Planner does NOT handle:
//! - Confirmation gating (policy module)
//! - Execution or plan storage

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::ActionPlan;

/// Why planning failed. Any failure rejects the whole plan; nothing from a
/// failed plan is ever executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanErrorKind {
    UnknownTool,
    SchemaMismatch,
    LlmUnavailable,
    AmbiguousIntent,
}

impl PlanErrorKind {
    /// Stable snake_case label for logs and audit records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownTool => "unknown_tool",
            Self::SchemaMismatch => "schema_mismatch",
            Self::LlmUnavailable => "llm_unavailable",
            Self::AmbiguousIntent => "ambiguous_intent",
        }
    }
}

/// Planner errors
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("plan references unknown tool '{0}'")]
    UnknownTool(String),

    #[error("arguments for '{tool}' do not match its schema: {reason}")]
    SchemaMismatch { tool: String, reason: String },

    #[error("language model unavailable: {0}")]
    LlmUnavailable(String),

    #[error("could not determine intent: {0}")]
    AmbiguousIntent(String),
}

impl PlanError {
    pub fn kind(&self) -> PlanErrorKind {
        match self {
            Self::UnknownTool(_) => PlanErrorKind::UnknownTool,
            Self::SchemaMismatch { .. } => PlanErrorKind::SchemaMismatch,
            Self::LlmUnavailable(_) => PlanErrorKind::LlmUnavailable,
            Self::AmbiguousIntent(_) => PlanErrorKind::AmbiguousIntent,
        }
    }
}

/// What a planning pass produced.
#[derive(Debug, Clone)]
pub enum PlanOutcome {
    /// A validated plan ready for gating and execution
    Plan(ActionPlan),
    /// The planner needs more information before it can plan
    Clarification { question: String },
    /// A pure conversational turn with no actions
    Reply { text: String },
}

/// Planner trait - produces plans from transcripts
///
/// Implementations can use different LLM backends or planning strategies.
#[async_trait]
pub trait Planner: Send + Sync {
    /// Plan the given transcript. The transcript is non-empty after trimming;
    /// the caller enforces that.
    async fn plan(
        &self,
        transcript: &str,
        context: &ConversationContext,
    ) -> Result<PlanOutcome, PlanError>;
}

/// Conversation context provided to the planner.
#[derive(Debug, Clone)]
pub struct ConversationContext {
    /// Prior turns, oldest first (may be empty for a fresh session)
    pub history: Vec<HistoryItem>,
    /// IANA timezone for relative-date resolution ("tomorrow at 2pm")
    pub timezone: String,
    /// BCP-47 locale
    pub locale: String,
    /// Providers the user has linked, e.g. "google_calendar"
    pub linked_providers: Vec<String>,
}

impl ConversationContext {
    /// Create a fresh context with default timezone and locale.
    pub fn new() -> Self {
        Self {
            history: Vec::new(),
            timezone: "UTC".to_string(),
            locale: "en-US".to_string(),
            linked_providers: Vec::new(),
        }
    }

    /// Set timezone and locale.
    pub fn with_context(mut self, timezone: impl Into<String>, locale: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self.locale = locale.into();
        self
    }

    /// Set linked providers.
    pub fn with_providers(mut self, providers: Vec<String>) -> Self {
        self.linked_providers = providers;
        self
    }

    /// Set prior turns.
    pub fn with_history(mut self, history: Vec<HistoryItem>) -> Self {
        self.history = history;
        self
    }

    /// Append a turn.
    pub fn add_history(&mut self, item: HistoryItem) {
        self.history.push(item);
    }
}

impl Default for ConversationContext {
    fn default() -> Self {
        Self::new()
    }
}

/// A single item in the conversation history
#[derive(Debug, Clone)]
pub struct HistoryItem {
    /// Role (e.g., "user", "assistant")
    pub role: String,
    /// Content of the message
    pub content: String,
    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl HistoryItem {
    /// Create a new history item
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}
