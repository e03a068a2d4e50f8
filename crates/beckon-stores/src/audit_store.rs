//! AuditStore - append-only journal of executed steps and device results.

use std::collections::VecDeque;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use beckon_core::store::StoreError;

const DEFAULT_IN_MEMORY_AUDIT_LIMIT: usize = 10_000;

/// Outcome label for an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStatus {
    Ok,
    Error,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
        }
    }
}

/// One audited event: a server step execution, a device dispatch, or a
/// device-reported result.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub plan_id: String,
    pub tool_name: String,
    pub args: Value,
    pub result: Option<Value>,
    pub status: AuditStatus,
    pub error: Option<String>,
}

impl AuditEntry {
    pub fn new(
        user_id: impl Into<String>,
        plan_id: impl Into<String>,
        tool_name: impl Into<String>,
        status: AuditStatus,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            user_id: user_id.into(),
            plan_id: plan_id.into(),
            tool_name: tool_name.into(),
            args: Value::Null,
            result: None,
            status,
            error: None,
        }
    }

    /// Attach the invocation arguments.
    pub fn with_args(mut self, args: Value) -> Self {
        self.args = args;
        self
    }

    /// Attach the result payload.
    pub fn with_result(mut self, result: Value) -> Self {
        self.result = Some(result);
        self
    }

    /// Attach an error message.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// AuditStore trait - async interface for the execution journal.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Append an entry.
    async fn record(&self, entry: AuditEntry) -> Result<(), StoreError>;

    /// Entries for one plan, oldest first.
    async fn query_by_plan(&self, plan_id: &str) -> Result<Vec<AuditEntry>, StoreError>;

    /// Most recent entries across all plans.
    async fn query_recent(&self, limit: usize) -> Result<Vec<AuditEntry>, StoreError>;
}

/// In-memory implementation with a hard capacity limit.
pub struct InMemoryAuditStore {
    entries: RwLock<VecDeque<AuditEntry>>,
    max_entries: usize,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::with_max_entries(DEFAULT_IN_MEMORY_AUDIT_LIMIT)
    }

    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::new()),
            max_entries: max_entries.max(1),
        }
    }
}

impl Default for InMemoryAuditStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn record(&self, entry: AuditEntry) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        if entries.len() >= self.max_entries {
            entries.pop_front();
        }
        entries.push_back(entry);
        Ok(())
    }

    async fn query_by_plan(&self, plan_id: &str) -> Result<Vec<AuditEntry>, StoreError> {
        let entries = self
            .entries
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(entries
            .iter()
            .filter(|e| e.plan_id == plan_id)
            .cloned()
            .collect())
    }

    async fn query_recent(&self, limit: usize) -> Result<Vec<AuditEntry>, StoreError> {
        let entries = self
            .entries
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(entries.iter().rev().take(limit).cloned().collect())
    }
}
