//! Device delegation types
//!
//! A DeviceAction is a step the server cannot perform itself; the client
//! executes it locally and reports a DeviceActionResult carrying the same
//! action_id/idempotency_key pair it was given. That echo is load-bearing
//! for reconciliation correctness.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A step delegated to the client device for local execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceAction {
    /// Unique per dispatch, used for matching the reported result
    pub action_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub args: Value,
    pub idempotency_key: String,
}

impl DeviceAction {
    /// Mint a new device action with a fresh action ID.
    pub fn new(tool_name: impl Into<String>, args: Value, idempotency_key: impl Into<String>) -> Self {
        Self {
            action_id: uuid::Uuid::new_v4().simple().to_string(),
            tool_name: tool_name.into(),
            args,
            idempotency_key: idempotency_key.into(),
        }
    }
}

/// The device's report of a DeviceAction outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceActionResult {
    pub action_id: String,
    pub idempotency_key: String,
    pub success: bool,
    #[serde(default)]
    pub result: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeviceActionResult {
    /// Report success for a dispatched action.
    pub fn ok(action: &DeviceAction, result: Value) -> Self {
        Self {
            action_id: action.action_id.clone(),
            idempotency_key: action.idempotency_key.clone(),
            success: true,
            result,
            error: None,
        }
    }

    /// Report failure for a dispatched action.
    pub fn failed(action: &DeviceAction, error: impl Into<String>) -> Self {
        Self {
            action_id: action.action_id.clone(),
            idempotency_key: action.idempotency_key.clone(),
            success: false,
            result: Value::Null,
            error: Some(error.into()),
        }
    }
}

/// Outcome of a read-back verification after a write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub matched: bool,
    #[serde(default)]
    pub discrepancies: Vec<String>,
}

impl VerificationOutcome {
    /// The result matched what was requested (or was not checked).
    pub fn ok() -> Self {
        Self {
            matched: true,
            discrepancies: Vec::new(),
        }
    }

    /// The result did not match; list what differed.
    pub fn mismatch(discrepancies: Vec<String>) -> Self {
        Self {
            matched: false,
            discrepancies,
        }
    }
}
