//! Tool abstraction module
//!
//! This module defines the Tool trait and related types:
//! - Tool: the core trait for invocable capabilities
//! - ToolSpec: catalog entry (target, risk, argument schema)
//! - ToolContext: per-request execution context
//! - ToolRegistry: immutable process-wide catalog

mod context;
mod registry;
mod schema;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use context::ToolContext;
pub use registry::{SkillManifest, ToolRegistry};
pub use schema::validate_args;

use crate::types::{ExecutionTarget, RiskLevel, VerificationOutcome};

/// Tool invocation errors
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("'{0}' is a device-side tool and cannot run on the server")]
    DeviceOnly(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("execution failed: {0}")]
    Execution(String),
}

/// Catalog entry describing an invocable tool.
///
/// Specs are built once at process start and never mutated.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    /// Globally unique, dot-namespaced name, e.g. "google_calendar.create_event"
    pub name: String,
    /// Description for the planner's catalog
    pub description: String,
    pub execution_target: ExecutionTarget,
    pub default_risk: RiskLevel,
    /// Whether the tool's effect cannot be undone (delete, send, purchase).
    /// Medium-risk irreversible tools require confirmation.
    pub irreversible: bool,
    /// Whether a failure of this tool aborts the remaining plan steps.
    pub critical: bool,
    /// JSON schema for the tool's arguments ("properties" + "required")
    pub parameters: Value,
}

impl ToolSpec {
    /// Create a new spec with default (server, low) annotations.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            execution_target: ExecutionTarget::Server,
            default_risk: RiskLevel::Low,
            irreversible: false,
            critical: false,
            parameters: Value::Null,
        }
    }

    /// Set the execution target.
    pub fn with_target(mut self, target: ExecutionTarget) -> Self {
        self.execution_target = target;
        self
    }

    /// Set the default risk level.
    pub fn with_risk(mut self, risk: RiskLevel) -> Self {
        self.default_risk = risk;
        self
    }

    /// Mark the tool's effect as irreversible.
    pub fn irreversible(mut self) -> Self {
        self.irreversible = true;
        self
    }

    /// Mark the tool as critical: its failure aborts the rest of the plan.
    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }

    /// Set the argument schema.
    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }
}

/// Tool trait - the contract every capability must satisfy to plug into the
/// pipeline: a name, an argument schema, and a result-or-error.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the catalog entry for this tool.
    fn spec(&self) -> &ToolSpec;

    /// Get the tool name (must be unique).
    fn name(&self) -> &str {
        &self.spec().name
    }

    /// Invoke the tool server-side.
    ///
    /// Device-side tools must fail here; they only execute on the client.
    async fn invoke(&self, args: &Value, ctx: &ToolContext) -> Result<Value, ToolError>;

    /// Verify the result by reading back. Default: trust the result.
    async fn verify(
        &self,
        _args: &Value,
        _result: &Value,
        _ctx: &ToolContext,
    ) -> VerificationOutcome {
        VerificationOutcome::ok()
    }
}
