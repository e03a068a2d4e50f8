//! ActionPlan and ActionStep type definitions
//!
//! An ActionPlan is the product of one planning pass over a user transcript.
//! Step order is execution order and must be preserved.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Strongly-typed Plan ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct PlanId(pub String);

impl PlanId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generate a fresh random plan ID.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for PlanId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for PlanId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<PlanId> for String {
    fn from(value: PlanId) -> Self {
        value.0
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl AsRef<str> for PlanId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl PartialEq<&str> for PlanId {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

/// Risk classification for a planned step.
///
/// Ordered: `Low < Medium < High`. The policy gate only ever upgrades risk.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

/// Where a tool runs: on this server, or delegated to the client device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionTarget {
    #[default]
    Server,
    Device,
}

/// A single planned tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionStep {
    /// Qualified tool name, e.g. "google_calendar.create_event"
    pub tool_name: String,
    /// Tool arguments as a JSON object
    #[serde(default)]
    pub args: Value,
    #[serde(default)]
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub requires_confirmation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_phrase: Option<String>,
    /// Stable token so a retried device-side execution cannot double-apply.
    /// Derived from plan ID + step index + tool name when the step is added
    /// to a plan.
    #[serde(default)]
    pub idempotency_key: String,
    #[serde(default)]
    pub execution_target: ExecutionTarget,
}

impl ActionStep {
    /// Create a new step with default (low, server) annotations.
    pub fn new(tool_name: impl Into<String>, args: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            args,
            risk_level: RiskLevel::Low,
            requires_confirmation: false,
            confirmation_phrase: None,
            idempotency_key: String::new(),
            execution_target: ExecutionTarget::Server,
        }
    }

    /// Set the risk level.
    pub fn with_risk(mut self, risk: RiskLevel) -> Self {
        self.risk_level = risk;
        self
    }

    /// Set the execution target.
    pub fn with_target(mut self, target: ExecutionTarget) -> Self {
        self.execution_target = target;
        self
    }

    /// Set the confirmation phrase.
    pub fn with_confirmation_phrase(mut self, phrase: impl Into<String>) -> Self {
        self.confirmation_phrase = Some(phrase.into());
        self
    }
}

/// Derive the stable idempotency key for a step.
///
/// Deterministic in (plan, position, tool) so the same step never mints two
/// different keys across retried requests.
pub fn derive_idempotency_key(plan_id: &PlanId, index: usize, tool_name: &str) -> String {
    format!("{}:{}:{}", plan_id, index, tool_name)
}

/// An ordered list of tool invocations produced from one user transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionPlan {
    pub plan_id: PlanId,
    /// Free-text summary of what the user asked for
    pub user_intent: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_locale")]
    pub locale: String,
    #[serde(default)]
    pub steps: Vec<ActionStep>,
    pub created_at: DateTime<Utc>,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_locale() -> String {
    "en-US".to_string()
}

impl ActionPlan {
    /// Create an empty plan with a fresh ID.
    pub fn new(user_intent: impl Into<String>) -> Self {
        Self {
            plan_id: PlanId::generate(),
            user_intent: user_intent.into(),
            timezone: default_timezone(),
            locale: default_locale(),
            steps: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Set timezone and locale.
    pub fn with_context(mut self, timezone: impl Into<String>, locale: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self.locale = locale.into();
        self
    }

    /// Append a step, deriving its idempotency key from this plan's ID and
    /// the step's position.
    pub fn push_step(&mut self, mut step: ActionStep) {
        step.idempotency_key =
            derive_idempotency_key(&self.plan_id, self.steps.len(), &step.tool_name);
        self.steps.push(step);
    }

    /// Append several steps in order.
    pub fn with_steps(mut self, steps: Vec<ActionStep>) -> Self {
        for step in steps {
            self.push_step(step);
        }
        self
    }

    /// Whether any step requires explicit user confirmation.
    pub fn needs_confirmation(&self) -> bool {
        self.steps.iter().any(|s| s.requires_confirmation)
    }

    /// Highest risk level across all steps (Low for an empty plan).
    pub fn max_risk(&self) -> RiskLevel {
        self.steps
            .iter()
            .map(|s| s.risk_level)
            .max()
            .unwrap_or(RiskLevel::Low)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plan_defaults() {
        let plan = ActionPlan::new("test");
        assert!(!plan.plan_id.as_str().is_empty());
        assert_eq!(plan.timezone, "UTC");
        assert_eq!(plan.locale, "en-US");
        assert!(plan.steps.is_empty());
        assert!(!plan.needs_confirmation());
        assert_eq!(plan.max_risk(), RiskLevel::Low);
    }

    #[test]
    fn test_push_step_derives_stable_idempotency_key() {
        let mut plan = ActionPlan::new("schedule");
        plan.push_step(ActionStep::new(
            "google_calendar.create_event",
            json!({"title": "standup"}),
        ));
        plan.push_step(ActionStep::new("ios_reminders.create_reminder", json!({})));

        let expected = format!("{}:0:google_calendar.create_event", plan.plan_id);
        assert_eq!(plan.steps[0].idempotency_key, expected);
        assert_ne!(plan.steps[0].idempotency_key, plan.steps[1].idempotency_key);
        assert_eq!(
            plan.steps[1].idempotency_key,
            derive_idempotency_key(&plan.plan_id, 1, "ios_reminders.create_reminder"),
        );
    }

    #[test]
    fn test_needs_confirmation_tracks_any_flagged_step() {
        let plan = ActionPlan::new("delete event").with_steps(vec![
            ActionStep::new("google_calendar.list_events", json!({})),
            ActionStep::new("google_calendar.delete_event", json!({"event_id": "x"}))
                .with_risk(RiskLevel::High),
        ]);
        assert!(!plan.needs_confirmation());

        let mut flagged = plan.clone();
        flagged.steps[1].requires_confirmation = true;
        assert!(flagged.needs_confirmation());
    }

    #[test]
    fn test_max_risk_picks_highest() {
        let plan = ActionPlan::new("mixed").with_steps(vec![
            ActionStep::new("google_calendar.list_events", json!({})),
            ActionStep::new("google_calendar.delete_event", json!({"event_id": "x"}))
                .with_risk(RiskLevel::High),
            ActionStep::new("google_calendar.create_event", json!({}))
                .with_risk(RiskLevel::Medium),
        ]);
        assert_eq!(plan.max_risk(), RiskLevel::High);
    }

    #[test]
    fn test_risk_level_ordering() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
    }
}
