//! Policy gate
//!
//! Decides whether a plan needs explicit user confirmation before running.
//! This is a pure function: no I/O, no store access; the only mutation is
//! the confirmation annotations on the plan's steps.
//!
//! Rules:
//! - risk is upgrade-only: a step's risk is raised to the tool's default
//!   risk if higher, never lowered
//! - a step requires confirmation iff its risk is high, or it is medium and
//!   the registry marks the tool irreversible; low never confirms
//! - calendar writes that invite attendees or send notifications are
//!   upgraded to medium with a synthesized confirmation phrase

use tracing::{debug, warn};

use crate::tool::ToolRegistry;
use crate::types::{ActionPlan, ActionStep, RiskLevel};

const DESTRUCTIVE_PHRASE: &str = "This will permanently delete an event. Are you sure?";

const ATTENDEE_TOOLS: &[&str] = &[
    "google_calendar.create_event",
    "google_calendar.update_event",
];

const NOTIFICATION_SEND_VALUES: &[&str] = &["all", "externalOnly"];

/// A plan with its confirmation requirement resolved.
#[derive(Debug, Clone)]
pub struct GatedPlan {
    pub plan: ActionPlan,
    /// True if any step requires confirmation
    pub requires_confirmation: bool,
    /// Aggregate prompt read to the user when confirmation is required
    pub confirmation_prompt: Option<String>,
}

/// Apply policy rules to a plan and resolve its confirmation requirement.
pub fn evaluate(mut plan: ActionPlan, registry: &ToolRegistry) -> GatedPlan {
    for step in &mut plan.steps {
        apply_step_policy(step, registry);
    }

    let requires_confirmation = plan.needs_confirmation();
    let confirmation_prompt = if requires_confirmation {
        Some(build_prompt(&plan))
    } else {
        None
    };

    debug!(
        plan_id = %plan.plan_id,
        requires_confirmation,
        max_risk = ?plan.max_risk(),
        step_count = plan.steps.len(),
        "policy evaluated"
    );

    GatedPlan {
        plan,
        requires_confirmation,
        confirmation_prompt,
    }
}

fn apply_step_policy(step: &mut ActionStep, registry: &ToolRegistry) {
    let spec = match registry.get(&step.tool_name) {
        Some(tool) => tool.spec().clone(),
        None => {
            // Planner validation rejects unknown tools before gating; a miss
            // here means the registries diverged.
            warn!(tool = %step.tool_name, "gating step for tool missing from registry");
            return;
        }
    };

    upgrade_risk(step, spec.default_risk);

    if ATTENDEE_TOOLS.contains(&step.tool_name.as_str()) {
        apply_attendee_rules(step);
    }

    if step.risk_level == RiskLevel::High
        || (step.risk_level == RiskLevel::Medium && spec.irreversible)
    {
        step.requires_confirmation = true;
        if step.confirmation_phrase.is_none() && spec.irreversible {
            step.confirmation_phrase = Some(DESTRUCTIVE_PHRASE.to_string());
        }
    }
}

fn apply_attendee_rules(step: &mut ActionStep) {
    let attendees: Vec<String> = step
        .args
        .get("attendees")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(ToString::to_string))
                .collect()
        })
        .unwrap_or_default();

    if !attendees.is_empty() {
        upgrade_risk(step, RiskLevel::Medium);
        step.requires_confirmation = true;
        if step.confirmation_phrase.is_none() {
            let names = attendees
                .iter()
                .take(3)
                .cloned()
                .collect::<Vec<_>>()
                .join(", ");
            let suffix = if attendees.len() > 3 {
                format!(" and {} more", attendees.len() - 3)
            } else {
                String::new()
            };
            step.confirmation_phrase = Some(format!("This will invite {}{}. Confirm?", names, suffix));
        }
    }

    let send_updates = step
        .args
        .get("send_updates")
        .and_then(|v| v.as_str())
        .unwrap_or("none");
    if NOTIFICATION_SEND_VALUES.contains(&send_updates) {
        upgrade_risk(step, RiskLevel::Medium);
        step.requires_confirmation = true;
        if step.confirmation_phrase.is_none() {
            step.confirmation_phrase =
                Some("This will send notifications to attendees. Confirm?".to_string());
        }
    }
}

fn upgrade_risk(step: &mut ActionStep, target: RiskLevel) {
    if target > step.risk_level {
        step.risk_level = target;
    }
}

fn build_prompt(plan: &ActionPlan) -> String {
    let phrases: Vec<&str> = plan
        .steps
        .iter()
        .filter(|s| s.requires_confirmation)
        .filter_map(|s| s.confirmation_phrase.as_deref())
        .collect();

    if phrases.is_empty() {
        format!("Proceed with {} actions?", plan.steps.len())
    } else {
        phrases.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{Tool, ToolContext, ToolError, ToolSpec};
    use crate::types::ExecutionTarget;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Arc;

    struct SpecOnlyTool {
        spec: ToolSpec,
    }

    #[async_trait]
    impl Tool for SpecOnlyTool {
        fn spec(&self) -> &ToolSpec {
            &self.spec
        }

        async fn invoke(&self, _args: &Value, _ctx: &ToolContext) -> Result<Value, ToolError> {
            Ok(Value::Null)
        }
    }

    fn calendar_registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        for spec in [
            ToolSpec::new("google_calendar.list_events", "List events"),
            ToolSpec::new("google_calendar.create_event", "Create an event"),
            ToolSpec::new("google_calendar.update_event", "Update an event"),
            ToolSpec::new("google_calendar.delete_event", "Delete an event")
                .with_risk(RiskLevel::High)
                .irreversible(),
            ToolSpec::new("mail.send_message", "Send an email")
                .with_risk(RiskLevel::Medium)
                .irreversible(),
            ToolSpec::new("ios_reminders.create_reminder", "Create a reminder")
                .with_target(ExecutionTarget::Device),
        ] {
            registry.register(Arc::new(SpecOnlyTool { spec }));
        }
        registry
    }

    fn single_step_plan(tool: &str, args: Value) -> ActionPlan {
        ActionPlan::new("test").with_steps(vec![ActionStep::new(tool, args)])
    }

    #[test]
    fn test_destructive_tool_requires_confirmation() {
        let plan = single_step_plan("google_calendar.delete_event", json!({"event_id": "x"}));
        let gated = evaluate(plan, &calendar_registry());

        assert!(gated.requires_confirmation);
        let step = &gated.plan.steps[0];
        assert!(step.requires_confirmation);
        assert_eq!(step.risk_level, RiskLevel::High);
        assert!(step.confirmation_phrase.is_some());
        assert_eq!(gated.confirmation_prompt.as_deref(), Some(DESTRUCTIVE_PHRASE));
    }

    #[test]
    fn test_medium_irreversible_requires_confirmation() {
        let plan = single_step_plan("mail.send_message", json!({"to": "ana@example.com"}));
        let gated = evaluate(plan, &calendar_registry());

        assert!(gated.requires_confirmation);
        assert_eq!(gated.plan.steps[0].risk_level, RiskLevel::Medium);
    }

    #[test]
    fn test_safe_step_passes_ungated() {
        let plan = single_step_plan(
            "google_calendar.list_events",
            json!({"time_min": "2026-08-07T00:00:00", "time_max": "2026-08-08T00:00:00"}),
        );
        let gated = evaluate(plan, &calendar_registry());

        assert!(!gated.requires_confirmation);
        assert!(gated.confirmation_prompt.is_none());
        let step = &gated.plan.steps[0];
        assert!(!step.requires_confirmation);
        assert_eq!(step.risk_level, RiskLevel::Low);
    }

    #[test]
    fn test_risk_never_downgraded() {
        let mut plan = single_step_plan("google_calendar.list_events", json!({}));
        plan.steps[0].risk_level = RiskLevel::High;
        let gated = evaluate(plan, &calendar_registry());
        assert_eq!(gated.plan.steps[0].risk_level, RiskLevel::High);
        assert!(gated.requires_confirmation);
    }

    #[test]
    fn test_attendees_trigger_confirmation() {
        let plan = single_step_plan(
            "google_calendar.create_event",
            json!({"title": "sync", "attendees": ["ana@example.com", "bo@example.com"]}),
        );
        let gated = evaluate(plan, &calendar_registry());

        let step = &gated.plan.steps[0];
        assert!(step.requires_confirmation);
        assert_eq!(step.risk_level, RiskLevel::Medium);
        let phrase = step.confirmation_phrase.as_deref().unwrap();
        assert!(phrase.contains("ana@example.com"));
    }

    #[test]
    fn test_send_updates_triggers_confirmation() {
        let plan = single_step_plan(
            "google_calendar.update_event",
            json!({"event_id": "x", "patch_fields": {}, "send_updates": "all"}),
        );
        let gated = evaluate(plan, &calendar_registry());

        let step = &gated.plan.steps[0];
        assert!(step.requires_confirmation);
        assert_eq!(step.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn test_low_risk_argument_change_never_flips_plan_flag() {
        let registry = calendar_registry();
        let a = single_step_plan("google_calendar.list_events", json!({"time_min": "a"}));
        let b = single_step_plan("google_calendar.list_events", json!({"time_min": "b", "extra": 1}));
        assert!(!evaluate(a, &registry).requires_confirmation);
        assert!(!evaluate(b, &registry).requires_confirmation);
    }

    #[test]
    fn test_empty_plan_never_gated() {
        let gated = evaluate(ActionPlan::new("just chatting"), &calendar_registry());
        assert!(!gated.requires_confirmation);
        assert!(gated.confirmation_prompt.is_none());
    }

    #[test]
    fn test_generic_prompt_fallback() {
        let mut plan = single_step_plan("google_calendar.create_event", json!({"title": "x"}));
        // Flagged by the planner without a phrase; no policy rule adds one.
        plan.steps[0].risk_level = RiskLevel::High;
        let gated = evaluate(plan, &calendar_registry());
        assert_eq!(
            gated.confirmation_prompt.as_deref(),
            Some("Proceed with 1 actions?")
        );
    }
}
