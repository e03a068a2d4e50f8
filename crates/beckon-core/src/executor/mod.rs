//! Executor module
//!
//! The Executor walks an approved plan strictly in step order:
//! - server-target steps invoke the registered tool implementation
//! - device-target steps are never executed here; a DeviceAction is minted,
//!   registered as outstanding in the plan store, and returned to the client
//!
//! A failed server step is recorded and does not abort the remaining steps
//! unless the tool is flagged critical. Steps are never retried within one
//! execute() call.

use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info, warn};

use crate::store::{PlanStore, StoreError};
use crate::tool::{ToolContext, ToolRegistry};
use crate::types::{ActionPlan, ActionStep, DeviceAction, ExecutionTarget};

/// Outcome of one step.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub step: ActionStep,
    pub success: bool,
    /// Server tool result payload, if the step ran server-side
    pub result: Option<Value>,
    pub error: Option<String>,
    /// The minted device action, if the step was delegated
    pub device_action: Option<DeviceAction>,
}

impl StepResult {
    fn ok(step: ActionStep, result: Value) -> Self {
        Self {
            step,
            success: true,
            result: Some(result),
            error: None,
            device_action: None,
        }
    }

    fn failed(step: ActionStep, error: impl Into<String>) -> Self {
        Self {
            step,
            success: false,
            result: None,
            error: Some(error.into()),
            device_action: None,
        }
    }

    fn delegated(step: ActionStep, action: DeviceAction) -> Self {
        Self {
            step,
            success: true,
            result: None,
            error: None,
            device_action: Some(action),
        }
    }
}

/// Aggregated outcome of executing a plan.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    /// Summary synthesized from step outcomes, spoken back to the user
    pub spoken_response: String,
    pub step_results: Vec<StepResult>,
    /// Device actions the client must execute and report back
    pub device_actions: Vec<DeviceAction>,
    pub all_succeeded: bool,
}

impl ExecutionOutcome {
    fn new() -> Self {
        Self {
            spoken_response: String::new(),
            step_results: Vec::new(),
            device_actions: Vec::new(),
            all_succeeded: true,
        }
    }

    fn add(&mut self, step_result: StepResult) {
        if let Some(action) = &step_result.device_action {
            self.device_actions.push(action.clone());
        }
        if !step_result.success {
            self.all_succeeded = false;
        }
        self.step_results.push(step_result);
    }
}

/// The executor - dispatches plan steps to server tools or the device.
pub struct Executor {
    registry: Arc<ToolRegistry>,
}

impl Executor {
    /// Create a new executor over a tool registry.
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// Execute a plan. Only call this for plans that do not require
    /// confirmation, or immediately after the user confirmed.
    ///
    /// Minted device actions are registered as outstanding in the plan
    /// store before this returns.
    pub async fn execute(
        &self,
        plan: &ActionPlan,
        ctx: &ToolContext,
        plans: &dyn PlanStore,
    ) -> Result<ExecutionOutcome, StoreError> {
        let mut outcome = ExecutionOutcome::new();

        for step in &plan.steps {
            let step_result = match step.execution_target {
                ExecutionTarget::Device => self.delegate_step(step),
                ExecutionTarget::Server => self.run_server_step(step, ctx).await,
            };

            let abort = !step_result.success && self.is_critical(&step.tool_name);
            if !step_result.success {
                error!(
                    plan_id = %plan.plan_id,
                    tool = %step.tool_name,
                    error = step_result.error.as_deref().unwrap_or("unknown"),
                    abort,
                    "step failed"
                );
            }
            outcome.add(step_result);
            if abort {
                break;
            }
        }

        if !outcome.device_actions.is_empty() {
            plans
                .mark_outstanding(&plan.plan_id, &outcome.device_actions)
                .await?;
        }

        outcome.spoken_response = spoken_summary(plan, &outcome);
        Ok(outcome)
    }

    fn is_critical(&self, tool_name: &str) -> bool {
        self.registry
            .get(tool_name)
            .map(|t| t.spec().critical)
            .unwrap_or(false)
    }

    fn delegate_step(&self, step: &ActionStep) -> StepResult {
        let action = DeviceAction::new(
            step.tool_name.clone(),
            step.args.clone(),
            step.idempotency_key.clone(),
        );
        info!(
            tool = %step.tool_name,
            action_id = %action.action_id,
            "delegating step to device"
        );
        StepResult::delegated(step.clone(), action)
    }

    async fn run_server_step(&self, step: &ActionStep, ctx: &ToolContext) -> StepResult {
        let tool = match self.registry.get(&step.tool_name) {
            Some(tool) => tool,
            None => {
                return StepResult::failed(
                    step.clone(),
                    format!("unknown tool: {}", step.tool_name),
                )
            }
        };

        match tool.invoke(&step.args, ctx).await {
            Ok(result) => {
                info!(tool = %step.tool_name, key = %step.idempotency_key, "step ok");
                let verification = tool.verify(&step.args, &result, ctx).await;
                if !verification.matched {
                    warn!(
                        tool = %step.tool_name,
                        discrepancies = ?verification.discrepancies,
                        "post-write verification mismatch"
                    );
                }
                StepResult::ok(step.clone(), result)
            }
            Err(err) => StepResult::failed(step.clone(), err.to_string()),
        }
    }
}

/// Synthesize a spoken response from step outcomes.
fn spoken_summary(plan: &ActionPlan, outcome: &ExecutionOutcome) -> String {
    if plan.steps.is_empty() {
        return "I didn't find any actions to take.".to_string();
    }

    let parts: Vec<String> = outcome
        .step_results
        .iter()
        .map(|sr| {
            if sr.device_action.is_some() {
                format!("Sending '{}' to your device.", sr.step.tool_name)
            } else if sr.success {
                format!("Done: {}.", sr.step.tool_name)
            } else {
                format!(
                    "Failed: {} — {}",
                    sr.step.tool_name,
                    sr.error.as_deref().unwrap_or("unknown error")
                )
            }
        })
        .collect();

    if parts.is_empty() {
        format!("Planned: {}", plan.user_intent)
    } else {
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ResolveOutcome;
    use crate::tool::{Tool, ToolError, ToolSpec};
    use crate::types::{DeviceActionResult, PlanId, RiskLevel};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct FixedTool {
        spec: ToolSpec,
        response: Result<Value, String>,
    }

    #[async_trait]
    impl Tool for FixedTool {
        fn spec(&self) -> &ToolSpec {
            &self.spec
        }

        async fn invoke(&self, _args: &Value, _ctx: &ToolContext) -> Result<Value, ToolError> {
            self.response
                .clone()
                .map_err(ToolError::Execution)
        }
    }

    /// Records mark_outstanding calls; everything else is unreachable in
    /// these tests.
    #[derive(Default)]
    struct RecordingStore {
        outstanding: Mutex<Vec<DeviceAction>>,
    }

    #[async_trait]
    impl PlanStore for RecordingStore {
        async fn create(&self, plan: ActionPlan) -> Result<PlanId, StoreError> {
            Ok(plan.plan_id)
        }

        async fn get(&self, _plan_id: &PlanId) -> Result<Option<ActionPlan>, StoreError> {
            Ok(None)
        }

        async fn put_pending_confirmation(
            &self,
            plan: ActionPlan,
            _prompt: String,
        ) -> Result<PlanId, StoreError> {
            Ok(plan.plan_id)
        }

        async fn take_pending_confirmation(
            &self,
            plan_id: &PlanId,
        ) -> Result<ActionPlan, StoreError> {
            Err(StoreError::NotFound(plan_id.to_string()))
        }

        async fn mark_outstanding(
            &self,
            _plan_id: &PlanId,
            actions: &[DeviceAction],
        ) -> Result<(), StoreError> {
            self.outstanding
                .lock()
                .map_err(|e| StoreError::Internal(e.to_string()))?
                .extend_from_slice(actions);
            Ok(())
        }

        async fn resolve_device_action(
            &self,
            _plan_id: &PlanId,
            _action_id: &str,
            _idempotency_key: &str,
            _result: DeviceActionResult,
        ) -> Result<ResolveOutcome, StoreError> {
            Ok(ResolveOutcome::Unknown)
        }

        async fn outstanding_count(&self, _plan_id: &PlanId) -> Result<usize, StoreError> {
            Ok(self.outstanding.lock().unwrap().len())
        }

        async fn resolved_results(
            &self,
            _plan_id: &PlanId,
        ) -> Result<Vec<DeviceActionResult>, StoreError> {
            Ok(Vec::new())
        }

        async fn expire(&self, _plan_id: &PlanId) -> Result<bool, StoreError> {
            Ok(false)
        }

        async fn purge_expired(&self) -> Result<usize, StoreError> {
            Ok(0)
        }
    }

    fn registry(tools: Vec<FixedTool>) -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        for tool in tools {
            registry.register(Arc::new(tool));
        }
        Arc::new(registry)
    }

    fn server_tool(name: &str, response: Result<Value, String>) -> FixedTool {
        FixedTool {
            spec: ToolSpec::new(name, "test tool"),
            response,
        }
    }

    #[tokio::test]
    async fn test_server_step_dispatched_to_tool() {
        let registry = registry(vec![server_tool(
            "google_calendar.create_event",
            Ok(json!({"event_id": "new123"})),
        )]);
        let plan = ActionPlan::new("schedule").with_steps(vec![ActionStep::new(
            "google_calendar.create_event",
            json!({"title": "Team standup"}),
        )]);

        let executor = Executor::new(registry);
        let store = RecordingStore::default();
        let outcome = executor
            .execute(&plan, &ToolContext::new("u1"), &store)
            .await
            .unwrap();

        assert!(outcome.all_succeeded);
        assert_eq!(outcome.step_results.len(), 1);
        assert_eq!(
            outcome.step_results[0].result,
            Some(json!({"event_id": "new123"}))
        );
        assert!(outcome.spoken_response.contains("Done: google_calendar.create_event"));
    }

    #[tokio::test]
    async fn test_device_step_minted_not_executed() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(FixedTool {
            spec: ToolSpec::new("ios_reminders.create_reminder", "device reminder")
                .with_target(ExecutionTarget::Device),
            response: Err("must not run".to_string()),
        }));
        let plan = ActionPlan::new("remind me").with_steps(vec![ActionStep::new(
            "ios_reminders.create_reminder",
            json!({"title": "call mom"}),
        )
        .with_target(ExecutionTarget::Device)]);

        let executor = Executor::new(Arc::new(reg));
        let store = RecordingStore::default();
        let outcome = executor
            .execute(&plan, &ToolContext::new("u1"), &store)
            .await
            .unwrap();

        assert!(outcome.all_succeeded);
        assert_eq!(outcome.device_actions.len(), 1);
        let action = &outcome.device_actions[0];
        assert_eq!(action.tool_name, "ios_reminders.create_reminder");
        assert_eq!(action.idempotency_key, plan.steps[0].idempotency_key);
        assert!(outcome.spoken_response.contains("to your device"));

        // Registered as outstanding before execute returned.
        let recorded = store.outstanding.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].action_id, action.action_id);
    }

    #[tokio::test]
    async fn test_independent_failure_does_not_short_circuit() {
        let registry = registry(vec![
            server_tool("calendar.create_event", Err("backend down".to_string())),
            server_tool("reminders.create_reminder", Ok(json!({"id": "r1"}))),
        ]);
        let plan = ActionPlan::new("two things").with_steps(vec![
            ActionStep::new("calendar.create_event", json!({})),
            ActionStep::new("reminders.create_reminder", json!({})),
        ]);

        let executor = Executor::new(registry);
        let outcome = executor
            .execute(&plan, &ToolContext::new("u1"), &RecordingStore::default())
            .await
            .unwrap();

        assert!(!outcome.all_succeeded);
        assert_eq!(outcome.step_results.len(), 2);
        assert!(!outcome.step_results[0].success);
        assert!(outcome.step_results[1].success);
        assert!(outcome.spoken_response.contains("Failed: calendar.create_event"));
        assert!(outcome.spoken_response.contains("Done: reminders.create_reminder"));
    }

    #[tokio::test]
    async fn test_critical_failure_aborts_remaining_steps() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(FixedTool {
            spec: ToolSpec::new("auth.refresh", "refresh credentials")
                .with_risk(RiskLevel::Low)
                .critical(),
            response: Err("token revoked".to_string()),
        }));
        reg.register(Arc::new(server_tool(
            "calendar.create_event",
            Ok(json!({})),
        )));
        let plan = ActionPlan::new("dependent").with_steps(vec![
            ActionStep::new("auth.refresh", json!({})),
            ActionStep::new("calendar.create_event", json!({})),
        ]);

        let executor = Executor::new(Arc::new(reg));
        let outcome = executor
            .execute(&plan, &ToolContext::new("u1"), &RecordingStore::default())
            .await
            .unwrap();

        assert!(!outcome.all_succeeded);
        assert_eq!(outcome.step_results.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_tool_recorded_as_failed_step() {
        let executor = Executor::new(Arc::new(ToolRegistry::new()));
        let plan = ActionPlan::new("mystery")
            .with_steps(vec![ActionStep::new("no.such_tool", json!({}))]);

        let outcome = executor
            .execute(&plan, &ToolContext::new("u1"), &RecordingStore::default())
            .await
            .unwrap();

        assert!(!outcome.all_succeeded);
        assert!(outcome.step_results[0]
            .error
            .as_deref()
            .unwrap()
            .contains("unknown tool"));
    }

    #[tokio::test]
    async fn test_empty_plan_returns_no_action_reply() {
        let executor = Executor::new(Arc::new(ToolRegistry::new()));
        let plan = ActionPlan::new("small talk");

        let outcome = executor
            .execute(&plan, &ToolContext::new("u1"), &RecordingStore::default())
            .await
            .unwrap();

        assert!(outcome.all_succeeded);
        assert_eq!(outcome.spoken_response, "I didn't find any actions to take.");
    }
}
