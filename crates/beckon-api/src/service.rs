//! CommandApi - the pipeline orchestration service.
//!
//! One submit flows: transcript → planner → policy gate → either a pending
//! confirmation or immediate execution → audit → session save → response.
//! Confirmation and device-result reporting re-enter the same plan through
//! the plan store.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use beckon_core::executor::{ExecutionOutcome, Executor};
use beckon_core::planner::{ConversationContext, HistoryItem, PlanError, PlanOutcome, Planner};
use beckon_core::policy;
use beckon_core::reconciler::{ReconcileStatus, Reconciler};
use beckon_core::store::{PlanStore, StoreError};
use beckon_core::tool::{ToolContext, ToolRegistry};
use beckon_core::types::{ActionPlan, PlanId};
use beckon_stores::{AuditEntry, AuditStatus, AuditStore, SessionStore};

use crate::dto::{
    CommandRequest, CommandResponse, ConfirmRequest, DeviceResultRequest, DeviceResultResponse,
};
use crate::error::ApiError;

const ANONYMOUS_SESSION: &str = "anonymous";

/// Command service trait - the three pipeline entry points.
#[async_trait]
pub trait CommandService: Send + Sync {
    async fn submit_command(&self, request: CommandRequest) -> Result<CommandResponse, ApiError>;
    async fn confirm_plan(&self, request: ConfirmRequest) -> Result<CommandResponse, ApiError>;
    async fn report_device_results(
        &self,
        request: DeviceResultRequest,
    ) -> Result<DeviceResultResponse, ApiError>;
}

/// Default CommandService implementation over the core pipeline.
pub struct CommandApi {
    planner: Arc<dyn Planner>,
    registry: Arc<ToolRegistry>,
    plans: Arc<dyn PlanStore>,
    sessions: Arc<dyn SessionStore>,
    audit: Arc<dyn AuditStore>,
    executor: Arc<Executor>,
    reconciler: Reconciler,
}

impl CommandApi {
    pub fn new(
        planner: Arc<dyn Planner>,
        registry: Arc<ToolRegistry>,
        plans: Arc<dyn PlanStore>,
        sessions: Arc<dyn SessionStore>,
        audit: Arc<dyn AuditStore>,
    ) -> Self {
        let executor = Arc::new(Executor::new(registry.clone()));
        let reconciler = Reconciler::new(plans.clone());
        Self {
            planner,
            registry,
            plans,
            sessions,
            audit,
            executor,
            reconciler,
        }
    }

    /// Execute a plan on a detached task and wait for it.
    ///
    /// A dispatched server tool call may already have mutated external
    /// state, so execution must run to completion even if the client
    /// disconnects and this handler future is dropped mid-await.
    async fn run_plan(
        &self,
        plan: ActionPlan,
        ctx: ToolContext,
    ) -> Result<ExecutionOutcome, ApiError> {
        let executor = self.executor.clone();
        let plans = self.plans.clone();
        let audit = self.audit.clone();

        let handle = tokio::spawn(async move {
            let outcome = executor.execute(&plan, &ctx, plans.as_ref()).await?;

            for sr in &outcome.step_results {
                let status = if sr.success {
                    AuditStatus::Ok
                } else {
                    AuditStatus::Error
                };
                let mut entry =
                    AuditEntry::new(&ctx.user_id, plan.plan_id.as_str(), &sr.step.tool_name, status)
                        .with_args(sr.step.args.clone());
                if let Some(result) = &sr.result {
                    entry = entry.with_result(result.clone());
                }
                if let Some(error) = &sr.error {
                    entry = entry.with_error(error.clone());
                }
                audit.record(entry).await?;
            }

            Ok::<ExecutionOutcome, StoreError>(outcome)
        });

        handle
            .await
            .map_err(|e| ApiError::Internal(format!("execution task failed: {}", e)))?
            .map_err(ApiError::from)
    }

    async fn save_turn(&self, session_key: &str, user_text: &str, assistant_text: &str) {
        let mut history = match self.sessions.load(session_key).await {
            Ok(history) => history,
            Err(err) => {
                warn!(error = %err, "failed to load session for save");
                return;
            }
        };
        history.push(HistoryItem::user(user_text));
        history.push(HistoryItem::assistant(assistant_text));
        if let Err(err) = self.sessions.save(session_key, history).await {
            warn!(error = %err, "failed to save session");
        }
    }

    fn tool_context(&self, session_key: &str, plan: &ActionPlan) -> ToolContext {
        ToolContext::new(session_key).with_context(plan.timezone.clone(), plan.locale.clone())
    }

    fn plan_failure_message(err: &PlanError) -> String {
        match err {
            PlanError::LlmUnavailable(_) => {
                "I couldn't reach my planning service. Please try again in a moment.".to_string()
            }
            PlanError::UnknownTool(_) | PlanError::SchemaMismatch { .. } => {
                "I couldn't work out a safe way to do that. Could you rephrase?".to_string()
            }
            PlanError::AmbiguousIntent(_) => {
                "I'm not sure what you meant. Could you rephrase?".to_string()
            }
        }
    }
}

#[async_trait]
impl CommandService for CommandApi {
    async fn submit_command(&self, request: CommandRequest) -> Result<CommandResponse, ApiError> {
        let transcript = request.transcript.trim().to_string();
        if transcript.is_empty() {
            return Err(ApiError::InvalidArgument(
                "transcript must not be empty".to_string(),
            ));
        }
        let session_key = request
            .session_id
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| ANONYMOUS_SESSION.to_string());

        let history = self.sessions.load(&session_key).await?;
        let context = ConversationContext::new()
            .with_context(request.timezone.clone(), request.locale.clone())
            .with_providers(request.linked_providers.clone())
            .with_history(history);

        let outcome = match self.planner.plan(&transcript, &context).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(reason = err.kind().as_str(), error = %err, "planning failed");
                self.audit
                    .record(
                        AuditEntry::new(&session_key, "", "planner", AuditStatus::Error)
                            .with_error(format!("{}: {}", err.kind().as_str(), err)),
                    )
                    .await?;
                let message = Self::plan_failure_message(&err);
                self.save_turn(&session_key, &transcript, &message).await;
                return Ok(CommandResponse::spoken(message));
            }
        };

        let plan = match outcome {
            PlanOutcome::Clarification { question } => {
                self.save_turn(&session_key, &transcript, &question).await;
                return Ok(CommandResponse::spoken(question));
            }
            PlanOutcome::Reply { text } => {
                self.save_turn(&session_key, &transcript, &text).await;
                return Ok(CommandResponse::spoken(text));
            }
            PlanOutcome::Plan(plan) => plan,
        };

        let gated = policy::evaluate(plan, &self.registry);

        if gated.requires_confirmation {
            let prompt = gated
                .confirmation_prompt
                .clone()
                .unwrap_or_else(|| format!("Confirm: {}?", gated.plan.user_intent));
            let plan_id = self
                .plans
                .put_pending_confirmation(gated.plan.clone(), prompt.clone())
                .await?;
            info!(plan_id = %plan_id, "plan awaiting confirmation");

            self.save_turn(&session_key, &transcript, &prompt).await;
            return Ok(CommandResponse {
                spoken_response: prompt.clone(),
                action_plan: Some(gated.plan),
                device_actions: Vec::new(),
                requires_confirmation: true,
                confirmation_prompt: Some(prompt),
                plan_id: Some(plan_id),
                attachments: Vec::new(),
                updated_user_name: None,
            });
        }

        let plan = gated.plan;
        let plan_id = self.plans.create(plan.clone()).await?;
        let ctx = self.tool_context(&session_key, &plan);
        let outcome = self.run_plan(plan.clone(), ctx).await?;

        self.save_turn(&session_key, &transcript, &outcome.spoken_response)
            .await;
        Ok(CommandResponse {
            spoken_response: outcome.spoken_response,
            action_plan: Some(plan),
            device_actions: outcome.device_actions,
            requires_confirmation: false,
            confirmation_prompt: None,
            plan_id: Some(plan_id),
            attachments: Vec::new(),
            updated_user_name: None,
        })
    }

    async fn confirm_plan(&self, request: ConfirmRequest) -> Result<CommandResponse, ApiError> {
        let plan_id = PlanId::new(request.plan_id);
        let plan = match self.plans.take_pending_confirmation(&plan_id).await {
            Ok(plan) => plan,
            Err(StoreError::NotFound(_)) => {
                return Err(ApiError::NotFound(
                    "plan not found or already executed".to_string(),
                ))
            }
            Err(err) => return Err(err.into()),
        };
        info!(plan_id = %plan_id, "executing confirmed plan");

        let ctx = self.tool_context(ANONYMOUS_SESSION, &plan);
        let outcome = self.run_plan(plan.clone(), ctx).await?;

        Ok(CommandResponse {
            spoken_response: outcome.spoken_response,
            action_plan: Some(plan),
            device_actions: outcome.device_actions,
            requires_confirmation: false,
            confirmation_prompt: None,
            plan_id: Some(plan_id),
            attachments: Vec::new(),
            updated_user_name: None,
        })
    }

    async fn report_device_results(
        &self,
        request: DeviceResultRequest,
    ) -> Result<DeviceResultResponse, ApiError> {
        let plan_id = PlanId::new(request.plan_id);
        let report = self
            .reconciler
            .reconcile(&plan_id, request.results.clone())
            .await?;

        for (entry, result) in report.entries.iter().zip(&request.results) {
            let status = if entry.status == ReconcileStatus::Applied && entry.error.is_none() {
                AuditStatus::Ok
            } else {
                AuditStatus::Error
            };
            let mut audit_entry = AuditEntry::new(
                ANONYMOUS_SESSION,
                plan_id.as_str(),
                format!("device:{}", entry.action_id),
                status,
            )
            .with_result(result.result.clone());
            if let Some(error) = &entry.error {
                audit_entry = audit_entry.with_error(error.clone());
            }
            self.audit.record(audit_entry).await?;
        }

        let any_rejected = report
            .entries
            .iter()
            .any(|e| e.status == ReconcileStatus::Unknown || e.error.is_some());
        let status = if any_rejected {
            "partial_failure"
        } else if report.fully_reconciled {
            "reconciled"
        } else {
            "accepted"
        };

        Ok(DeviceResultResponse {
            status: status.to_string(),
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beckon_core::types::{ActionStep, DeviceActionResult, ExecutionTarget, RiskLevel};
    use beckon_stores::{InMemoryAuditStore, InMemoryPlanStore, InMemorySessionStore};
    use beckon_tools::{default_registry, CalendarBackend, InMemoryCalendarBackend};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedPlanner {
        script: Mutex<VecDeque<Result<PlanOutcome, PlanError>>>,
    }

    impl ScriptedPlanner {
        fn with(outcomes: Vec<Result<PlanOutcome, PlanError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(outcomes.into()),
            })
        }
    }

    #[async_trait]
    impl Planner for ScriptedPlanner {
        async fn plan(
            &self,
            _transcript: &str,
            _context: &ConversationContext,
        ) -> Result<PlanOutcome, PlanError> {
            self.script
                .lock()
                .expect("script lock")
                .pop_front()
                .expect("scripted outcome")
        }
    }

    struct Harness {
        api: CommandApi,
        plans: Arc<InMemoryPlanStore>,
        backend: Arc<InMemoryCalendarBackend>,
    }

    fn harness(planner: Arc<dyn Planner>) -> Harness {
        harness_with_store(planner, Arc::new(InMemoryPlanStore::new()))
    }

    fn harness_with_store(planner: Arc<dyn Planner>, plans: Arc<InMemoryPlanStore>) -> Harness {
        let backend = Arc::new(InMemoryCalendarBackend::new());
        let registry = Arc::new(default_registry(backend.clone()));
        let api = CommandApi::new(
            planner,
            registry,
            plans.clone(),
            Arc::new(InMemorySessionStore::new()),
            Arc::new(InMemoryAuditStore::new()),
        );
        Harness {
            api,
            plans,
            backend,
        }
    }

    fn request(transcript: &str) -> CommandRequest {
        CommandRequest {
            session_id: Some("s1".to_string()),
            transcript: transcript.to_string(),
            timezone: "America/New_York".to_string(),
            locale: "en-US".to_string(),
            linked_providers: vec!["google_calendar".to_string()],
        }
    }

    fn mixed_plan() -> ActionPlan {
        ActionPlan::new("schedule a meeting and a reminder")
            .with_context("America/New_York", "en-US")
            .with_steps(vec![
                ActionStep::new(
                    "google_calendar.create_event",
                    json!({
                        "title": "meeting",
                        "start": "2026-08-08T14:00:00",
                        "end": "2026-08-08T15:00:00"
                    }),
                ),
                ActionStep::new(
                    "ios_reminders.create_reminder",
                    json!({"title": "call mom", "due_date": "2026-08-08T17:00:00"}),
                )
                .with_target(ExecutionTarget::Device),
            ])
    }

    #[tokio::test]
    async fn test_mixed_plan_executes_server_step_and_delegates_device_step() {
        let planner = ScriptedPlanner::with(vec![Ok(PlanOutcome::Plan(mixed_plan()))]);
        let h = harness(planner);

        let response = h
            .api
            .submit_command(request(
                "schedule a meeting tomorrow at 2pm and remind me to call mom at 5pm",
            ))
            .await
            .unwrap();

        assert!(!response.requires_confirmation);
        assert_eq!(response.device_actions.len(), 1);
        assert!(response.spoken_response.contains("Done: google_calendar.create_event"));
        assert!(response.spoken_response.contains("to your device"));

        // The calendar event really exists server-side.
        let events = h
            .backend
            .list_events("2026-08-08T00:00:00", "2026-08-09T00:00:00")
            .await
            .unwrap();
        assert_eq!(events.len(), 1);

        // Reporting the device result reconciles the plan fully.
        let action = &response.device_actions[0];
        let reconciled = h
            .api
            .report_device_results(DeviceResultRequest {
                plan_id: response.plan_id.clone().unwrap().to_string(),
                results: vec![DeviceActionResult {
                    action_id: action.action_id.clone(),
                    idempotency_key: action.idempotency_key.clone(),
                    success: true,
                    result: json!({"reminder_id": "r1"}),
                    error: None,
                }],
            })
            .await
            .unwrap();
        assert_eq!(reconciled.status, "reconciled");
        assert!(reconciled.report.fully_reconciled);
        assert_eq!(
            reconciled.report.entries[0].status,
            ReconcileStatus::Applied
        );

        // Replaying the same result is idempotent.
        let replay = h
            .api
            .report_device_results(DeviceResultRequest {
                plan_id: response.plan_id.unwrap().to_string(),
                results: vec![DeviceActionResult {
                    action_id: action.action_id.clone(),
                    idempotency_key: action.idempotency_key.clone(),
                    success: true,
                    result: json!({"reminder_id": "r1"}),
                    error: None,
                }],
            })
            .await
            .unwrap();
        assert_eq!(
            replay.report.entries[0].status,
            ReconcileStatus::AlreadyResolved
        );
    }

    #[tokio::test]
    async fn test_high_risk_plan_requires_confirmation_then_executes() {
        let event = seeded_backend().await;
        let plan = ActionPlan::new("delete my 3pm meeting").with_steps(vec![ActionStep::new(
            "google_calendar.delete_event",
            json!({"event_id": event.1}),
        )]);
        let planner = ScriptedPlanner::with(vec![Ok(PlanOutcome::Plan(plan))]);
        let h = harness_with_backend(planner, event.0);

        let response = h.api.submit_command(request("delete my 3pm meeting")).await.unwrap();
        assert!(response.requires_confirmation);
        assert!(response.confirmation_prompt.is_some());
        let plan_id = response.plan_id.clone().unwrap();

        // Nothing executed yet: the event is still there.
        assert_eq!(h.backend.list_events("0", "9").await.unwrap().len(), 1);

        let confirmed = h
            .api
            .confirm_plan(ConfirmRequest {
                plan_id: plan_id.to_string(),
            })
            .await
            .unwrap();
        assert!(confirmed.spoken_response.contains("Done: google_calendar.delete_event"));
        assert_eq!(h.backend.list_events("0", "9").await.unwrap().len(), 0);

        // A second confirm finds nothing.
        let err = h
            .api
            .confirm_plan(ConfirmRequest {
                plan_id: plan_id.to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::NotFound);
    }

    /// Create an event in a fresh backend; returns (backend, event_id).
    async fn seeded_backend() -> (Arc<InMemoryCalendarBackend>, String) {
        let backend = Arc::new(InMemoryCalendarBackend::new());
        let created = backend
            .create_event(beckon_tools::CalendarEvent {
                event_id: String::new(),
                title: "3pm meeting".to_string(),
                start: "2026-08-07T15:00:00".to_string(),
                end: "2026-08-07T16:00:00".to_string(),
                location: None,
                attendees: Vec::new(),
            })
            .await
            .unwrap();
        (backend, created.event_id)
    }

    fn harness_with_backend(
        planner: Arc<dyn Planner>,
        backend: Arc<InMemoryCalendarBackend>,
    ) -> Harness {
        let registry = Arc::new(default_registry(backend.clone()));
        let plans = Arc::new(InMemoryPlanStore::new());
        let api = CommandApi::new(
            planner,
            registry,
            plans.clone(),
            Arc::new(InMemorySessionStore::new()),
            Arc::new(InMemoryAuditStore::new()),
        );
        Harness {
            api,
            plans,
            backend,
        }
    }

    #[tokio::test]
    async fn test_expired_confirmation_rejected() {
        let plan = ActionPlan::new("delete it").with_steps(vec![ActionStep::new(
            "google_calendar.delete_event",
            json!({"event_id": "x"}),
        )
        .with_risk(RiskLevel::High)]);
        let planner = ScriptedPlanner::with(vec![Ok(PlanOutcome::Plan(plan))]);
        let h = harness_with_store(
            planner,
            Arc::new(InMemoryPlanStore::with_ttl(chrono::Duration::zero())),
        );

        let response = h.api.submit_command(request("delete it")).await.unwrap();
        let plan_id = response.plan_id.unwrap();

        let err = h
            .api
            .confirm_plan(ConfirmRequest {
                plan_id: plan_id.to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::PlanExpired);

        // The sweep drops it for good.
        assert_eq!(h.plans.purge_expired().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_transcript_rejected() {
        let planner = ScriptedPlanner::with(vec![]);
        let h = harness(planner);
        let err = h.api.submit_command(request("   ")).await.unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::InvalidArgument);
    }

    #[tokio::test]
    async fn test_planning_failure_surfaces_conversational_message() {
        let planner = ScriptedPlanner::with(vec![Err(PlanError::UnknownTool(
            "smart_home.unlock_door".to_string(),
        ))]);
        let h = harness(planner);

        let response = h.api.submit_command(request("unlock the door")).await.unwrap();
        assert!(response.action_plan.is_none());
        assert!(response.plan_id.is_none());
        assert!(response.spoken_response.contains("rephrase"));
    }

    #[tokio::test]
    async fn test_clarification_returned_as_text() {
        let planner = ScriptedPlanner::with(vec![Ok(PlanOutcome::Clarification {
            question: "What time should the meeting start?".to_string(),
        })]);
        let h = harness(planner);

        let response = h.api.submit_command(request("schedule a meeting")).await.unwrap();
        assert_eq!(
            response.spoken_response,
            "What time should the meeting start?"
        );
        assert!(!response.requires_confirmation);
        assert!(response.device_actions.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_device_result_reported_per_entry() {
        let planner = ScriptedPlanner::with(vec![Ok(PlanOutcome::Plan(mixed_plan()))]);
        let h = harness(planner);

        let response = h.api.submit_command(request("do both")).await.unwrap();
        let action = &response.device_actions[0];
        let plan_id = response.plan_id.unwrap().to_string();

        let mixed = h
            .api
            .report_device_results(DeviceResultRequest {
                plan_id,
                results: vec![
                    DeviceActionResult {
                        action_id: "never-issued".to_string(),
                        idempotency_key: "bogus".to_string(),
                        success: true,
                        result: json!({}),
                        error: None,
                    },
                    DeviceActionResult {
                        action_id: action.action_id.clone(),
                        idempotency_key: action.idempotency_key.clone(),
                        success: true,
                        result: json!({}),
                        error: None,
                    },
                ],
            })
            .await
            .unwrap();

        // The bad entry is rejected alone; the good one still applies.
        assert_eq!(mixed.status, "partial_failure");
        assert_eq!(mixed.report.entries[0].status, ReconcileStatus::Unknown);
        assert_eq!(mixed.report.entries[1].status, ReconcileStatus::Applied);
        assert!(mixed.report.fully_reconciled);
    }

    #[tokio::test]
    async fn test_device_results_for_unknown_plan_rejected() {
        let planner = ScriptedPlanner::with(vec![]);
        let h = harness(planner);

        let err = h
            .api
            .report_device_results(DeviceResultRequest {
                plan_id: "no-such-plan".to_string(),
                results: vec![],
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::NotFound);
    }
}
