//! Reconciler module
//!
//! The Reconciler accepts device-reported results for a previously
//! dispatched plan, matches them against outstanding device actions through
//! the plan store, and merges them into the plan's final state.
//!
//! Failure scope is per-result: an unmatched entry is reported back for
//! that entry alone; other valid results in the same batch still apply.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::store::{PlanStore, ResolveOutcome, StoreError};
use crate::types::{DeviceActionResult, PlanId};

/// Per-result reconciliation status, mirrored to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileStatus {
    Applied,
    AlreadyResolved,
    Unknown,
}

/// Outcome for one reported device result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationEntry {
    pub action_id: String,
    pub status: ReconcileStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of one reconciliation batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub plan_id: PlanId,
    pub entries: Vec<ReconciliationEntry>,
    /// True once every dispatched device action has a recorded result
    pub fully_reconciled: bool,
    /// Final summary once fully reconciled, surfacing device failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Matches device-reported results back to outstanding device actions.
pub struct Reconciler {
    plans: Arc<dyn PlanStore>,
}

impl Reconciler {
    pub fn new(plans: Arc<dyn PlanStore>) -> Self {
        Self { plans }
    }

    /// Apply a batch of device results to a plan.
    ///
    /// Rejects the whole batch only when the plan itself is unknown or
    /// expired; individual mismatches are reported per entry.
    pub async fn reconcile(
        &self,
        plan_id: &PlanId,
        results: Vec<DeviceActionResult>,
    ) -> Result<ReconciliationReport, StoreError> {
        let mut entries = Vec::with_capacity(results.len());

        for result in results {
            let action_id = result.action_id.clone();
            let idempotency_key = result.idempotency_key.clone();
            let device_error = if result.success {
                None
            } else {
                Some(format!(
                    "device execution failed: {}",
                    result.error.as_deref().unwrap_or("unknown error")
                ))
            };

            let outcome = self
                .plans
                .resolve_device_action(plan_id, &action_id, &idempotency_key, result)
                .await?;

            let entry = match outcome {
                ResolveOutcome::Applied => ReconciliationEntry {
                    action_id,
                    status: ReconcileStatus::Applied,
                    error: device_error,
                },
                ResolveOutcome::AlreadyResolved { .. } => ReconciliationEntry {
                    action_id,
                    status: ReconcileStatus::AlreadyResolved,
                    error: None,
                },
                ResolveOutcome::Unknown => {
                    warn!(plan_id = %plan_id, action_id = %action_id, "unknown device action result");
                    ReconciliationEntry {
                        action_id,
                        status: ReconcileStatus::Unknown,
                        error: Some("no outstanding device action with this id and key".to_string()),
                    }
                }
            };
            entries.push(entry);
        }

        let fully_reconciled = self.plans.outstanding_count(plan_id).await? == 0;
        let summary = if fully_reconciled {
            let failures: Vec<String> = self
                .plans
                .resolved_results(plan_id)
                .await?
                .iter()
                .filter(|r| !r.success)
                .map(|r| {
                    format!(
                        "{}: {}",
                        r.action_id,
                        r.error.as_deref().unwrap_or("unknown error")
                    )
                })
                .collect();
            Some(build_summary(&failures))
        } else {
            None
        };

        info!(
            plan_id = %plan_id,
            applied = entries.iter().filter(|e| e.status == ReconcileStatus::Applied).count(),
            unknown = entries.iter().filter(|e| e.status == ReconcileStatus::Unknown).count(),
            fully_reconciled,
            "reconciled device results"
        );

        Ok(ReconciliationReport {
            plan_id: plan_id.clone(),
            entries,
            fully_reconciled,
            summary,
        })
    }
}

fn build_summary(failures: &[String]) -> String {
    if failures.is_empty() {
        "All device actions completed.".to_string()
    } else {
        format!(
            "Some device actions failed: {}",
            failures.join("; ")
        )
    }
}
