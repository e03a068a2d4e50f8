//! Plan store module
//!
//! The plan store exclusively owns ActionPlan lifetime and is the single
//! source of truth for which device actions are still outstanding for a
//! plan. The Executor and Reconciler both operate through this trait; no
//! other component mutates plan state directly.
//!
//! Note: implementations are in the beckon-stores crate.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{ActionPlan, DeviceAction, DeviceActionResult, PlanId};

/// Store error types
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("plan not found: {0}")]
    NotFound(String),

    #[error("plan expired: {0}")]
    Expired(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Outcome of resolving one device-reported result against a plan.
#[derive(Debug, Clone)]
pub enum ResolveOutcome {
    /// Matched an outstanding action and recorded the result
    Applied,
    /// The same action_id/idempotency_key pair was already reported; the
    /// prior recorded result is returned without reapplying
    AlreadyResolved { previous: DeviceActionResult },
    /// No such outstanding action for this plan (never issued, or the
    /// idempotency key does not match)
    Unknown,
}

/// Plan store trait - async interface for plan lifecycle state
///
/// Implementations must serialize operations on the same plan (no two
/// concurrent resolutions of one device action may both apply) while letting
/// operations on different plans proceed in parallel.
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Store an executed (or executing) plan so device results can be
    /// reconciled against it later.
    async fn create(&self, plan: ActionPlan) -> Result<PlanId, StoreError>;

    /// Fetch a stored plan. Returns `Ok(None)` for unknown IDs and
    /// `Err(Expired)` past the TTL.
    async fn get(&self, plan_id: &PlanId) -> Result<Option<ActionPlan>, StoreError>;

    /// Store a plan awaiting user confirmation, with the prompt shown to
    /// the user.
    async fn put_pending_confirmation(
        &self,
        plan: ActionPlan,
        prompt: String,
    ) -> Result<PlanId, StoreError>;

    /// Take a plan out of the awaiting-confirmation state. Single-shot: a
    /// second take (or a decline) finds nothing.
    async fn take_pending_confirmation(&self, plan_id: &PlanId) -> Result<ActionPlan, StoreError>;

    /// Register device actions dispatched for a plan as outstanding.
    async fn mark_outstanding(
        &self,
        plan_id: &PlanId,
        actions: &[DeviceAction],
    ) -> Result<(), StoreError>;

    /// Match one device-reported result against the plan's outstanding
    /// actions. Atomic check-and-set: replay detection is race-free.
    async fn resolve_device_action(
        &self,
        plan_id: &PlanId,
        action_id: &str,
        idempotency_key: &str,
        result: DeviceActionResult,
    ) -> Result<ResolveOutcome, StoreError>;

    /// Number of device actions still awaiting a result. A plan is fully
    /// reconciled once this reaches zero.
    async fn outstanding_count(&self, plan_id: &PlanId) -> Result<usize, StoreError>;

    /// All device results recorded for a plan so far.
    async fn resolved_results(
        &self,
        plan_id: &PlanId,
    ) -> Result<Vec<DeviceActionResult>, StoreError>;

    /// Drop a plan; late confirmations or results for it are rejected.
    /// Returns whether a plan was actually removed.
    async fn expire(&self, plan_id: &PlanId) -> Result<bool, StoreError>;

    /// Remove all plans past their TTL; returns how many were dropped.
    async fn purge_expired(&self) -> Result<usize, StoreError>;
}
