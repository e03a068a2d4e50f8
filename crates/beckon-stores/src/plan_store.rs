//! PlanStore in-memory implementation.
//!
//! The map itself is behind an RwLock; each plan entry sits behind its own
//! Mutex. Operations on different plans proceed in parallel, operations on
//! the same plan serialize, which makes resolve's check-and-set race-free.
//! Entries past the TTL behave as absent and are dropped by purge_expired.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::info;

use beckon_core::store::{PlanStore, ResolveOutcome, StoreError};
use beckon_core::types::{ActionPlan, DeviceAction, DeviceActionResult, PlanId};

const DEFAULT_PLAN_TTL_SECS: i64 = 300;

struct PlanEntry {
    plan: ActionPlan,
    created_at: DateTime<Utc>,
    /// Prompt shown to the user while awaiting confirmation; None once
    /// confirmed, declined, or never required
    pending_prompt: Option<String>,
    /// Dispatched device actions still awaiting a result, by action_id
    outstanding: HashMap<String, DeviceAction>,
    /// Recorded device results, by action_id
    resolved: HashMap<String, DeviceActionResult>,
}

impl PlanEntry {
    fn new(plan: ActionPlan, pending_prompt: Option<String>) -> Self {
        Self {
            plan,
            created_at: Utc::now(),
            pending_prompt,
            outstanding: HashMap::new(),
            resolved: HashMap::new(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        Utc::now() - self.created_at > ttl
    }
}

/// In-memory plan store for development and testing.
pub struct InMemoryPlanStore {
    plans: RwLock<HashMap<String, Arc<Mutex<PlanEntry>>>>,
    ttl: Duration,
}

impl InMemoryPlanStore {
    /// Create a store with the default TTL.
    pub fn new() -> Self {
        Self::with_ttl(Duration::seconds(DEFAULT_PLAN_TTL_SECS))
    }

    /// Create a store with a custom TTL.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            plans: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    fn insert(&self, plan: ActionPlan, pending_prompt: Option<String>) -> Result<PlanId, StoreError> {
        let plan_id = plan.plan_id.clone();
        let entry = Arc::new(Mutex::new(PlanEntry::new(plan, pending_prompt)));
        let mut plans = self
            .plans
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        plans.insert(plan_id.to_string(), entry);
        Ok(plan_id)
    }

    /// Look up a live entry. Missing plans are NotFound; expired plans are
    /// Expired regardless of whether purge has dropped them yet.
    fn entry(&self, plan_id: &PlanId) -> Result<Arc<Mutex<PlanEntry>>, StoreError> {
        let plans = self
            .plans
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        plans
            .get(plan_id.as_str())
            .cloned()
            .ok_or_else(|| StoreError::NotFound(plan_id.to_string()))
    }

    fn lock_live<'a>(
        &self,
        entry: &'a Arc<Mutex<PlanEntry>>,
        plan_id: &PlanId,
    ) -> Result<std::sync::MutexGuard<'a, PlanEntry>, StoreError> {
        let guard = entry
            .lock()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        if guard.is_expired(self.ttl) {
            return Err(StoreError::Expired(plan_id.to_string()));
        }
        Ok(guard)
    }
}

impl Default for InMemoryPlanStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlanStore for InMemoryPlanStore {
    async fn create(&self, plan: ActionPlan) -> Result<PlanId, StoreError> {
        self.insert(plan, None)
    }

    async fn get(&self, plan_id: &PlanId) -> Result<Option<ActionPlan>, StoreError> {
        let entry = match self.entry(plan_id) {
            Ok(entry) => entry,
            Err(StoreError::NotFound(_)) => return Ok(None),
            Err(err) => return Err(err),
        };
        let guard = self.lock_live(&entry, plan_id)?;
        Ok(Some(guard.plan.clone()))
    }

    async fn put_pending_confirmation(
        &self,
        plan: ActionPlan,
        prompt: String,
    ) -> Result<PlanId, StoreError> {
        self.insert(plan, Some(prompt))
    }

    async fn take_pending_confirmation(&self, plan_id: &PlanId) -> Result<ActionPlan, StoreError> {
        let entry = self.entry(plan_id)?;
        let mut guard = self.lock_live(&entry, plan_id)?;
        if guard.pending_prompt.take().is_none() {
            return Err(StoreError::NotFound(plan_id.to_string()));
        }
        Ok(guard.plan.clone())
    }

    async fn mark_outstanding(
        &self,
        plan_id: &PlanId,
        actions: &[DeviceAction],
    ) -> Result<(), StoreError> {
        let entry = self.entry(plan_id)?;
        let mut guard = self.lock_live(&entry, plan_id)?;
        for action in actions {
            guard
                .outstanding
                .insert(action.action_id.clone(), action.clone());
        }
        Ok(())
    }

    async fn resolve_device_action(
        &self,
        plan_id: &PlanId,
        action_id: &str,
        idempotency_key: &str,
        result: DeviceActionResult,
    ) -> Result<ResolveOutcome, StoreError> {
        let entry = self.entry(plan_id)?;
        let mut guard = self.lock_live(&entry, plan_id)?;

        if let Some(previous) = guard.resolved.get(action_id) {
            if previous.idempotency_key == idempotency_key {
                return Ok(ResolveOutcome::AlreadyResolved {
                    previous: previous.clone(),
                });
            }
            return Ok(ResolveOutcome::Unknown);
        }

        let matches = guard
            .outstanding
            .get(action_id)
            .map(|action| action.idempotency_key == idempotency_key)
            .unwrap_or(false);
        if !matches {
            return Ok(ResolveOutcome::Unknown);
        }

        guard.outstanding.remove(action_id);
        guard.resolved.insert(action_id.to_string(), result);
        Ok(ResolveOutcome::Applied)
    }

    async fn outstanding_count(&self, plan_id: &PlanId) -> Result<usize, StoreError> {
        let entry = self.entry(plan_id)?;
        let guard = self.lock_live(&entry, plan_id)?;
        Ok(guard.outstanding.len())
    }

    async fn resolved_results(
        &self,
        plan_id: &PlanId,
    ) -> Result<Vec<DeviceActionResult>, StoreError> {
        let entry = self.entry(plan_id)?;
        let guard = self.lock_live(&entry, plan_id)?;
        Ok(guard.resolved.values().cloned().collect())
    }

    async fn expire(&self, plan_id: &PlanId) -> Result<bool, StoreError> {
        let mut plans = self
            .plans
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(plans.remove(plan_id.as_str()).is_some())
    }

    async fn purge_expired(&self) -> Result<usize, StoreError> {
        let mut plans = self
            .plans
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        let before = plans.len();
        plans.retain(|_, entry| {
            entry
                .lock()
                .map(|guard| !guard.is_expired(self.ttl))
                .unwrap_or(false)
        });
        let dropped = before - plans.len();
        if dropped > 0 {
            info!(dropped, "purged expired plans");
        }
        Ok(dropped)
    }
}
