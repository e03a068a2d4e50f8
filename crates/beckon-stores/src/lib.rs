//! # Beckon Stores
//!
//! Minimal store implementations for the Beckon pipeline.
//!
//! This crate provides:
//! - InMemory PlanStore (TTL-bounded, per-plan serialization)
//! - InMemory SessionStore (trimmed conversation history)
//! - InMemory AuditStore (append-only execution journal)

mod audit_store;
mod plan_store;
mod session_store;

pub use audit_store::{AuditEntry, AuditStatus, AuditStore, InMemoryAuditStore};
pub use plan_store::InMemoryPlanStore;
pub use session_store::{InMemorySessionStore, SessionStore};

// Re-export core traits for convenience
pub use beckon_core::store::{PlanStore, ResolveOutcome, StoreError};
