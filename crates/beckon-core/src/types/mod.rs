//! Core type definitions for Beckon
//!
//! This module contains the fundamental types used throughout the system:
//! - ActionPlan: ordered list of tool invocations for one user command
//! - ActionStep: a single planned tool call
//! - DeviceAction / DeviceActionResult: the device-delegation contract
//! - RiskLevel / ExecutionTarget: catalog annotations driving gating and
//!   dispatch

mod device;
mod plan;

pub use device::{DeviceAction, DeviceActionResult, VerificationOutcome};
pub use plan::{
    derive_idempotency_key, ActionPlan, ActionStep, ExecutionTarget, PlanId, RiskLevel,
};
