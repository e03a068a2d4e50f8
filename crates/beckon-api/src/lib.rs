//! # Beckon API
//!
//! DTOs, errors and the CommandApi service that wires the pipeline
//! together: planner → policy gate → plan store → executor → reconciler.

mod dto;
mod error;
mod service;

pub use dto::{
    Attachment, CommandRequest, CommandResponse, ConfirmRequest, DeviceResultRequest,
    DeviceResultResponse,
};
pub use error::{ApiError, ErrorCode};
pub use service::{CommandApi, CommandService};
