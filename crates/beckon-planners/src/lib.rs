//! # Beckon Planners
//!
//! LLM-backed planner implementations. The planner builds a system prompt
//! from the tool catalog, asks the model for a JSON plan, and validates the
//! result fail-closed against the registry before anything executes.

mod factory;
mod llm;

pub use factory::planner_from_config;
pub use llm::{
    HttpLlmClient, HttpLlmClientConfig, LlmClient, LlmError, LlmPlanner, LlmPlannerConfig,
    LlmRequest, MockLlmClient,
};
