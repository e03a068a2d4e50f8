//! Planner construction from configuration.

use std::sync::Arc;

use tracing::info;

use beckon_config::PlannerConfig;
use beckon_core::tool::ToolRegistry;

use crate::llm::{HttpLlmClient, HttpLlmClientConfig, LlmError, LlmPlanner, LlmPlannerConfig};

/// Build an HTTP-backed LLM planner from the planner config section.
///
/// The API key is read from the environment variable the config names; when
/// unset, requests go out without an Authorization header (local gateways).
pub fn planner_from_config(
    config: &PlannerConfig,
    registry: Arc<ToolRegistry>,
) -> Result<LlmPlanner<HttpLlmClient>, LlmError> {
    let api_key = std::env::var(&config.api_key_env)
        .ok()
        .filter(|v| !v.trim().is_empty());
    if api_key.is_none() {
        info!(env = %config.api_key_env, "no API key in environment, sending unauthenticated requests");
    }

    let client = HttpLlmClient::new(HttpLlmClientConfig {
        endpoint: config.endpoint.clone(),
        api_key,
        timeout_secs: config.timeout_secs,
    })?;

    Ok(LlmPlanner::new(
        client,
        LlmPlannerConfig {
            model: config.model.clone(),
            temperature: config.temperature,
            max_history: config.max_history,
            ..LlmPlannerConfig::default()
        },
        registry,
    ))
}
