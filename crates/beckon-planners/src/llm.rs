use std::fmt::Write;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use beckon_core::planner::{ConversationContext, PlanError, PlanOutcome, Planner};
use beckon_core::tool::{validate_args, ToolRegistry, ToolSpec};
use beckon_core::types::{ActionPlan, ActionStep, RiskLevel};

const MAX_PROMPT_LOG_CHARS: usize = 4_000;
const MAX_LLM_OUTPUT_LOG_CHARS: usize = 8_000;

/// LLM request payload
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub system: String,
    pub user: String,
    pub model: String,
    pub temperature: f32,
}

/// LLM client trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: LlmRequest) -> Result<String, LlmError>;
}

/// LLM errors
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("http error: {0}")]
    Http(String),
    #[error("response error: {0}")]
    Response(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Planner config for LLM
#[derive(Debug, Clone)]
pub struct LlmPlannerConfig {
    pub model: String,
    pub temperature: f32,
    pub max_history: usize,
    pub system_prompt: String,
}

impl Default for LlmPlannerConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            max_history: 20,
            system_prompt: "You are Beckon, a voice assistant that turns user requests into \
                            tool-call plans. Plan actions whenever a tool can fulfill the \
                            request; reply with text only for genuine small talk."
                .to_string(),
        }
    }
}

/// LLM-based planner
pub struct LlmPlanner<C: LlmClient> {
    pub client: C,
    pub config: LlmPlannerConfig,
    registry: Arc<ToolRegistry>,
}

impl<C: LlmClient> LlmPlanner<C> {
    pub fn new(client: C, config: LlmPlannerConfig, registry: Arc<ToolRegistry>) -> Self {
        Self {
            client,
            config,
            registry,
        }
    }

    fn build_prompt(&self, transcript: &str, context: &ConversationContext) -> (String, String) {
        let system = build_system_prompt(&self.config.system_prompt, &self.registry, context);

        let mut user = String::new();
        if !context.history.is_empty() {
            user.push_str("History:\n");
            for item in context
                .history
                .iter()
                .rev()
                .take(self.config.max_history)
                .rev()
            {
                let _ = writeln!(user, "- {}: {}", item.role, item.content);
            }
            user.push('\n');
        }
        let _ = writeln!(user, "Transcript:\n{}\n", transcript);

        user.push_str("Return a JSON object with shape:\n");
        user.push_str(
            r#"{"user_intent":"...","steps":[{"tool_name":"...","args":{},"risk_level":"low"}],"reply":"..."}"#,
        );
        user.push('\n');
        user.push_str(
            "Use only tool names listed in the Tool Catalog. If you need more information, \
             return {\"clarification\":\"<question>\"} instead. Return JSON only.\n",
        );

        (system, user)
    }
}

fn build_system_prompt(
    base: &str,
    registry: &ToolRegistry,
    context: &ConversationContext,
) -> String {
    let mut system = String::new();
    system.push_str(base.trim());

    system.push_str("\n\nSkills:\n");
    if registry.skills().is_empty() {
        system.push_str("- (no skills loaded)\n");
    }
    for skill in registry.skills() {
        let _ = writeln!(system, "- **{}**: {}", skill.display_name, skill.description);
    }

    system.push_str("\nCurrent context:\n");
    let _ = writeln!(
        system,
        "- Current UTC time: {}",
        Utc::now().format("%A, %B %d, %Y at %H:%M")
    );
    let _ = writeln!(
        system,
        "- User timezone: {} (resolve relative dates like \"tomorrow at 2pm\" in this timezone)",
        context.timezone
    );
    let _ = writeln!(system, "- Locale: {}", context.locale);
    let providers = if context.linked_providers.is_empty() {
        "none".to_string()
    } else {
        context.linked_providers.join(", ")
    };
    let _ = writeln!(system, "- Linked providers: {}", providers);

    system.push_str("\nPlanning rules:\n");
    let mut rules: Vec<String> = vec![
        "Return ONLY one valid JSON object matching the required plan shape.".to_string(),
        "steps execute in the order you list them.".to_string(),
        "step.args must satisfy the selected tool's input fields.".to_string(),
        "Use ISO-8601 datetimes; relative dates resolve from the current time above.".to_string(),
        "Do not invent tool names not listed in the Tool Catalog.".to_string(),
        "If the request is missing required information, return a clarification instead of guessing.".to_string(),
    ];
    for skill in registry.skills() {
        rules.extend(skill.planner_instructions.iter().cloned());
    }
    rules.push("When in doubt, plan the closest matching tool rather than replying with text.".to_string());
    for (i, rule) in rules.iter().enumerate() {
        let _ = writeln!(system, "{}. {}", i + 1, rule);
    }

    system.push_str("\nTool Catalog:\n");
    for spec in registry.specs() {
        append_catalog_entry(&mut system, spec);
    }
    system
}

fn append_catalog_entry(buf: &mut String, spec: &ToolSpec) {
    let _ = writeln!(buf, "- name: {}", spec.name);
    let _ = writeln!(buf, "  description: {}", spec.description);
    let _ = writeln!(buf, "  target: {:?}", spec.execution_target);
    let _ = writeln!(buf, "  risk: {:?}", spec.default_risk);
    append_schema_fields(buf, &spec.parameters);
}

fn append_schema_fields(buf: &mut String, schema: &Value) {
    let Some(properties) = schema.get("properties").and_then(|v| v.as_object()) else {
        let _ = writeln!(buf, "  input_fields: []");
        return;
    };

    let required: Vec<&str> = schema
        .get("required")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    let mut keys: Vec<&str> = properties.keys().map(String::as_str).collect();
    keys.sort_unstable();

    let _ = writeln!(buf, "  input_fields:");
    for key in keys {
        let Some(field_schema) = properties.get(key) else {
            continue;
        };
        let type_hint = field_schema
            .get("type")
            .and_then(|v| v.as_str())
            .unwrap_or("any");
        let required_label = if required.contains(&key) {
            "required"
        } else {
            "optional"
        };
        match field_schema.get("description").and_then(|v| v.as_str()) {
            Some(desc) => {
                let _ = writeln!(buf, "    - {} ({}, {}): {}", key, type_hint, required_label, desc);
            }
            None => {
                let _ = writeln!(buf, "    - {} ({}, {})", key, type_hint, required_label);
            }
        }
    }
}

fn truncate_for_log(input: &str, max_chars: usize) -> String {
    let char_count = input.chars().count();
    if char_count <= max_chars {
        return input.to_string();
    }
    let mut preview: String = input.chars().take(max_chars).collect();
    preview.push_str(&format!("... [truncated, total_chars={}]", char_count));
    preview
}

/// Raw plan shape the model is asked to emit.
#[derive(Debug, Deserialize)]
struct PlanDraft {
    #[serde(default)]
    user_intent: Option<String>,
    #[serde(default)]
    steps: Vec<StepDraft>,
    #[serde(default)]
    reply: Option<String>,
    #[serde(default)]
    clarification: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StepDraft {
    tool_name: String,
    #[serde(default)]
    args: Value,
    #[serde(default)]
    risk_level: RiskLevel,
}

#[async_trait]
impl<C: LlmClient> Planner for LlmPlanner<C> {
    async fn plan(
        &self,
        transcript: &str,
        context: &ConversationContext,
    ) -> Result<PlanOutcome, PlanError> {
        let (system, user) = self.build_prompt(transcript, context);
        info!(
            model = %self.config.model,
            temperature = self.config.temperature,
            transcript_len = transcript.len(),
            tool_count = self.registry.len(),
            history_count = context.history.len(),
            "planner request prepared"
        );
        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(
                system_prompt = %truncate_for_log(&system, MAX_PROMPT_LOG_CHARS),
                user_prompt = %truncate_for_log(&user, MAX_PROMPT_LOG_CHARS),
                "planner prompts"
            );
        }

        let request = LlmRequest {
            system,
            user,
            model: self.config.model.clone(),
            temperature: self.config.temperature,
        };
        let output = self
            .client
            .complete(request)
            .await
            .map_err(|e| PlanError::LlmUnavailable(e.to_string()))?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(
                llm_output = %truncate_for_log(&output, MAX_LLM_OUTPUT_LOG_CHARS),
                "planner raw llm output"
            );
        }

        let Some(json_str) = extract_json(&output) else {
            // Plain text with no JSON is a conversational reply.
            let text = output.trim();
            if text.is_empty() {
                return Err(PlanError::AmbiguousIntent(
                    "model returned an empty response".to_string(),
                ));
            }
            return Ok(PlanOutcome::Reply {
                text: text.to_string(),
            });
        };

        let draft: PlanDraft = serde_json::from_str(&json_str).map_err(|e| {
            PlanError::AmbiguousIntent(format!("model returned malformed plan JSON: {}", e))
        })?;

        if let Some(question) = draft.clarification {
            info!(question = %question, "planner needs clarification");
            return Ok(PlanOutcome::Clarification { question });
        }

        if draft.steps.is_empty() {
            let text = draft
                .reply
                .or(draft.user_intent)
                .unwrap_or_else(|| "Okay.".to_string());
            return Ok(PlanOutcome::Reply { text });
        }

        let user_intent = draft
            .user_intent
            .unwrap_or_else(|| transcript.to_string());
        let mut plan = ActionPlan::new(user_intent)
            .with_context(context.timezone.clone(), context.locale.clone());

        for step in draft.steps {
            let tool = self
                .registry
                .get(&step.tool_name)
                .ok_or_else(|| PlanError::UnknownTool(step.tool_name.clone()))?;
            let spec = tool.spec();

            validate_args(&spec.parameters, &step.args).map_err(|reason| {
                PlanError::SchemaMismatch {
                    tool: step.tool_name.clone(),
                    reason,
                }
            })?;

            plan.push_step(
                ActionStep::new(step.tool_name, step.args)
                    .with_risk(step.risk_level)
                    .with_target(spec.execution_target),
            );
        }

        info!(
            plan_id = %plan.plan_id,
            step_count = plan.steps.len(),
            max_risk = ?plan.max_risk(),
            "planner produced plan"
        );
        Ok(PlanOutcome::Plan(plan))
    }
}

/// Mock LLM client for tests/examples
pub struct MockLlmClient {
    pub response: String,
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, _request: LlmRequest) -> Result<String, LlmError> {
        Ok(self.response.clone())
    }
}

/// HTTP client config (OpenAI-compatible)
#[derive(Debug, Clone)]
pub struct HttpLlmClientConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for HttpLlmClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

/// HTTP LLM client using an OpenAI-compatible API
pub struct HttpLlmClient {
    client: reqwest::Client,
    config: HttpLlmClientConfig,
}

impl HttpLlmClient {
    pub fn new(config: HttpLlmClientConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Http(e.to_string()))?;
        Ok(Self { client, config })
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: String,
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, request: LlmRequest) -> Result<String, LlmError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = &self.config.api_key {
            let value = format!("Bearer {}", key);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&value).map_err(|e| LlmError::Http(e.to_string()))?,
            );
        }

        let body = ChatRequest {
            model: request.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: request.system,
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.user,
                },
            ],
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::Response(format!("HTTP {}: {}", status, text)));
        }

        let text = response
            .text()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;
        let parsed: ChatResponse =
            serde_json::from_str(&text).map_err(|e| LlmError::Serialization(e.to_string()))?;

        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| LlmError::Response("Missing choices".to_string()))?;

        Ok(content)
    }
}

fn extract_json(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(text[start..=end].to_string())
}
