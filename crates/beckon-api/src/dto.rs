use serde::{Deserialize, Serialize};

use beckon_core::reconciler::ReconciliationReport;
use beckon_core::types::{ActionPlan, DeviceAction, DeviceActionResult, PlanId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    /// Client session key binding conversation history; omitted means a
    /// fresh anonymous session.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Speech-to-text transcript
    pub transcript: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_locale")]
    pub locale: String,
    /// Linked calendar providers, e.g. google_calendar, ios_eventkit
    #[serde(default = "default_providers")]
    pub linked_providers: Vec<String>,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_locale() -> String {
    "en-US".to_string()
}

fn default_providers() -> Vec<String> {
    vec!["google_calendar".to_string()]
}

/// A file produced by a step and returned with the response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub filename: String,
    pub mime_type: String,
    pub url: String,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    pub spoken_response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_plan: Option<ActionPlan>,
    #[serde(default)]
    pub device_actions: Vec<DeviceAction>,
    #[serde(default)]
    pub requires_confirmation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<PlanId>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Set when a step changed the user's stored name mid-conversation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_user_name: Option<String>,
}

impl CommandResponse {
    /// A plain text reply with no plan attached.
    pub fn spoken(text: impl Into<String>) -> Self {
        Self {
            spoken_response: text.into(),
            action_plan: None,
            device_actions: Vec::new(),
            requires_confirmation: false,
            confirmation_prompt: None,
            plan_id: None,
            attachments: Vec::new(),
            updated_user_name: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmRequest {
    pub plan_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceResultRequest {
    pub plan_id: String,
    pub results: Vec<DeviceActionResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceResultResponse {
    /// "reconciled" once every device action has a result, "accepted" while
    /// some remain outstanding, "partial_failure" when entries were
    /// rejected or the device reported errors.
    pub status: String,
    pub report: ReconciliationReport,
}
