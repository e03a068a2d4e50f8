//! Device-side tool descriptors.
//!
//! These tools never execute on the server; they exist in the catalog so
//! the planner can select them, and the executor delegates them to the
//! client as DeviceActions. Invoking one server-side is an error.

use async_trait::async_trait;
use serde_json::{json, Value};

use beckon_core::tool::{Tool, ToolContext, ToolError, ToolSpec};
use beckon_core::types::{ExecutionTarget, RiskLevel};

/// A catalog-only tool delegated to the client device.
pub struct DeviceTool {
    spec: ToolSpec,
}

impl DeviceTool {
    pub fn new(spec: ToolSpec) -> Self {
        Self {
            spec: spec.with_target(ExecutionTarget::Device),
        }
    }
}

#[async_trait]
impl Tool for DeviceTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn invoke(&self, _args: &Value, _ctx: &ToolContext) -> Result<Value, ToolError> {
        Err(ToolError::DeviceOnly(self.spec.name.clone()))
    }
}

/// All builtin device tool descriptors.
pub fn device_tools() -> Vec<DeviceTool> {
    vec![
        // EventKit (on-device calendar)
        DeviceTool::new(
            ToolSpec::new(
                "ios_eventkit.create_event",
                "Create an event in the device's local calendar.",
            )
            .with_parameters(json!({
                "type": "object",
                "properties": {
                    "title": {"type": "string"},
                    "start": {"type": "string", "format": "date-time"},
                    "end": {"type": "string", "format": "date-time"},
                    "location": {"type": "string"},
                    "notes": {"type": "string"}
                },
                "required": ["title", "start", "end"]
            })),
        ),
        DeviceTool::new(
            ToolSpec::new(
                "ios_eventkit.list_events",
                "List events from the device's local calendar between two datetimes.",
            )
            .with_parameters(json!({
                "type": "object",
                "properties": {
                    "start": {"type": "string", "format": "date-time"},
                    "end": {"type": "string", "format": "date-time"}
                },
                "required": ["start", "end"]
            })),
        ),
        DeviceTool::new(
            ToolSpec::new(
                "ios_eventkit.update_event",
                "Update fields of an event in the device's local calendar.",
            )
            .with_parameters(json!({
                "type": "object",
                "properties": {
                    "event_identifier": {"type": "string"},
                    "patch_fields": {"type": "object"}
                },
                "required": ["event_identifier", "patch_fields"]
            })),
        ),
        DeviceTool::new(
            ToolSpec::new(
                "ios_eventkit.delete_event",
                "Permanently delete an event from the device's local calendar.",
            )
            .with_risk(RiskLevel::High)
            .irreversible()
            .with_parameters(json!({
                "type": "object",
                "properties": {
                    "event_identifier": {"type": "string"}
                },
                "required": ["event_identifier"]
            })),
        ),
        // Reminders
        DeviceTool::new(
            ToolSpec::new(
                "ios_reminders.list_reminders",
                "List reminders from the user's device, optionally filtered by list name or completion status.",
            )
            .with_parameters(json!({
                "type": "object",
                "properties": {
                    "list_name": {"type": "string", "description": "Filter to a specific reminder list"},
                    "include_completed": {"type": "boolean", "description": "Include completed reminders (default false)"}
                },
                "required": []
            })),
        ),
        DeviceTool::new(
            ToolSpec::new(
                "ios_reminders.create_reminder",
                "Create a new reminder on the user's device with optional due date and priority.",
            )
            .with_parameters(json!({
                "type": "object",
                "properties": {
                    "title": {"type": "string"},
                    "due_date": {"type": "string", "format": "date-time", "description": "ISO-8601 due date"},
                    "priority": {"type": "integer", "description": "1=high, 5=medium, 9=low, 0=none"},
                    "notes": {"type": "string"},
                    "list_name": {"type": "string", "description": "Which reminder list to add to"}
                },
                "required": ["title"]
            })),
        ),
        DeviceTool::new(
            ToolSpec::new(
                "ios_reminders.complete_reminder",
                "Mark a reminder as completed on the user's device.",
            )
            .with_parameters(json!({
                "type": "object",
                "properties": {
                    "reminder_id": {"type": "string"}
                },
                "required": ["reminder_id"]
            })),
        ),
        DeviceTool::new(
            ToolSpec::new(
                "ios_reminders.delete_reminder",
                "Delete a reminder from the user's device.",
            )
            .with_risk(RiskLevel::Medium)
            .irreversible()
            .with_parameters(json!({
                "type": "object",
                "properties": {
                    "reminder_id": {"type": "string"}
                },
                "required": ["reminder_id"]
            })),
        ),
        // Notifications
        DeviceTool::new(
            ToolSpec::new(
                "ios_notifications.schedule_notification",
                "Schedule a local notification on the user's device.",
            )
            .with_parameters(json!({
                "type": "object",
                "properties": {
                    "title": {"type": "string"},
                    "body": {"type": "string"},
                    "fire_date": {"type": "string", "format": "date-time"}
                },
                "required": ["title", "fire_date"]
            })),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_device_tool_refuses_server_invocation() {
        let tool = DeviceTool::new(ToolSpec::new("ios_reminders.create_reminder", "test"));
        let err = tool
            .invoke(&json!({"title": "x"}), &ToolContext::new("u1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::DeviceOnly(_)));
        assert_eq!(tool.spec().execution_target, ExecutionTarget::Device);
    }

    #[test]
    fn test_builtin_device_tools_all_target_device() {
        let tools = device_tools();
        assert!(!tools.is_empty());
        for tool in &tools {
            assert_eq!(tool.spec().execution_target, ExecutionTarget::Device);
        }
    }

    #[test]
    fn test_eventkit_delete_is_gated() {
        let tools = device_tools();
        let delete = tools
            .iter()
            .find(|t| t.spec().name == "ios_eventkit.delete_event")
            .expect("eventkit delete registered");
        assert_eq!(delete.spec().default_risk, RiskLevel::High);
        assert!(delete.spec().irreversible);
    }
}
