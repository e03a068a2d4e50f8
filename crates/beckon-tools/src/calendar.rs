//! Server-side calendar tools.
//!
//! The tools speak to a CalendarBackend trait; the production backend wraps
//! the provider's API and lives outside this crate. The in-memory backend
//! here serves development and tests.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use beckon_core::tool::{Tool, ToolContext, ToolError, ToolSpec};
use beckon_core::types::{RiskLevel, VerificationOutcome};

/// A calendar event as the backend stores it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub event_id: String,
    pub title: String,
    /// ISO-8601 start datetime
    pub start: String,
    /// ISO-8601 end datetime
    pub end: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub attendees: Vec<String>,
}

/// Calendar storage seam. Implementations may call a provider API or hold
/// events in memory.
#[async_trait]
pub trait CalendarBackend: Send + Sync {
    async fn create_event(&self, event: CalendarEvent) -> Result<CalendarEvent, ToolError>;
    async fn get_event(&self, event_id: &str) -> Result<Option<CalendarEvent>, ToolError>;
    /// Events whose start falls in [time_min, time_max], ordered by start.
    async fn list_events(
        &self,
        time_min: &str,
        time_max: &str,
    ) -> Result<Vec<CalendarEvent>, ToolError>;
    async fn update_event(
        &self,
        event_id: &str,
        patch_fields: &Value,
    ) -> Result<CalendarEvent, ToolError>;
    async fn delete_event(&self, event_id: &str) -> Result<bool, ToolError>;
}

/// In-memory backend for development and testing.
pub struct InMemoryCalendarBackend {
    events: RwLock<HashMap<String, CalendarEvent>>,
}

impl InMemoryCalendarBackend {
    pub fn new() -> Self {
        Self {
            events: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryCalendarBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CalendarBackend for InMemoryCalendarBackend {
    async fn create_event(&self, mut event: CalendarEvent) -> Result<CalendarEvent, ToolError> {
        if event.event_id.is_empty() {
            event.event_id = uuid::Uuid::new_v4().simple().to_string();
        }
        let mut events = self
            .events
            .write()
            .map_err(|e| ToolError::Execution(e.to_string()))?;
        events.insert(event.event_id.clone(), event.clone());
        Ok(event)
    }

    async fn get_event(&self, event_id: &str) -> Result<Option<CalendarEvent>, ToolError> {
        let events = self
            .events
            .read()
            .map_err(|e| ToolError::Execution(e.to_string()))?;
        Ok(events.get(event_id).cloned())
    }

    async fn list_events(
        &self,
        time_min: &str,
        time_max: &str,
    ) -> Result<Vec<CalendarEvent>, ToolError> {
        let events = self
            .events
            .read()
            .map_err(|e| ToolError::Execution(e.to_string()))?;
        // ISO-8601 datetimes compare correctly as strings.
        let mut matching: Vec<CalendarEvent> = events
            .values()
            .filter(|e| e.start.as_str() >= time_min && e.start.as_str() <= time_max)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.start.cmp(&b.start));
        Ok(matching)
    }

    async fn update_event(
        &self,
        event_id: &str,
        patch_fields: &Value,
    ) -> Result<CalendarEvent, ToolError> {
        let mut events = self
            .events
            .write()
            .map_err(|e| ToolError::Execution(e.to_string()))?;
        let event = events
            .get_mut(event_id)
            .ok_or_else(|| ToolError::Execution(format!("no such event: {}", event_id)))?;

        if let Some(title) = patch_fields.get("title").and_then(|v| v.as_str()) {
            event.title = title.to_string();
        }
        if let Some(start) = patch_fields.get("start").and_then(|v| v.as_str()) {
            event.start = start.to_string();
        }
        if let Some(end) = patch_fields.get("end").and_then(|v| v.as_str()) {
            event.end = end.to_string();
        }
        if let Some(location) = patch_fields.get("location").and_then(|v| v.as_str()) {
            event.location = Some(location.to_string());
        }
        if let Some(attendees) = patch_fields.get("attendees").and_then(|v| v.as_array()) {
            event.attendees = attendees
                .iter()
                .filter_map(|v| v.as_str().map(ToString::to_string))
                .collect();
        }
        Ok(event.clone())
    }

    async fn delete_event(&self, event_id: &str) -> Result<bool, ToolError> {
        let mut events = self
            .events
            .write()
            .map_err(|e| ToolError::Execution(e.to_string()))?;
        Ok(events.remove(event_id).is_some())
    }
}

fn arg_str(args: &Value, key: &str) -> Result<String, ToolError> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(ToString::to_string)
        .ok_or_else(|| ToolError::InvalidArguments(format!("missing string field '{}'", key)))
}

fn arg_str_opt(args: &Value, key: &str) -> Option<String> {
    args.get(key).and_then(|v| v.as_str()).map(ToString::to_string)
}

fn arg_str_list(args: &Value, key: &str) -> Vec<String> {
    args.get(key)
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(ToString::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Create a calendar event.
pub struct CreateEventTool {
    spec: ToolSpec,
    backend: Arc<dyn CalendarBackend>,
}

impl CreateEventTool {
    pub fn new(backend: Arc<dyn CalendarBackend>) -> Self {
        let spec = ToolSpec::new(
            "google_calendar.create_event",
            "Create a calendar event with a title, start and end time, and optional attendees.",
        )
        .with_parameters(json!({
            "type": "object",
            "properties": {
                "title": {"type": "string", "description": "Event title"},
                "start": {"type": "string", "format": "date-time", "description": "ISO-8601 start"},
                "end": {"type": "string", "format": "date-time", "description": "ISO-8601 end"},
                "location": {"type": "string"},
                "attendees": {"type": "array", "description": "Attendee email addresses"},
                "send_updates": {"type": "string", "description": "all, externalOnly or none"}
            },
            "required": ["title", "start", "end"]
        }));
        Self { spec, backend }
    }
}

#[async_trait]
impl Tool for CreateEventTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn invoke(&self, args: &Value, _ctx: &ToolContext) -> Result<Value, ToolError> {
        let event = CalendarEvent {
            event_id: String::new(),
            title: arg_str(args, "title")?,
            start: arg_str(args, "start")?,
            end: arg_str(args, "end")?,
            location: arg_str_opt(args, "location"),
            attendees: arg_str_list(args, "attendees"),
        };
        let created = self.backend.create_event(event).await?;
        Ok(json!({
            "event_id": created.event_id,
            "event": created,
        }))
    }

    async fn verify(
        &self,
        args: &Value,
        result: &Value,
        _ctx: &ToolContext,
    ) -> VerificationOutcome {
        let Some(event_id) = result.get("event_id").and_then(|v| v.as_str()) else {
            return VerificationOutcome::mismatch(vec!["result carries no event_id".to_string()]);
        };
        let stored = match self.backend.get_event(event_id).await {
            Ok(Some(event)) => event,
            Ok(None) => {
                return VerificationOutcome::mismatch(vec![format!(
                    "event {} not found on read-back",
                    event_id
                )])
            }
            Err(err) => return VerificationOutcome::mismatch(vec![err.to_string()]),
        };

        let mut discrepancies = Vec::new();
        if let Some(title) = args.get("title").and_then(|v| v.as_str()) {
            if stored.title != title {
                discrepancies.push(format!(
                    "title mismatch: requested '{}', stored '{}'",
                    title, stored.title
                ));
            }
        }
        if discrepancies.is_empty() {
            VerificationOutcome::ok()
        } else {
            VerificationOutcome::mismatch(discrepancies)
        }
    }
}

/// List calendar events in a time range.
pub struct ListEventsTool {
    spec: ToolSpec,
    backend: Arc<dyn CalendarBackend>,
}

impl ListEventsTool {
    pub fn new(backend: Arc<dyn CalendarBackend>) -> Self {
        let spec = ToolSpec::new(
            "google_calendar.list_events",
            "List calendar events between two ISO-8601 datetimes.",
        )
        .with_parameters(json!({
            "type": "object",
            "properties": {
                "time_min": {"type": "string", "format": "date-time"},
                "time_max": {"type": "string", "format": "date-time"}
            },
            "required": ["time_min", "time_max"]
        }));
        Self { spec, backend }
    }
}

#[async_trait]
impl Tool for ListEventsTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn invoke(&self, args: &Value, _ctx: &ToolContext) -> Result<Value, ToolError> {
        let time_min = arg_str(args, "time_min")?;
        let time_max = arg_str(args, "time_max")?;
        let events = self.backend.list_events(&time_min, &time_max).await?;
        Ok(json!({
            "count": events.len(),
            "events": events,
        }))
    }
}

/// Update fields of an existing calendar event.
pub struct UpdateEventTool {
    spec: ToolSpec,
    backend: Arc<dyn CalendarBackend>,
}

impl UpdateEventTool {
    pub fn new(backend: Arc<dyn CalendarBackend>) -> Self {
        let spec = ToolSpec::new(
            "google_calendar.update_event",
            "Update fields of an existing calendar event.",
        )
        .with_parameters(json!({
            "type": "object",
            "properties": {
                "event_id": {"type": "string"},
                "patch_fields": {"type": "object", "description": "Fields to change"},
                "send_updates": {"type": "string", "description": "all, externalOnly or none"}
            },
            "required": ["event_id", "patch_fields"]
        }));
        Self { spec, backend }
    }
}

#[async_trait]
impl Tool for UpdateEventTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn invoke(&self, args: &Value, _ctx: &ToolContext) -> Result<Value, ToolError> {
        let event_id = arg_str(args, "event_id")?;
        let patch_fields = args
            .get("patch_fields")
            .cloned()
            .ok_or_else(|| ToolError::InvalidArguments("missing 'patch_fields'".to_string()))?;
        let updated = self.backend.update_event(&event_id, &patch_fields).await?;
        Ok(json!({
            "event_id": updated.event_id,
            "event": updated,
        }))
    }
}

/// Delete a calendar event. Irreversible; the policy gate forces
/// confirmation.
pub struct DeleteEventTool {
    spec: ToolSpec,
    backend: Arc<dyn CalendarBackend>,
}

impl DeleteEventTool {
    pub fn new(backend: Arc<dyn CalendarBackend>) -> Self {
        let spec = ToolSpec::new(
            "google_calendar.delete_event",
            "Permanently delete a calendar event.",
        )
        .with_risk(RiskLevel::High)
        .irreversible()
        .with_parameters(json!({
            "type": "object",
            "properties": {
                "event_id": {"type": "string"}
            },
            "required": ["event_id"]
        }));
        Self { spec, backend }
    }
}

#[async_trait]
impl Tool for DeleteEventTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn invoke(&self, args: &Value, _ctx: &ToolContext) -> Result<Value, ToolError> {
        let event_id = arg_str(args, "event_id")?;
        let deleted = self.backend.delete_event(&event_id).await?;
        if !deleted {
            return Err(ToolError::Execution(format!("no such event: {}", event_id)));
        }
        Ok(json!({"deleted": true, "event_id": event_id}))
    }
}
