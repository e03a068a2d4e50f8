//! Default tool catalog assembly.
//!
//! Builds the process-wide registry: server calendar tools over the given
//! backend, the device tool descriptors, and the skill manifests that feed
//! the planner's system prompt.

use std::sync::Arc;

use tracing::info;

use beckon_core::tool::{SkillManifest, ToolRegistry};

use crate::calendar::{
    CalendarBackend, CreateEventTool, DeleteEventTool, ListEventsTool, UpdateEventTool,
};
use crate::device::device_tools;

/// Build the default registry over a calendar backend.
pub fn default_registry(calendar: Arc<dyn CalendarBackend>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(Arc::new(CreateEventTool::new(calendar.clone())));
    registry.register(Arc::new(ListEventsTool::new(calendar.clone())));
    registry.register(Arc::new(UpdateEventTool::new(calendar.clone())));
    registry.register(Arc::new(DeleteEventTool::new(calendar)));

    for tool in device_tools() {
        registry.register(Arc::new(tool));
    }

    registry.register_skill(
        SkillManifest::new(
            "calendar",
            "Calendar",
            "Create, list, update and delete calendar events.",
        )
        .with_instructions(vec![
            "Use google_calendar tools when the user has linked google_calendar; use ios_eventkit tools otherwise.".to_string(),
            "Never guess an event_id; list events first when the user refers to an event by time or title.".to_string(),
        ]),
    );
    registry.register_skill(
        SkillManifest::new(
            "reminders",
            "Reminders",
            "Create, complete and delete reminders on the user's device.",
        )
        .with_instructions(vec![
            "Reminders always run on the device; plan them even without linked providers.".to_string(),
        ]),
    );
    registry.register_skill(SkillManifest::new(
        "notifications",
        "Notifications",
        "Schedule local notifications on the user's device.",
    ));

    info!(
        tool_count = registry.len(),
        skill_count = registry.skills().len(),
        "default tool catalog loaded"
    );
    registry
}
