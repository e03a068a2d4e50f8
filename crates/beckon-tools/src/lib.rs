//! # Beckon Tools
//!
//! Builtin tool implementations and the default catalog:
//! - server-side calendar tools over a pluggable CalendarBackend
//! - device-side tool descriptors (EventKit, Reminders, Notifications)
//! - skill manifests feeding the planner's system prompt

mod calendar;
mod catalog;
mod device;

pub use calendar::{
    CalendarBackend, CalendarEvent, CreateEventTool, DeleteEventTool, InMemoryCalendarBackend,
    ListEventsTool, UpdateEventTool,
};
pub use catalog::default_registry;
pub use device::{device_tools, DeviceTool};
