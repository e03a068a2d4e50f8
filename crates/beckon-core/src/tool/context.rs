//! ToolContext type definition

/// Runtime context passed to every tool invocation.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Session or user key this invocation runs on behalf of
    pub user_id: String,
    /// IANA timezone name, e.g. "America/New_York"
    pub timezone: String,
    /// BCP-47 locale, e.g. "en-US"
    pub locale: String,
    /// Providers the user has linked, e.g. "google_calendar"
    pub linked_providers: Vec<String>,
}

impl ToolContext {
    /// Create a context with default timezone and locale.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            timezone: "UTC".to_string(),
            locale: "en-US".to_string(),
            linked_providers: Vec::new(),
        }
    }

    /// Set timezone and locale.
    pub fn with_context(mut self, timezone: impl Into<String>, locale: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self.locale = locale.into();
        self
    }

    /// Set linked providers.
    pub fn with_providers(mut self, providers: Vec<String>) -> Self {
        self.linked_providers = providers;
        self
    }
}
