use std::fmt;

use crate::commands::CommandId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusIcon {
    Pulse,
    Refresh,
    Globe,
    Smiley,
}

impl StatusIcon {
    pub fn codicon(&self) -> &'static str {
        match self {
            StatusIcon::Pulse => "$(pulse)",
            StatusIcon::Refresh => "$(search-refresh)",
            StatusIcon::Globe => "$(globe)",
            StatusIcon::Smiley => "$(smiley)",
        }
    }
}

/// Content of the host's status bar entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusItem {
    pub icon: StatusIcon,
    pub text: String,
    pub tooltip: Option<String>,
    pub command: Option<CommandId>,
}

impl StatusItem {
    pub fn connecting() -> Self {
        Self {
            icon: StatusIcon::Pulse,
            text: "Connecting to Discord Gateway...".to_string(),
            tooltip: Some("Connecting to Discord Gateway...".to_string()),
            command: None,
        }
    }

    pub fn connected() -> Self {
        Self {
            icon: StatusIcon::Globe,
            text: "Connected to Discord".to_string(),
            tooltip: Some("Connected to Discord".to_string()),
            command: None,
        }
    }

    pub fn reconnect() -> Self {
        Self {
            icon: StatusIcon::Refresh,
            text: "Reconnect to Discord Gateway".to_string(),
            tooltip: Some("Reconnect to Discord Gateway".to_string()),
            command: Some(CommandId::Reconnect),
        }
    }

    /// Icon-only form shown once the session has settled.
    pub fn compact() -> Self {
        Self {
            icon: StatusIcon::Smiley,
            text: String::new(),
            tooltip: Some("Connected to Discord".to_string()),
            command: None,
        }
    }
}

impl fmt::Display for StatusItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.text.is_empty() {
            f.write_str(self.icon.codicon())
        } else {
            write!(f, "{} {}", self.icon.codicon(), self.text)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}

/// Host UI surface the session reports to. Rendering is up to the host.
pub trait StatusSink: Send + Sync {
    fn show(&self, item: StatusItem);

    fn hide(&self);

    fn notify(&self, notification: Notification);
}

/// Headless sink that turns status changes into log lines.
#[derive(Debug, Default)]
pub struct TracingStatusSink;

impl StatusSink for TracingStatusSink {
    fn show(&self, item: StatusItem) {
        tracing::info!(command = ?item.command, "Status: {}", item);
    }

    fn hide(&self) {
        tracing::info!("Status hidden");
    }

    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Info => tracing::info!("{}", notification.message),
            NotificationLevel::Error => tracing::error!("{}", notification.message),
        }
    }
}
