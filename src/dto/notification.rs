use std::time::SystemTime;

use serde::Serialize;
use uuid::Uuid;

use crate::{
    dto::format_system_time,
    gateway::ErrorKind,
    state::{EntityRef, OperationId},
};

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    /// Informational.
    Info,
    /// Something partially failed.
    Warning,
    /// An operation failed and was reverted.
    Error,
}

/// User-facing message emitted when an operation needs the user's attention.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    /// Unique id, for de-duplication in the UI.
    pub id: Uuid,
    /// Severity.
    pub level: NotificationLevel,
    /// Failure classification, for error notifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    /// Human-readable text.
    pub message: String,
    /// Operation that caused the notification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<OperationId>,
    /// Entities the notification is about.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<EntityRef>,
    /// RFC 3339 timestamp.
    pub at: String,
}

impl Notification {
    /// Notification stamped with a fresh id and the current time.
    pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            level,
            kind: None,
            message: message.into(),
            operation: None,
            targets: Vec::new(),
            at: format_system_time(SystemTime::now()),
        }
    }

    /// Error-level notification classified as `kind`.
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind: Some(kind),
            ..Self::new(NotificationLevel::Error, message)
        }
    }

    /// Link the notification to an operation.
    pub fn for_operation(mut self, operation: OperationId) -> Self {
        self.operation = Some(operation);
        self
    }

    /// Entities the notification is about.
    pub fn with_targets(mut self, targets: impl IntoIterator<Item = EntityRef>) -> Self {
        self.targets.extend(targets);
        self
    }
}
