use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

use crate::{
    dto::{Notification, NotificationLevel},
    error::{BulkReport, DispatchError},
    gateway::ErrorKind,
    state::{EntityRef, OperationId},
};

/// Broadcast hub carrying [`Notification`]s to the UI layer.
pub struct NotificationHub {
    sender: broadcast::Sender<Notification>,
}

impl NotificationHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Subsequent notifications as a `Stream`.
    pub fn stream(&self) -> BroadcastStream<Notification> {
        BroadcastStream::new(self.sender.subscribe())
    }

    /// Send a notification to all current subscribers, ignoring delivery errors.
    pub fn notify(&self, notification: Notification) {
        if self.sender.send(notification).is_err() {
            debug!("notification dropped; no subscribers");
        }
    }

    /// Report an operation that was rolled back.
    pub fn operation_failed(
        &self,
        operation: OperationId,
        label: &str,
        target: &EntityRef,
        err: &DispatchError,
    ) {
        warn!(operation_id = %operation, label, %target, error = %err, "operation rolled back");
        let message = match err.kind() {
            ErrorKind::NotFound => format!("{target} no longer exists"),
            ErrorKind::ValidationFailure => format!("{label} was rejected: {err}"),
            _ => format!("{label} failed, changes were reverted"),
        };
        self.notify(
            Notification::error(err.kind(), message)
                .for_operation(operation)
                .with_targets([target.clone()]),
        );
    }

    /// Report the items of a bulk action (or of its undo) that did not go through.
    pub fn bulk_partial_failure(&self, label: &str, report: &BulkReport) {
        let Some(kind) = report.failure_kind() else {
            return;
        };
        warn!(
            label,
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "bulk action partially failed"
        );
        let message = format!(
            "{label}: {} of {} items failed",
            report.failed.len(),
            report.failed.len() + report.succeeded.len()
        );
        let level = if kind == ErrorKind::PartialBulkFailure {
            NotificationLevel::Warning
        } else {
            NotificationLevel::Error
        };
        self.notify(Notification {
            level,
            ..Notification::error(kind, message)
                .with_targets(report.failed.iter().map(|failure| failure.target.clone()))
        });
    }
}
