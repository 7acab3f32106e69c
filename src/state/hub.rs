use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::state::operation::OperationId;

/// Emitted after every dispatch that changed the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateChange {
    /// Store version after the change.
    pub version: u64,
    /// Name of the action that caused it.
    pub action: &'static str,
    /// Operation the action belongs to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<OperationId>,
}

/// Broadcast hub fanning out [`StateChange`]s to subscribers.
pub struct ChangeHub {
    sender: broadcast::Sender<StateChange>,
}

impl ChangeHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Register a listener for subsequent changes.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.sender.subscribe()
    }

    /// Same as [`ChangeHub::subscribe`], as a `Stream`.
    pub fn stream(&self) -> BroadcastStream<StateChange> {
        BroadcastStream::new(self.sender.subscribe())
    }

    /// Send a change to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, change: StateChange) {
        let _ = self.sender.send(change);
    }
}
