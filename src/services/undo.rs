use serde_json::Value;
use tokio::sync::Mutex;

use crate::{
    actions::Command,
    state::{EntityRef, Field},
};

/// Pre-bulk value of one field, with the command restoring it.
#[derive(Debug, Clone, PartialEq)]
pub struct UndoEntry {
    /// Entity changed by the bulk action.
    pub target: EntityRef,
    /// Field changed by the bulk action.
    pub field: Field,
    /// Value displayed before the bulk action.
    pub previous: Value,
    /// Command putting `previous` back.
    pub inverse: Command,
}

/// Values captured before the latest bulk action.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UndoSnapshot {
    /// Label of the bulk action.
    pub label: String,
    /// One entry per item that went through.
    pub entries: Vec<UndoEntry>,
}

impl UndoSnapshot {
    /// Empty snapshot for the bulk action `label`.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            entries: Vec::new(),
        }
    }

    /// Record one item.
    pub fn push(&mut self, entry: UndoEntry) {
        self.entries.push(entry);
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keep only the entries whose target satisfies `keep`.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&EntityRef) -> bool,
    {
        self.entries.retain(|entry| keep(&entry.target));
    }
}

/// Holds at most one [`UndoSnapshot`]; a newer bulk action replaces the older snapshot.
#[derive(Default)]
pub struct UndoBuffer {
    slot: Mutex<Option<UndoSnapshot>>,
}

impl UndoBuffer {
    /// Empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `snapshot`, discarding the previous one. Empty snapshots clear the buffer.
    pub async fn replace(&self, snapshot: UndoSnapshot) {
        let mut slot = self.slot.lock().await;
        *slot = (!snapshot.is_empty()).then_some(snapshot);
    }

    /// Remove and return the stored snapshot.
    pub async fn take(&self) -> Option<UndoSnapshot> {
        self.slot.lock().await.take()
    }

    /// Copy of the stored snapshot, left in place.
    pub async fn peek(&self) -> Option<UndoSnapshot> {
        self.slot.lock().await.clone()
    }

    /// Drop the stored snapshot.
    pub async fn clear(&self) {
        self.slot.lock().await.take();
    }
}
