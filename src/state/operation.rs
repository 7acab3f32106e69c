use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::state::{
    action::Update,
    entity::{EntityRef, Field},
};

/// Correlation token linking an optimistic change to its network call.
pub type OperationId = Uuid;

/// Lifecycle of a single mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    /// Unknown to the store: never applied, or evicted.
    Idle,
    /// Optimistic values are displayed and the network call is in flight.
    OptimisticApplied,
    /// The server accepted the change.
    Confirmed,
    /// The change failed and was reverted.
    RolledBack,
}

/// Error returned when an operation is moved along an edge that does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid operation transition from {from:?} to {to:?}")]
pub struct InvalidStatusTransition {
    /// Current status.
    pub from: OperationStatus,
    /// Rejected target status.
    pub to: OperationStatus,
}

impl OperationStatus {
    /// Whether the operation reached a final state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationStatus::Confirmed | OperationStatus::RolledBack)
    }

    /// Validate a transition: `Idle -> OptimisticApplied -> {Confirmed | RolledBack}`.
    pub fn transition(self, to: OperationStatus) -> Result<OperationStatus, InvalidStatusTransition> {
        match (self, to) {
            (OperationStatus::Idle, OperationStatus::OptimisticApplied)
            | (OperationStatus::OptimisticApplied, OperationStatus::Confirmed)
            | (OperationStatus::OptimisticApplied, OperationStatus::RolledBack) => Ok(to),
            (from, to) => Err(InvalidStatusTransition { from, to }),
        }
    }
}

/// One resolved field change recorded by an in-flight operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    /// Entity the change applies to.
    pub target: EntityRef,
    /// Field being changed.
    pub field: Field,
    /// Requested change, kept so counters can be replayed over a new baseline.
    pub update: Update,
    /// Value confirmed before the first in-flight operation on this field.
    pub previous: Value,
    /// Optimistic value shown when the operation was applied.
    pub next: Value,
}

impl Patch {
    /// Whether the change composes with other live changes instead of replacing them.
    pub fn accumulates(&self) -> bool {
        matches!(self.update, Update::Increment(_))
    }
}

/// An in-flight mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingOperation {
    /// Correlation token shared with the network call.
    pub id: OperationId,
    /// Store-wide dispatch order, strictly increasing.
    pub seq: u64,
    /// Command label, for logs.
    pub label: String,
    /// Field changes, settled together.
    pub patches: Vec<Patch>,
}

impl PendingOperation {
    /// Always [`OperationStatus::OptimisticApplied`] while the operation is pending.
    pub fn status(&self) -> OperationStatus {
        OperationStatus::OptimisticApplied
    }
}

/// Address of an optimistic slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotKey {
    /// Entity holding the field.
    pub target: EntityRef,
    /// The field itself.
    pub field: Field,
}

impl SlotKey {
    /// Slot of `field` on `target`.
    pub fn new(target: EntityRef, field: Field) -> Self {
        Self { target, field }
    }
}

/// Bookkeeping for a field with at least one live operation.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSlot {
    /// Last confirmed value; what a rollback restores.
    pub(super) baseline: Value,
    /// Sequence number of the operation that produced `baseline` (0 for fetched data).
    pub(super) confirmed_seq: u64,
    /// Live operations touching this field, ordered by sequence number.
    pub(super) live: Vec<LiveWrite>,
}

/// A live operation's change to one slot.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct LiveWrite {
    pub(super) seq: u64,
    pub(super) update: Update,
}

impl FieldSlot {
    pub(super) fn new(baseline: Value) -> Self {
        Self {
            baseline,
            confirmed_seq: 0,
            live: Vec::new(),
        }
    }

    /// Last confirmed value of the field.
    pub fn baseline(&self) -> &Value {
        &self.baseline
    }

    /// Sequence number of the operation currently displayed.
    pub fn newest_seq(&self) -> Option<u64> {
        self.live.last().map(|write| write.seq)
    }

    pub(super) fn track(&mut self, seq: u64, update: Update) {
        self.live.push(LiveWrite { seq, update });
    }

    pub(super) fn release(&mut self, seq: u64) {
        self.live.retain(|write| write.seq != seq);
    }

    pub(super) fn has_newer_than(&self, seq: u64) -> bool {
        self.live.iter().any(|write| write.seq > seq)
    }

    /// Baseline with every live change applied in dispatch order.
    pub(super) fn replay(&self) -> Value {
        self.live
            .iter()
            .fold(self.baseline.clone(), |value, write| write.update.resolve(&value))
    }

    /// Whether every live change on the slot is a counter delta.
    pub(super) fn accumulates(&self) -> bool {
        self.live
            .iter()
            .all(|write| matches!(write.update, Update::Increment(_)))
    }
}
