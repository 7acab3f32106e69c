use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};
use serde_json::Value;

use crate::state::{
    entity::{Entity, EntityId, EntityKind, EntityRef, Field},
    operation::{FieldSlot, OperationId, OperationStatus, PendingOperation, SlotKey},
};

/// Number of settled operations remembered by default.
pub const DEFAULT_SETTLED_HISTORY: usize = 256;

/// Ordered list of entity references, e.g. one paginated listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityList {
    pub(super) items: IndexSet<EntityRef>,
    pub(super) count: Option<u64>,
    pub(super) next: Option<String>,
}

impl EntityList {
    /// Entries in list order.
    pub fn items(&self) -> impl Iterator<Item = &EntityRef> {
        self.items.iter()
    }

    /// Number of loaded entries.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is loaded.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether `target` is in the list.
    pub fn contains(&self, target: &EntityRef) -> bool {
        self.items.contains(target)
    }

    /// Total count reported by the API.
    pub fn count(&self) -> Option<u64> {
        self.count
    }

    /// Link to the next page, when one exists.
    pub fn next(&self) -> Option<&str> {
        self.next.as_deref()
    }
}

/// Normalized client state. Read-only outside of the reducers.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreState {
    pub(super) entities: HashMap<EntityKind, IndexMap<EntityId, Entity>>,
    pub(super) lists: IndexMap<String, EntityList>,
    pub(super) pending: IndexMap<OperationId, PendingOperation>,
    pub(super) slots: HashMap<SlotKey, FieldSlot>,
    pub(super) settled: IndexMap<OperationId, OperationStatus>,
    pub(super) settled_capacity: usize,
    pub(super) last_seq: u64,
    pub(super) version: u64,
}

impl Default for StoreState {
    fn default() -> Self {
        Self::with_settled_history(DEFAULT_SETTLED_HISTORY)
    }
}

impl StoreState {
    /// Empty state remembering at most `capacity` settled operations.
    pub fn with_settled_history(capacity: usize) -> Self {
        Self {
            entities: HashMap::new(),
            lists: IndexMap::new(),
            pending: IndexMap::new(),
            slots: HashMap::new(),
            settled: IndexMap::new(),
            settled_capacity: capacity.max(1),
            last_seq: 0,
            version: 0,
        }
    }

    /// Incremented on every state change.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Entity by reference.
    pub fn entity(&self, target: &EntityRef) -> Option<&Entity> {
        self.entities.get(&target.kind)?.get(&target.id)
    }

    /// Whether `target` is loaded.
    pub fn contains(&self, target: &EntityRef) -> bool {
        self.entity(target).is_some()
    }

    /// Entities of one kind in load order.
    pub fn entities(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> {
        self.entities.get(&kind).into_iter().flat_map(|map| map.values())
    }

    /// Number of entities across kinds.
    pub fn entity_count(&self) -> usize {
        self.entities.values().map(IndexMap::len).sum()
    }

    /// Displayed value of a field.
    pub fn field(&self, target: &EntityRef, field: Field) -> Option<&Value> {
        self.entity(target).map(|entity| entity.field(field))
    }

    /// Last server-confirmed value of a field, ignoring any optimistic value on top.
    pub fn confirmed_field(&self, target: &EntityRef, field: Field) -> Option<&Value> {
        let entity = self.entity(target)?;
        match self.slots.get(&SlotKey::new(target.clone(), field)) {
            Some(slot) => Some(slot.baseline()),
            None => Some(entity.field(field)),
        }
    }

    /// Whether an operation is in flight for this field.
    pub fn is_pending(&self, target: &EntityRef, field: Field) -> bool {
        self.slots.contains_key(&SlotKey::new(target.clone(), field))
    }

    /// Named list, if loaded.
    pub fn list(&self, key: &str) -> Option<&EntityList> {
        self.lists.get(key)
    }

    /// In-flight operation by id.
    pub fn operation(&self, id: &OperationId) -> Option<&PendingOperation> {
        self.pending.get(id)
    }

    /// In-flight operations in dispatch order.
    pub fn pending_operations(&self) -> impl Iterator<Item = &PendingOperation> {
        self.pending.values()
    }

    /// Number of in-flight operations.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Lifecycle status of an operation; forgotten operations report [`OperationStatus::Idle`].
    pub fn operation_status(&self, id: &OperationId) -> OperationStatus {
        if let Some(operation) = self.pending.get(id) {
            return operation.status();
        }
        self.settled
            .get(id)
            .copied()
            .unwrap_or(OperationStatus::Idle)
    }

    pub(super) fn entity_mut(&mut self, target: &EntityRef) -> Option<&mut Entity> {
        self.entities.get_mut(&target.kind)?.get_mut(&target.id)
    }

    pub(super) fn record_settled(&mut self, id: OperationId, status: OperationStatus) {
        self.settled.insert(id, status);
        while self.settled.len() > self.settled_capacity {
            self.settled.shift_remove_index(0);
        }
    }

    /// Whether any live operation touches this entity.
    pub(super) fn has_live_slot(&self, target: &EntityRef) -> bool {
        self.slots.keys().any(|key| &key.target == target)
    }
}
