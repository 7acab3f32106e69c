use serde_json::{Map, Value};

use crate::state::{
    entity::{EntityKind, EntityRef, Field},
    operation::OperationId,
};

/// How an optimistic patch derives the next value from the displayed one.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// Replace the value.
    Set(Value),
    /// Shallow-merge keys into an object value, creating the object when the field is `null`.
    Merge(Map<String, Value>),
    /// Add to a counter, never going below zero.
    Increment(i64),
}

impl Update {
    /// Compute the next value from the current one.
    pub fn resolve(&self, current: &Value) -> Value {
        match self {
            Update::Set(value) => value.clone(),
            Update::Merge(keys) => {
                let mut object = match current {
                    Value::Object(existing) => existing.clone(),
                    _ => Map::new(),
                };
                object.extend(keys.iter().map(|(key, value)| (key.clone(), value.clone())));
                Value::Object(object)
            }
            Update::Increment(delta) => {
                let base = current.as_i64().unwrap_or(0);
                Value::from(base.saturating_add(*delta).max(0))
            }
        }
    }
}

/// A requested change of one field, before it is resolved against the store.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchSpec {
    /// Entity to change.
    pub target: EntityRef,
    /// Field to change.
    pub field: Field,
    /// How the next value is derived.
    pub update: Update,
}

impl PatchSpec {
    /// Patch applying `update` to `field` of `target`.
    pub fn new(target: EntityRef, field: Field, update: Update) -> Self {
        Self {
            target,
            field,
            update,
        }
    }

    /// Patch replacing the field with `value`.
    pub fn set(target: EntityRef, field: Field, value: impl Into<Value>) -> Self {
        Self::new(target, field, Update::Set(value.into()))
    }

    /// Patch moving a counter by `delta`.
    pub fn increment(target: EntityRef, field: Field, delta: i64) -> Self {
        Self::new(target, field, Update::Increment(delta))
    }
}

/// Server-authoritative attributes for one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityPayload {
    /// Entity to change.
    pub target: EntityRef,
    /// Attributes as returned by the API.
    pub attributes: Map<String, Value>,
}

impl EntityPayload {
    /// Payload for `target`.
    pub fn new(target: EntityRef, attributes: Map<String, Value>) -> Self {
        Self { target, attributes }
    }

    /// Payload carrying a single attribute.
    pub fn field(target: EntityRef, field: Field, value: Value) -> Self {
        let mut attributes = Map::new();
        attributes.insert(field.key().to_string(), value);
        Self { target, attributes }
    }
}

/// How a batch of loaded entities updates a named list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMode {
    /// First page: the list is replaced.
    Replace,
    /// Following pages are appended.
    Append,
    /// Freshly created entities (new comments) go on top.
    Prepend,
}

/// List bookkeeping attached to an [`Action::EntitiesLoaded`].
#[derive(Debug, Clone, PartialEq)]
pub struct ListUpdate {
    /// Name of the list.
    pub key: String,
    /// Replace, append or prepend.
    pub mode: ListMode,
    /// Total count reported by the API, when known.
    pub count: Option<u64>,
    /// Link to the next page, when there is one.
    pub next: Option<String>,
}

/// What a [`Action::Reset`] evicts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetScope {
    /// Drop a list and the entities only it referenced.
    List(String),
    /// Drop every entity of one kind.
    Kind(EntityKind),
    /// Drop everything (logout).
    All,
}

/// Every state transition the store understands.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Entities fetched from the API are normalized into the store.
    EntitiesLoaded {
        kind: EntityKind,
        entities: Vec<Map<String, Value>>,
        list: Option<ListUpdate>,
    },
    /// A mutation is applied before the server confirmed it.
    OptimisticApplied {
        id: OperationId,
        label: String,
        patches: Vec<PatchSpec>,
    },
    /// The server accepted the mutation and returned authoritative data.
    Confirmed {
        id: OperationId,
        payload: Vec<EntityPayload>,
    },
    /// The mutation failed; its optimistic values are reverted.
    RolledBack { id: OperationId },
    /// Explicit eviction.
    Reset(ResetScope),
}

impl Action {
    /// Short name used for logging and change notifications.
    pub fn name(&self) -> &'static str {
        match self {
            Action::EntitiesLoaded { .. } => "entities_loaded",
            Action::OptimisticApplied { .. } => "optimistic_applied",
            Action::Confirmed { .. } => "confirmed",
            Action::RolledBack { .. } => "rolled_back",
            Action::Reset(_) => "reset",
        }
    }

    /// Operation this action belongs to, if any.
    pub fn operation(&self) -> Option<OperationId> {
        match self {
            Action::OptimisticApplied { id, .. }
            | Action::Confirmed { id, .. }
            | Action::RolledBack { id } => Some(*id),
            Action::EntitiesLoaded { .. } | Action::Reset(_) => None,
        }
    }
}
