//! Reconciliation reducer: commits server data or reverts a failed operation.

use std::collections::HashSet;

use serde_json::Value;
use tracing::debug;

use crate::state::{
    action::EntityPayload,
    entity::{EntityRef, Field},
    model::StoreState,
    operation::{OperationId, OperationStatus, SlotKey},
};

/// Commit an operation with the server payload. Unknown or settled operations are ignored.
pub(super) fn confirm(state: &mut StoreState, id: OperationId, payload: &[EntityPayload]) -> bool {
    let Some(operation) = state.pending.shift_remove(&id) else {
        debug!(operation_id = %id, status = ?state.operation_status(&id), "ignoring confirmation");
        return false;
    };

    let mut handled: HashSet<(EntityRef, &str)> = HashSet::new();
    for patch in &operation.patches {
        let key = SlotKey::new(patch.target.clone(), patch.field);
        let reported = payload_value(payload, &patch.target, patch.field).cloned();
        handled.insert((patch.target.clone(), patch.field.key()));

        let Some(slot) = state.slots.get_mut(&key) else {
            continue;
        };
        slot.release(operation.seq);
        let outdated = slot.confirmed_seq > operation.seq;

        let shown = if patch.accumulates() {
            match reported {
                Some(value) if !outdated => {
                    slot.baseline = value;
                    slot.confirmed_seq = operation.seq;
                }
                Some(_) => {}
                None => {
                    slot.baseline = patch.update.resolve(&slot.baseline);
                    slot.confirmed_seq = slot.confirmed_seq.max(operation.seq);
                }
            }
            Some(slot.replay())
        } else {
            let server_value = reported.unwrap_or_else(|| patch.next.clone());
            let superseded = slot.has_newer_than(operation.seq);
            if !outdated {
                slot.baseline = server_value.clone();
                slot.confirmed_seq = operation.seq;
            }
            if outdated || superseded {
                debug!(
                    operation_id = %id,
                    target = %patch.target,
                    field = %patch.field,
                    "stale confirmation; keeping newer value"
                );
                None
            } else {
                Some(server_value)
            }
        };
        if slot.live.is_empty() {
            state.slots.remove(&key);
        }

        if let Some(value) = shown {
            if let Some(entity) = state.entity_mut(&patch.target) {
                entity.set_field(patch.field, value);
            }
        }
    }

    for entity_payload in payload {
        for (key, value) in &entity_payload.attributes {
            if handled.contains(&(entity_payload.target.clone(), key.as_str())) {
                continue;
            }
            merge_attribute(state, &entity_payload.target, key, value, Some(operation.seq));
        }
    }

    state.record_settled(id, OperationStatus::Confirmed);
    debug!(operation_id = %id, label = %operation.label, "operation confirmed");
    true
}

/// Revert an operation. Fields it no longer displays (superseded) are left alone, except
/// counters, which are replayed from the baseline without this operation's delta.
pub(super) fn rollback(state: &mut StoreState, id: OperationId) -> bool {
    let Some(operation) = state.pending.shift_remove(&id) else {
        debug!(operation_id = %id, status = ?state.operation_status(&id), "ignoring rollback");
        return false;
    };

    for patch in &operation.patches {
        let key = SlotKey::new(patch.target.clone(), patch.field);
        let Some(slot) = state.slots.get_mut(&key) else {
            continue;
        };
        let displayed = slot.newest_seq() == Some(operation.seq);
        slot.release(operation.seq);
        let shown = if patch.accumulates() {
            Some(slot.replay())
        } else {
            displayed.then(|| slot.baseline.clone())
        };
        if slot.live.is_empty() {
            state.slots.remove(&key);
        }

        if let Some(value) = shown {
            if let Some(entity) = state.entity_mut(&patch.target) {
                entity.set_field(patch.field, value);
            }
        }
    }

    state.record_settled(id, OperationStatus::RolledBack);
    debug!(operation_id = %id, label = %operation.label, "operation rolled back");
    true
}

/// Write a server attribute, respecting live operations on relation fields.
///
/// When another operation still owns the field, the value only becomes the new baseline;
/// counters are then replayed on top of it.
/// `seq` is the confirming operation, `None` for freshly fetched data; a confirmation older
/// than the current baseline is discarded.
pub(super) fn merge_attribute(
    state: &mut StoreState,
    target: &EntityRef,
    key: &str,
    value: &Value,
    seq: Option<u64>,
) {
    if let Some(field) = Field::from_key(key) {
        if let Some(slot) = state.slots.get_mut(&SlotKey::new(target.clone(), field)) {
            match seq {
                Some(seq) if slot.confirmed_seq > seq => {}
                Some(seq) => {
                    slot.baseline = value.clone();
                    slot.confirmed_seq = seq;
                }
                None => slot.baseline = value.clone(),
            }
            let shown = slot.accumulates().then(|| slot.replay());
            if let Some(value) = shown {
                if let Some(entity) = state.entity_mut(target) {
                    entity.set_field(field, value);
                }
            }
            return;
        }
    }

    if let Some(entity) = state.entity_mut(target) {
        entity.set_attribute(key, value.clone());
    }
}

fn payload_value<'a>(
    payload: &'a [EntityPayload],
    target: &EntityRef,
    field: Field,
) -> Option<&'a Value> {
    payload
        .iter()
        .filter(|entry| &entry.target == target)
        .find_map(|entry| entry.attributes.get(field.key()))
}
