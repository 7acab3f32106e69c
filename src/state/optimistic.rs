//! Optimistic reducer: displays a mutation before the server confirmed it.

use tracing::{debug, warn};

use crate::state::{
    action::PatchSpec,
    model::StoreState,
    operation::{FieldSlot, OperationId, OperationStatus, Patch, PendingOperation, SlotKey},
};

/// Apply an optimistic operation. Returns `false` when the state is left untouched.
///
/// The operation is dropped as a whole when any of its targets is not loaded, so partial
/// updates never create entities.
pub(super) fn apply(
    state: &mut StoreState,
    id: OperationId,
    label: &str,
    specs: &[PatchSpec],
) -> bool {
    if let Err(err) = state.operation_status(&id).transition(OperationStatus::OptimisticApplied) {
        warn!(operation_id = %id, error = %err, "ignoring optimistic update");
        return false;
    }

    if specs.is_empty() {
        return false;
    }

    if let Some(missing) = specs.iter().find(|spec| !state.contains(&spec.target)) {
        debug!(
            operation_id = %id,
            target = %missing.target,
            "optimistic update targets an entity that is not loaded; skipping"
        );
        return false;
    }

    let seq = state.last_seq + 1;
    state.last_seq = seq;

    let mut patches = Vec::with_capacity(specs.len());
    for spec in specs {
        let Some(entity) = state
            .entities
            .get_mut(&spec.target.kind)
            .and_then(|map| map.get_mut(&spec.target.id))
        else {
            continue;
        };

        let current = entity.field(spec.field).clone();
        let next = spec.update.resolve(&current);

        let slot = state
            .slots
            .entry(SlotKey::new(spec.target.clone(), spec.field))
            .or_insert_with(|| FieldSlot::new(current));
        slot.track(seq, spec.update.clone());

        patches.push(Patch {
            target: spec.target.clone(),
            field: spec.field,
            update: spec.update.clone(),
            previous: slot.baseline.clone(),
            next: next.clone(),
        });
        entity.set_field(spec.field, next);
    }

    debug!(operation_id = %id, seq, label, patches = patches.len(), "optimistic update applied");
    state.pending.insert(
        id,
        PendingOperation {
            id,
            seq,
            label: label.to_string(),
            patches,
        },
    );
    true
}
