/// Actions and patch specifications.
pub mod action;
pub mod entity;
mod hub;
/// Store state and lists.
pub mod model;
/// Pending operations and their lifecycle.
pub mod operation;
mod optimistic;
mod reconcile;
pub mod reducer;

use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};
use tokio_stream::wrappers::BroadcastStream;
use tracing::trace;

pub use self::action::{
    Action, EntityPayload, ListMode, ListUpdate, PatchSpec, ResetScope, Update,
};
pub use self::entity::{Entity, EntityId, EntityKind, EntityRef, Field};
pub use self::hub::{ChangeHub, StateChange};
pub use self::model::{DEFAULT_SETTLED_HISTORY, EntityList, StoreState};
pub use self::operation::{
    InvalidStatusTransition, OperationId, OperationStatus, Patch, PendingOperation,
};

/// Store shared between dispatchers and readers.
pub type SharedStore = Arc<Store>;

const DEFAULT_CHANGE_CAPACITY: usize = 64;

/// State container holding the normalized entity store.
///
/// Every change goes through [`Store::dispatch`], which runs the pure reducer under the write
/// lock. Readers receive immutable snapshots.
pub struct Store {
    state: RwLock<Arc<StoreState>>,
    changes: ChangeHub,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Empty store with the default settled history.
    pub fn new() -> Self {
        Self::with_state(StoreState::default())
    }

    /// Store remembering at most `capacity` settled operations.
    pub fn with_settled_history(capacity: usize) -> Self {
        Self::with_state(StoreState::with_settled_history(capacity))
    }

    fn with_state(state: StoreState) -> Self {
        Self {
            state: RwLock::new(Arc::new(state)),
            changes: ChangeHub::new(DEFAULT_CHANGE_CAPACITY),
        }
    }

    /// Wrap the store in an [`Arc`] so it can be shared with dispatchers.
    pub fn shared(self) -> SharedStore {
        Arc::new(self)
    }

    /// Current snapshot. Later dispatches never alter a snapshot already handed out.
    pub async fn get_state(&self) -> Arc<StoreState> {
        self.state.read().await.clone()
    }

    /// Read from the current state without cloning the snapshot handle.
    pub async fn select<F, T>(&self, read: F) -> T
    where
        F: FnOnce(&StoreState) -> T,
    {
        let guard = self.state.read().await;
        read(&guard)
    }

    /// Run `action` through the reducer and publish the change. Returns the new snapshot.
    pub async fn dispatch(&self, action: Action) -> Arc<StoreState> {
        let mut guard = self.state.write().await;
        let current = Arc::unwrap_or_clone(std::mem::take(&mut *guard));
        let previous_version = current.version();
        let next = Arc::new(reducer::reduce(current, &action));
        *guard = next.clone();
        drop(guard);

        if next.version() != previous_version {
            trace!(action = action.name(), version = next.version(), "store changed");
            self.changes.broadcast(StateChange {
                version: next.version(),
                action: action.name(),
                operation: action.operation(),
            });
        }
        next
    }

    /// Register a listener for subsequent changes.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.changes.subscribe()
    }

    /// Subsequent changes as a `Stream`.
    pub fn updates(&self) -> BroadcastStream<StateChange> {
        self.changes.stream()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Map, Value, json};
    use uuid::Uuid;

    use super::*;

    fn game(id: u64) -> Map<String, Value> {
        match json!({"id": id, "user_game": null}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn snapshots_are_not_mutated_by_later_dispatches() {
        let store = Store::new();
        store
            .dispatch(Action::EntitiesLoaded {
                kind: EntityKind::Game,
                entities: vec![game(1)],
                list: None,
            })
            .await;
        let before = store.get_state().await;

        store
            .dispatch(Action::OptimisticApplied {
                id: Uuid::new_v4(),
                label: "status".into(),
                patches: vec![PatchSpec::set(
                    EntityRef::game(1),
                    Field::UserGame,
                    json!({"status": "owned"}),
                )],
            })
            .await;

        assert_eq!(before.field(&EntityRef::game(1), Field::UserGame), Some(&Value::Null));
        let after = store.get_state().await;
        assert_eq!(
            after.field(&EntityRef::game(1), Field::UserGame),
            Some(&json!({"status": "owned"}))
        );
        assert_eq!(after.version(), before.version() + 1);
    }

    #[tokio::test]
    async fn subscribers_see_only_effective_changes() {
        let store = Store::new();
        let mut changes = store.subscribe();

        store
            .dispatch(Action::EntitiesLoaded {
                kind: EntityKind::Game,
                entities: vec![game(1)],
                list: None,
            })
            .await;
        store.dispatch(Action::RolledBack { id: Uuid::new_v4() }).await;
        store.dispatch(Action::Reset(ResetScope::All)).await;

        let first = changes.recv().await.unwrap();
        assert_eq!(first.action, "entities_loaded");
        let second = changes.recv().await.unwrap();
        assert_eq!(second.action, "reset");
        assert_eq!(second.version, first.version + 1);
        assert!(changes.try_recv().is_err());
    }

    #[tokio::test]
    async fn select_reads_current_state() {
        let store = Store::new();
        store
            .dispatch(Action::EntitiesLoaded {
                kind: EntityKind::Game,
                entities: vec![game(1), game(2)],
                list: None,
            })
            .await;
        let count = store.select(|state| state.entities(EntityKind::Game).count()).await;
        assert_eq!(count, 2);
    }
}
