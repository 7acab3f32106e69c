//! Root reducer: the only code path that changes a [`StoreState`].

use std::collections::HashSet;

use indexmap::IndexSet;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::state::{
    action::{Action, ListMode, ListUpdate, ResetScope},
    entity::{Entity, EntityKind, EntityRef},
    model::StoreState,
    optimistic, reconcile,
};

/// Pure transition `(state, action) -> state`.
///
/// The version is bumped only when the action changed something, so replaying a settled
/// reconciliation yields an identical state.
pub fn reduce(mut state: StoreState, action: &Action) -> StoreState {
    let changed = match action {
        Action::EntitiesLoaded {
            kind,
            entities,
            list,
        } => load_entities(&mut state, *kind, entities, list.as_ref()),
        Action::OptimisticApplied { id, label, patches } => {
            optimistic::apply(&mut state, *id, label, patches)
        }
        Action::Confirmed { id, payload } => reconcile::confirm(&mut state, *id, payload),
        Action::RolledBack { id } => reconcile::rollback(&mut state, *id),
        Action::Reset(scope) => reset(&mut state, scope),
    };

    if changed {
        state.version += 1;
    }
    state
}

fn load_entities(
    state: &mut StoreState,
    kind: EntityKind,
    payloads: &[Map<String, Value>],
    list: Option<&ListUpdate>,
) -> bool {
    let mut loaded = Vec::with_capacity(payloads.len());
    for attributes in payloads {
        let Some(entity) = Entity::from_payload(kind, attributes.clone()) else {
            warn!(%kind, "skipping API object without an id");
            continue;
        };
        let target = entity.reference();

        if state.contains(&target) {
            for (key, value) in attributes {
                reconcile::merge_attribute(state, &target, key, value, None);
            }
        } else {
            state
                .entities
                .entry(kind)
                .or_default()
                .insert(target.id.clone(), entity);
        }
        loaded.push(target);
    }

    if let Some(update) = list {
        let entry = state.lists.entry(update.key.clone()).or_default();
        match update.mode {
            ListMode::Replace => entry.items = loaded.iter().cloned().collect(),
            ListMode::Append => entry.items.extend(loaded.iter().cloned()),
            ListMode::Prepend => {
                let mut items: IndexSet<EntityRef> = loaded.iter().cloned().collect();
                items.extend(entry.items.drain(..));
                entry.items = items;
            }
        }
        if update.count.is_some() {
            entry.count = update.count;
        }
        if update.mode != ListMode::Prepend {
            entry.next = update.next.clone();
        }
    }

    debug!(%kind, loaded = loaded.len(), "entities loaded");
    !loaded.is_empty() || list.is_some()
}

fn reset(state: &mut StoreState, scope: &ResetScope) -> bool {
    match scope {
        ResetScope::All => {
            let last_seq = state.last_seq;
            let version = state.version;
            *state = StoreState::with_settled_history(state.settled_capacity);
            state.last_seq = last_seq;
            state.version = version;
            debug!("store reset");
            true
        }
        ResetScope::List(key) => {
            let Some(list) = state.lists.shift_remove(key) else {
                return false;
            };
            let referenced: HashSet<&EntityRef> =
                state.lists.values().flat_map(|other| other.items.iter()).collect();
            let evict: Vec<EntityRef> = list
                .items
                .iter()
                .filter(|target| !referenced.contains(target))
                .filter(|target| !state.has_live_slot(target))
                .cloned()
                .collect();
            for target in &evict {
                if let Some(map) = state.entities.get_mut(&target.kind) {
                    map.shift_remove(&target.id);
                }
            }
            debug!(list = %key, evicted = evict.len(), "list reset");
            true
        }
        ResetScope::Kind(kind) => {
            let evict: Vec<EntityRef> = state
                .entities(*kind)
                .map(Entity::reference)
                .filter(|target| !state.has_live_slot(target))
                .collect();
            for target in &evict {
                if let Some(map) = state.entities.get_mut(kind) {
                    map.shift_remove(&target.id);
                }
            }
            let evicted: HashSet<&EntityRef> = evict.iter().collect();
            for list in state.lists.values_mut() {
                list.items.retain(|target| !evicted.contains(target));
            }
            debug!(%kind, evicted = evict.len(), "kind reset");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use uuid::Uuid;

    use super::*;
    use crate::state::{
        action::{EntityPayload, PatchSpec, Update},
        entity::Field,
        operation::{OperationId, OperationStatus},
    };

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other:?}"),
        }
    }

    fn loaded(kind: EntityKind, entities: Vec<Value>) -> Action {
        Action::EntitiesLoaded {
            kind,
            entities: entities.into_iter().map(object).collect(),
            list: None,
        }
    }

    fn with_games(games: Vec<Value>) -> StoreState {
        reduce(StoreState::default(), &loaded(EntityKind::Game, games))
    }

    fn optimistic(id: OperationId, patches: Vec<PatchSpec>) -> Action {
        Action::OptimisticApplied {
            id,
            label: "test".into(),
            patches,
        }
    }

    fn set_status(game: u64, status: &str) -> PatchSpec {
        let mut keys = Map::new();
        keys.insert("status".into(), json!(status));
        PatchSpec::new(EntityRef::game(game), Field::UserGame, Update::Merge(keys))
    }

    fn user_game(state: &StoreState, game: u64) -> Value {
        state
            .field(&EntityRef::game(game), Field::UserGame)
            .cloned()
            .unwrap()
    }

    #[test]
    fn optimistic_update_is_visible_immediately() {
        let state = with_games(vec![json!({"id": 1, "user_game": null})]);
        let id = Uuid::new_v4();
        let state = reduce(state, &optimistic(id, vec![set_status(1, "owned")]));

        assert_eq!(user_game(&state, 1), json!({"status": "owned"}));
        assert_eq!(state.operation_status(&id), OperationStatus::OptimisticApplied);
        let operation = state.operation(&id).unwrap();
        assert_eq!(operation.patches[0].previous, Value::Null);
        assert!(state.is_pending(&EntityRef::game(1), Field::UserGame));
    }

    #[test]
    fn confirmation_merges_server_data() {
        let state = with_games(vec![json!({"id": 1, "user_game": null})]);
        let id = Uuid::new_v4();
        let state = reduce(state, &optimistic(id, vec![set_status(1, "owned")]));
        let state = reduce(
            state,
            &Action::Confirmed {
                id,
                payload: vec![EntityPayload::field(
                    EntityRef::game(1),
                    Field::UserGame,
                    json!({"id": 77, "status": "owned"}),
                )],
            },
        );

        assert_eq!(user_game(&state, 1), json!({"id": 77, "status": "owned"}));
        assert_eq!(state.operation_status(&id), OperationStatus::Confirmed);
        assert!(!state.is_pending(&EntityRef::game(1), Field::UserGame));
        assert_eq!(state.pending_count(), 0);
    }

    #[test]
    fn rollback_restores_exact_previous_values() {
        let cases = [
            json!(null),
            json!("playing"),
            json!({"id": 3, "status": "beaten", "platforms": [1, 2]}),
        ];
        for previous in cases {
            let state = with_games(vec![json!({"id": 1, "user_game": previous.clone()})]);
            let id = Uuid::new_v4();
            let state = reduce(
                state,
                &optimistic(
                    id,
                    vec![PatchSpec::set(
                        EntityRef::game(1),
                        Field::UserGame,
                        json!({"status": "owned"}),
                    )],
                ),
            );
            let state = reduce(state, &Action::RolledBack { id });

            assert_eq!(user_game(&state, 1), previous);
            assert_eq!(state.operation_status(&id), OperationStatus::RolledBack);
        }
    }

    #[test]
    fn secondary_counters_roll_back_with_primary() {
        let state = reduce(
            StoreState::default(),
            &loaded(
                EntityKind::User,
                vec![json!({"id": "jdoe", "following": false, "followers_count": 10})],
            ),
        );
        let target = EntityRef::user("jdoe");
        let id = Uuid::new_v4();
        let state = reduce(
            state,
            &optimistic(
                id,
                vec![
                    PatchSpec::set(target.clone(), Field::Following, true),
                    PatchSpec::increment(target.clone(), Field::FollowersCount, 1),
                ],
            ),
        );
        assert_eq!(state.field(&target, Field::FollowersCount), Some(&json!(11)));

        let state = reduce(state, &Action::RolledBack { id });
        assert_eq!(state.field(&target, Field::Following), Some(&json!(false)));
        assert_eq!(state.field(&target, Field::FollowersCount), Some(&json!(10)));
    }

    #[test]
    fn reconciliation_is_idempotent() {
        let state = with_games(vec![json!({"id": 1, "user_game": null})]);
        let id = Uuid::new_v4();
        let state = reduce(state, &optimistic(id, vec![set_status(1, "owned")]));
        let confirmed = Action::Confirmed {
            id,
            payload: vec![EntityPayload::field(
                EntityRef::game(1),
                Field::UserGame,
                json!({"id": 5, "status": "owned"}),
            )],
        };

        let once = reduce(state, &confirmed);
        let twice = reduce(once.clone(), &confirmed);
        assert_eq!(once, twice);

        let rolled_after_confirm = reduce(once.clone(), &Action::RolledBack { id });
        assert_eq!(rolled_after_confirm, once);
    }

    #[test]
    fn older_confirmation_does_not_clobber_newer_optimistic_value() {
        let state = with_games(vec![json!({"id": 1, "user_game": null})]);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let state = reduce(state, &optimistic(a, vec![set_status(1, "owned")]));
        let state = reduce(state, &optimistic(b, vec![set_status(1, "playing")]));
        assert_eq!(user_game(&state, 1), json!({"status": "playing"}));

        // Both patches remember the value confirmed before the first operation.
        assert_eq!(state.operation(&b).unwrap().patches[0].previous, Value::Null);

        let state = reduce(
            state,
            &Action::Confirmed {
                id: b,
                payload: vec![EntityPayload::field(
                    EntityRef::game(1),
                    Field::UserGame,
                    json!({"id": 9, "status": "playing"}),
                )],
            },
        );
        let state = reduce(
            state,
            &Action::Confirmed {
                id: a,
                payload: vec![EntityPayload::field(
                    EntityRef::game(1),
                    Field::UserGame,
                    json!({"id": 9, "status": "owned"}),
                )],
            },
        );
        assert_eq!(user_game(&state, 1), json!({"id": 9, "status": "playing"}));
        assert!(!state.is_pending(&EntityRef::game(1), Field::UserGame));
    }

    #[test]
    fn older_failure_does_not_clobber_newer_optimistic_value() {
        let state = with_games(vec![json!({"id": 1, "user_game": null})]);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let state = reduce(state, &optimistic(a, vec![set_status(1, "owned")]));
        let state = reduce(state, &optimistic(b, vec![set_status(1, "playing")]));

        let state = reduce(state, &Action::RolledBack { id: a });
        assert_eq!(user_game(&state, 1), json!({"status": "playing"}));

        let state = reduce(state, &Action::RolledBack { id: b });
        assert_eq!(user_game(&state, 1), Value::Null);
    }

    #[test]
    fn older_failure_after_newer_confirmation_keeps_confirmed_value() {
        let state = with_games(vec![json!({"id": 1, "user_game": null})]);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let state = reduce(state, &optimistic(a, vec![set_status(1, "owned")]));
        let state = reduce(state, &optimistic(b, vec![set_status(1, "playing")]));
        let state = reduce(state, &Action::Confirmed { id: b, payload: vec![] });
        let state = reduce(state, &Action::RolledBack { id: a });

        assert_eq!(user_game(&state, 1), json!({"status": "playing"}));
    }

    #[test]
    fn superseding_rollback_restores_first_confirmed_value() {
        let state = with_games(vec![json!({"id": 1, "user_game": {"status": "yet"}})]);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let state = reduce(state, &optimistic(a, vec![set_status(1, "owned")]));
        let state = reduce(state, &optimistic(b, vec![set_status(1, "playing")]));
        let state = reduce(state, &Action::RolledBack { id: b });

        assert_eq!(user_game(&state, 1), json!({"status": "yet"}));
    }

    #[test]
    fn missing_entity_is_a_no_op() {
        let state = with_games(vec![json!({"id": 1})]);
        let id = Uuid::new_v4();
        let next = reduce(state.clone(), &optimistic(id, vec![set_status(404, "owned")]));

        assert_eq!(next, state);
        assert!(!next.contains(&EntityRef::game(404)));
        assert_eq!(next.operation_status(&id), OperationStatus::Idle);
    }

    #[test]
    fn confirmation_for_evicted_entity_is_ignored() {
        let state = with_games(vec![json!({"id": 1, "user_game": null})]);
        let id = Uuid::new_v4();
        let state = reduce(state, &optimistic(id, vec![set_status(1, "owned")]));
        let state = reduce(state, &Action::Reset(ResetScope::All));
        let next = reduce(
            state.clone(),
            &Action::Confirmed {
                id,
                payload: vec![EntityPayload::field(
                    EntityRef::game(1),
                    Field::UserGame,
                    json!({"status": "owned"}),
                )],
            },
        );
        assert_eq!(next, state);
        assert_eq!(next.entity_count(), 0);
    }

    #[test]
    fn settled_operation_cannot_be_reapplied() {
        let state = with_games(vec![json!({"id": 1, "user_game": null})]);
        let id = Uuid::new_v4();
        let state = reduce(state, &optimistic(id, vec![set_status(1, "owned")]));
        let state = reduce(state, &Action::RolledBack { id });
        let next = reduce(state.clone(), &optimistic(id, vec![set_status(1, "owned")]));
        assert_eq!(next, state);
    }

    #[test]
    fn fetched_data_refreshes_baseline_of_pending_field() {
        let state = with_games(vec![json!({"id": 1, "user_game": null, "name": "Doom"})]);
        let id = Uuid::new_v4();
        let state = reduce(state, &optimistic(id, vec![set_status(1, "owned")]));
        let state = reduce(
            state,
            &loaded(
                EntityKind::Game,
                vec![json!({"id": 1, "user_game": {"status": "yet"}, "name": "DOOM"})],
            ),
        );

        let game = state.entity(&EntityRef::game(1)).unwrap();
        assert_eq!(game.get("name"), Some(&json!("DOOM")));
        assert_eq!(user_game(&state, 1), json!({"status": "owned"}));

        let state = reduce(state, &Action::RolledBack { id });
        assert_eq!(user_game(&state, 1), json!({"status": "yet"}));
    }

    #[test]
    fn failed_counter_delta_is_dropped_from_overlapping_operations() {
        let state = with_games(vec![json!({"id": 1, "comments_count": 2})]);
        let comment = |id| {
            optimistic(
                id,
                vec![PatchSpec::increment(EntityRef::game(1), Field::CommentsCount, 1)],
            )
        };
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let state = reduce(state, &comment(a));
        let state = reduce(state, &comment(b));
        let count = |state: &StoreState| {
            state
                .field(&EntityRef::game(1), Field::CommentsCount)
                .cloned()
        };
        assert_eq!(count(&state), Some(json!(4)));

        let state = reduce(state, &Action::RolledBack { id: a });
        assert_eq!(count(&state), Some(json!(3)));

        let state = reduce(state, &Action::Confirmed { id: b, payload: vec![] });
        assert_eq!(count(&state), Some(json!(3)));
        assert!(!state.is_pending(&EntityRef::game(1), Field::CommentsCount));
    }

    #[test]
    fn counter_deltas_commit_in_any_order() {
        let state = with_games(vec![json!({"id": 1, "added": 10})]);
        let bump = |id| {
            optimistic(id, vec![PatchSpec::increment(EntityRef::game(1), Field::Added, 1)])
        };
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let state = reduce(state, &bump(a));
        let state = reduce(state, &bump(b));

        let state = reduce(state, &Action::Confirmed { id: b, payload: vec![] });
        assert_eq!(state.field(&EntityRef::game(1), Field::Added), Some(&json!(12)));
        let state = reduce(state, &Action::Confirmed { id: a, payload: vec![] });
        assert_eq!(state.field(&EntityRef::game(1), Field::Added), Some(&json!(12)));
        assert_eq!(state.confirmed_field(&EntityRef::game(1), Field::Added), Some(&json!(12)));
    }

    #[test]
    fn reported_counter_becomes_baseline_for_remaining_deltas() {
        let state = with_games(vec![json!({"id": 1, "comments_count": 2})]);
        let comment = |id| {
            optimistic(
                id,
                vec![PatchSpec::increment(EntityRef::game(1), Field::CommentsCount, 1)],
            )
        };
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let state = reduce(state, &comment(a));
        let state = reduce(state, &comment(b));

        let state = reduce(
            state,
            &Action::Confirmed {
                id: a,
                payload: vec![EntityPayload::field(
                    EntityRef::game(1),
                    Field::CommentsCount,
                    json!(7),
                )],
            },
        );
        assert_eq!(state.field(&EntityRef::game(1), Field::CommentsCount), Some(&json!(8)));

        let state = reduce(state, &Action::RolledBack { id: b });
        assert_eq!(state.field(&EntityRef::game(1), Field::CommentsCount), Some(&json!(7)));
    }

    #[test]
    fn kind_reset_keeps_entities_with_live_operations() {
        let state = with_games(vec![
            json!({"id": 1, "user_game": null}),
            json!({"id": 2, "user_game": null}),
        ]);
        let state = reduce(
            state,
            &Action::EntitiesLoaded {
                kind: EntityKind::Game,
                entities: vec![object(json!({"id": 1})), object(json!({"id": 2}))],
                list: Some(ListUpdate {
                    key: "library".into(),
                    mode: ListMode::Replace,
                    count: Some(2),
                    next: None,
                }),
            },
        );
        let state = reduce(
            state,
            &Action::EntitiesLoaded {
                kind: EntityKind::User,
                entities: vec![object(json!({"id": "jdoe"}))],
                list: None,
            },
        );
        let id = Uuid::new_v4();
        let state = reduce(state, &optimistic(id, vec![set_status(2, "owned")]));

        let state = reduce(state, &Action::Reset(ResetScope::Kind(EntityKind::Game)));
        assert!(!state.contains(&EntityRef::game(1)));
        assert!(state.contains(&EntityRef::game(2)));
        assert!(state.contains(&EntityRef::user("jdoe")));
        let library: Vec<_> = state.list("library").unwrap().items().cloned().collect();
        assert_eq!(library, vec![EntityRef::game(2)]);

        let state = reduce(state, &Action::RolledBack { id });
        assert_eq!(user_game(&state, 2), Value::Null);
    }

    #[test]
    fn list_reset_evicts_only_unshared_entities() {
        let page = |key: &str, ids: Vec<u64>| Action::EntitiesLoaded {
            kind: EntityKind::Game,
            entities: ids.into_iter().map(|id| object(json!({"id": id}))).collect(),
            list: Some(ListUpdate {
                key: key.into(),
                mode: ListMode::Replace,
                count: Some(2),
                next: None,
            }),
        };
        let state = reduce(StoreState::default(), &page("library", vec![1, 2]));
        let state = reduce(state, &page("wishlist", vec![2]));
        assert_eq!(state.list("library").unwrap().len(), 2);

        let state = reduce(state, &Action::Reset(ResetScope::List("library".into())));
        assert!(state.list("library").is_none());
        assert!(!state.contains(&EntityRef::game(1)));
        assert!(state.contains(&EntityRef::game(2)));
    }

    #[test]
    fn appended_pages_keep_order_and_skip_duplicates() {
        let page = |mode: ListMode, ids: Vec<u64>, next: Option<&str>| Action::EntitiesLoaded {
            kind: EntityKind::Game,
            entities: ids.into_iter().map(|id| object(json!({"id": id}))).collect(),
            list: Some(ListUpdate {
                key: "browse".into(),
                mode,
                count: Some(3),
                next: next.map(str::to_string),
            }),
        };
        let state = reduce(StoreState::default(), &page(ListMode::Replace, vec![1, 2], Some("p2")));
        let state = reduce(state, &page(ListMode::Append, vec![2, 3], None));

        let list = state.list("browse").unwrap();
        let ids: Vec<_> = list.items().map(|target| target.id.to_string()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(list.next(), None);
        assert_eq!(list.count(), Some(3));
    }
}
