use serde_json::{Map, Value, json};

use crate::{
    dto::{CreateUserGame, GameStatus, UpdateUserGame},
    error::DispatchError,
    gateway::ApiRequest,
    state::{EntityId, EntityRef, Field, PatchSpec, StoreState, Update},
};

use super::{CommandPlan, Reconciler, encode_error, require};

const LIBRARY_PATH: &str = "/users/current/games";

fn entry_path(game: &EntityId) -> String {
    format!("{LIBRARY_PATH}/{game}")
}

pub(super) fn set_status(
    state: &StoreState,
    game: &EntityId,
    status: GameStatus,
) -> Result<CommandPlan, DispatchError> {
    upsert(state, game, status, None, "set_game_status")
}

/// Put a library entry back to `status` and `platforms`, recreating it when it was removed.
pub(super) fn restore(
    state: &StoreState,
    game: &EntityId,
    status: GameStatus,
    platforms: &[u64],
) -> Result<CommandPlan, DispatchError> {
    upsert(state, game, status, Some(platforms), "restore_game")
}

fn upsert(
    state: &StoreState,
    game: &EntityId,
    status: GameStatus,
    platforms: Option<&[u64]>,
    label: &'static str,
) -> Result<CommandPlan, DispatchError> {
    let target = EntityRef::game(game.clone());
    let entity = require(state, &target)?;

    let mut keys = Map::new();
    keys.insert("status".into(), Value::from(status.as_str()));
    if let Some(platforms) = platforms {
        keys.insert("platforms".into(), json!(platforms));
    }

    let (request, patches) = if entity.field(Field::UserGame).is_null() {
        let body = CreateUserGame {
            game: game.clone(),
            status,
            platforms: platforms.map(<[u64]>::to_vec),
        };
        let request = ApiRequest::post(LIBRARY_PATH)
            .json(&body)
            .map_err(|err| encode_error(LIBRARY_PATH, err))?;
        let patches = vec![
            PatchSpec::set(target.clone(), Field::UserGame, Value::Object(keys)),
            PatchSpec::increment(target.clone(), Field::Added, 1),
        ];
        (request, patches)
    } else {
        let path = entry_path(game);
        let body = UpdateUserGame {
            status: Some(status),
            platforms: platforms.map(<[u64]>::to_vec),
        };
        let request = ApiRequest::patch(path.as_str())
            .json(&body)
            .map_err(|err| encode_error(&path, err))?;
        let patches = vec![PatchSpec::new(
            target.clone(),
            Field::UserGame,
            Update::Merge(keys),
        )];
        (request, patches)
    };

    Ok(CommandPlan {
        label,
        patches,
        request,
        reconciler: Reconciler::Field {
            target,
            field: Field::UserGame,
        },
    })
}

pub(super) fn set_platforms(
    state: &StoreState,
    game: &EntityId,
    platforms: &[u64],
) -> Result<CommandPlan, DispatchError> {
    let target = EntityRef::game(game.clone());
    let entity = require(state, &target)?;
    if entity.field(Field::UserGame).is_null() {
        return Err(DispatchError::InvalidInput(format!(
            "game `{game}` is not in the library"
        )));
    }

    let path = entry_path(game);
    let body = UpdateUserGame {
        status: None,
        platforms: Some(platforms.to_vec()),
    };
    let request = ApiRequest::patch(path.as_str())
        .json(&body)
        .map_err(|err| encode_error(&path, err))?;
    let mut keys = Map::new();
    keys.insert("platforms".into(), json!(platforms));

    Ok(CommandPlan {
        label: "set_game_platforms",
        patches: vec![PatchSpec::new(
            target.clone(),
            Field::UserGame,
            Update::Merge(keys),
        )],
        request,
        reconciler: Reconciler::Field {
            target,
            field: Field::UserGame,
        },
    })
}

pub(super) fn remove(state: &StoreState, game: &EntityId) -> Result<CommandPlan, DispatchError> {
    let target = EntityRef::game(game.clone());
    let entity = require(state, &target)?;
    if entity.field(Field::UserGame).is_null() {
        return Err(DispatchError::InvalidInput(format!(
            "game `{game}` is not in the library"
        )));
    }

    Ok(CommandPlan {
        label: "remove_game",
        patches: vec![
            PatchSpec::set(target.clone(), Field::UserGame, Value::Null),
            PatchSpec::increment(target.clone(), Field::Added, -1),
        ],
        request: ApiRequest::delete(entry_path(game)),
        reconciler: Reconciler::Field {
            target,
            field: Field::UserGame,
        },
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        actions::{Command, fixtures::store_with_game},
        gateway::{HttpMethod, RequestBody},
    };

    #[test]
    fn adding_posts_entry_and_bumps_counter() {
        let state = store_with_game(Value::Null);
        let plan = Command::SetGameStatus {
            game: EntityId::Num(7),
            status: GameStatus::Owned,
        }
        .plan(&state)
        .unwrap();

        assert_eq!(plan.request.method, HttpMethod::Post);
        assert_eq!(plan.request.path, "/users/current/games");
        assert_eq!(
            plan.request.body,
            RequestBody::Json(json!({"game": 7, "status": "owned"}))
        );
        assert_eq!(
            plan.patches,
            vec![
                PatchSpec::set(EntityRef::game(7), Field::UserGame, json!({"status": "owned"})),
                PatchSpec::increment(EntityRef::game(7), Field::Added, 1),
            ]
        );
    }

    #[test]
    fn changing_status_patches_existing_entry() {
        let state = store_with_game(json!({"id": 3, "status": "owned", "platforms": [1]}));
        let plan = Command::SetGameStatus {
            game: EntityId::Num(7),
            status: GameStatus::Beaten,
        }
        .plan(&state)
        .unwrap();

        assert_eq!(plan.request.method, HttpMethod::Patch);
        assert_eq!(plan.request.path, "/users/current/games/7");
        assert_eq!(plan.request.body, RequestBody::Json(json!({"status": "beaten"})));
        assert_eq!(plan.patches.len(), 1);
        assert_eq!(
            plan.patches[0].update.resolve(state.field(&EntityRef::game(7), Field::UserGame).unwrap()),
            json!({"id": 3, "status": "beaten", "platforms": [1]})
        );
    }

    #[test]
    fn removing_requires_a_library_entry() {
        let state = store_with_game(Value::Null);
        let err = Command::RemoveGame {
            game: EntityId::Num(7),
        }
        .plan(&state)
        .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidInput(_)));

        let missing = Command::RemoveGame {
            game: EntityId::Num(8),
        }
        .plan(&state)
        .unwrap_err();
        assert!(matches!(missing, DispatchError::MissingEntity(_)));
    }

    #[test]
    fn platforms_merge_into_entry() {
        let state = store_with_game(json!({"status": "playing"}));
        let plan = Command::SetGamePlatforms {
            game: EntityId::Num(7),
            platforms: vec![4, 18],
        }
        .plan(&state)
        .unwrap();
        assert_eq!(plan.request.body, RequestBody::Json(json!({"platforms": [4, 18]})));
        assert_eq!(
            plan.patches[0].update.resolve(&json!({"status": "playing"})),
            json!({"status": "playing", "platforms": [4, 18]})
        );
    }

    #[test]
    fn restoring_removed_entry_posts_status_and_platforms() {
        let state = store_with_game(Value::Null);
        let plan = Command::RestoreGame {
            game: EntityId::Num(7),
            status: GameStatus::Playing,
            platforms: vec![4],
        }
        .plan(&state)
        .unwrap();

        assert_eq!(plan.label, "restore_game");
        assert_eq!(plan.request.method, HttpMethod::Post);
        assert_eq!(
            plan.request.body,
            RequestBody::Json(json!({"game": 7, "status": "playing", "platforms": [4]}))
        );
        assert_eq!(
            plan.patches[0],
            PatchSpec::set(
                EntityRef::game(7),
                Field::UserGame,
                json!({"status": "playing", "platforms": [4]})
            )
        );
    }

    #[test]
    fn restoring_existing_entry_patches_both_fields() {
        let state = store_with_game(json!({"id": 3, "status": "beaten", "platforms": []}));
        let plan = Command::RestoreGame {
            game: EntityId::Num(7),
            status: GameStatus::Playing,
            platforms: vec![4, 6],
        }
        .plan(&state)
        .unwrap();

        assert_eq!(plan.request.method, HttpMethod::Patch);
        assert_eq!(
            plan.request.body,
            RequestBody::Json(json!({"status": "playing", "platforms": [4, 6]}))
        );
        assert_eq!(plan.patches.len(), 1);
    }
}
