//! Typed user commands and the optimistic plan each one produces.
//!
//! Planning is pure: a [`Command`] is checked against a store snapshot and turned into the
//! patches to apply optimistically, the API request confirming them, and a [`Reconciler`]
//! mapping the response back onto the store.

mod comment;
mod library;
mod review;
mod social;
mod token;

pub use self::comment::comments_list;

use serde_json::Value;

use crate::{
    dto::GameStatus,
    error::DispatchError,
    gateway::ApiRequest,
    state::{
        Action, Entity, EntityId, EntityKind, EntityPayload, EntityRef, Field, ListMode,
        ListUpdate, OperationId, PatchSpec, StoreState,
    },
};

/// A user intent the dispatcher can run optimistically.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Add a game to the library with `status`, or change its status when already there.
    SetGameStatus { game: EntityId, status: GameStatus },
    /// Replace the platforms of a library entry.
    SetGamePlatforms { game: EntityId, platforms: Vec<u64> },
    /// Remove a game from the library.
    RemoveGame { game: EntityId },
    /// Put a library entry back to a known status and platform list, recreating it if needed.
    RestoreGame {
        game: EntityId,
        status: GameStatus,
        platforms: Vec<u64>,
    },
    /// Rate a game from 1 to 5.
    RateGame { game: EntityId, rating: u8 },
    /// Delete the user's rating of a game.
    RemoveRating { game: EntityId },
    /// Follow a user or a collection.
    Follow { target: EntityRef },
    /// Stop following a user or a collection.
    Unfollow { target: EntityRef },
    /// Like or unlike a review.
    LikeReview { review: EntityId, like: bool },
    /// Like or unlike a comment posted under `parent`.
    LikeComment {
        parent: EntityRef,
        comment: EntityId,
        like: bool,
    },
    /// Post a comment under `parent` (a game, review, collection or post).
    PostComment { parent: EntityRef, text: String },
    /// Join the loyalty program as `user` (the current user).
    JoinTokenProgram { user: EntityRef },
}

impl Command {
    /// Short stable name used in logs and notifications.
    pub fn label(&self) -> &'static str {
        match self {
            Command::SetGameStatus { .. } => "set_game_status",
            Command::SetGamePlatforms { .. } => "set_game_platforms",
            Command::RemoveGame { .. } => "remove_game",
            Command::RestoreGame { .. } => "restore_game",
            Command::RateGame { .. } => "rate_game",
            Command::RemoveRating { .. } => "remove_rating",
            Command::Follow { .. } => "follow",
            Command::Unfollow { .. } => "unfollow",
            Command::LikeReview { .. } => "like_review",
            Command::LikeComment { .. } => "like_comment",
            Command::PostComment { .. } => "post_comment",
            Command::JoinTokenProgram { .. } => "join_token_program",
        }
    }

    /// Entity the command is primarily about.
    pub fn target(&self) -> EntityRef {
        match self {
            Command::SetGameStatus { game, .. }
            | Command::SetGamePlatforms { game, .. }
            | Command::RemoveGame { game }
            | Command::RestoreGame { game, .. }
            | Command::RateGame { game, .. }
            | Command::RemoveRating { game } => EntityRef::game(game.clone()),
            Command::Follow { target } | Command::Unfollow { target } => target.clone(),
            Command::LikeReview { review, .. } => EntityRef::review(review.clone()),
            Command::LikeComment { comment, .. } => EntityRef::comment(comment.clone()),
            Command::PostComment { parent, .. } => parent.clone(),
            Command::JoinTokenProgram { user } => user.clone(),
        }
    }

    /// Submission commands hand validation failures back to the caller as form errors
    /// instead of raising a notification.
    pub fn is_submission(&self) -> bool {
        matches!(self, Command::PostComment { .. })
    }

    /// Check the command against `state` and build its plan.
    pub fn plan(&self, state: &StoreState) -> Result<CommandPlan, DispatchError> {
        match self {
            Command::SetGameStatus { game, status } => library::set_status(state, game, *status),
            Command::SetGamePlatforms { game, platforms } => {
                library::set_platforms(state, game, platforms)
            }
            Command::RemoveGame { game } => library::remove(state, game),
            Command::RestoreGame {
                game,
                status,
                platforms,
            } => library::restore(state, game, *status, platforms),
            Command::RateGame { game, rating } => review::rate(state, game, *rating),
            Command::RemoveRating { game } => review::remove_rating(state, game),
            Command::Follow { target } => social::follow(state, target, true),
            Command::Unfollow { target } => social::follow(state, target, false),
            Command::LikeReview { review, like } => social::like_review(state, review, *like),
            Command::LikeComment {
                parent,
                comment,
                like,
            } => social::like_comment(state, parent, comment, *like),
            Command::PostComment { parent, text } => comment::post(state, parent, text),
            Command::JoinTokenProgram { user } => token::join(state, user),
        }
    }

    /// Command putting a game's library entry back to `previous`, as captured before a bulk
    /// change. `None` when there is nothing to restore.
    ///
    /// Entries with platforms are restored with them, since a removal drops both.
    pub fn restore_user_game(game: EntityId, previous: &Value) -> Option<Command> {
        let entry = match previous {
            Value::Null => return Some(Command::RemoveGame { game }),
            Value::Object(entry) => entry,
            _ => return None,
        };
        let status = entry
            .get("status")
            .and_then(Value::as_str)
            .and_then(GameStatus::from_name)?;
        let platforms: Vec<u64> = entry
            .get("platforms")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(Value::as_u64).collect())
            .unwrap_or_default();

        if platforms.is_empty() {
            Some(Command::SetGameStatus { game, status })
        } else {
            Some(Command::RestoreGame {
                game,
                status,
                platforms,
            })
        }
    }
}

/// Everything the dispatcher needs to run one command.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandPlan {
    /// Stable name for logs and notifications.
    pub label: &'static str,
    /// Optimistic changes, applied together.
    pub patches: Vec<PatchSpec>,
    /// Request confirming the changes.
    pub request: ApiRequest,
    /// How the response is folded back into the store.
    pub reconciler: Reconciler,
}

/// How a successful response is folded back into the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciler {
    /// The body is the authoritative value of `field` on `target` (`null` for an empty body).
    Field { target: EntityRef, field: Field },
    /// The body carries nothing of interest; optimistic values are committed as is.
    Commit,
    /// The body holds server attributes of `target`, merged when it is an object. The body's
    /// own `id` is ignored so the entity keeps its identity.
    Merge { target: EntityRef },
    /// The body is a freshly created entity, inserted on top of `list`.
    InsertEntity { kind: EntityKind, list: String },
}

impl Reconciler {
    /// Actions to dispatch for a successful response.
    pub fn into_actions(self, id: OperationId, response: Value) -> Vec<Action> {
        match self {
            Reconciler::Field { target, field } => vec![Action::Confirmed {
                id,
                payload: vec![EntityPayload::field(target, field, response)],
            }],
            Reconciler::Commit => vec![Action::Confirmed {
                id,
                payload: Vec::new(),
            }],
            Reconciler::Merge { target } => {
                let payload = match response {
                    Value::Object(mut attributes) => {
                        attributes.remove("id");
                        vec![EntityPayload::new(target, attributes)]
                    }
                    _ => Vec::new(),
                };
                vec![Action::Confirmed { id, payload }]
            }
            Reconciler::InsertEntity { kind, list } => {
                let mut actions = vec![Action::Confirmed {
                    id,
                    payload: Vec::new(),
                }];
                if let Value::Object(attributes) = response {
                    actions.push(Action::EntitiesLoaded {
                        kind,
                        entities: vec![attributes],
                        list: Some(ListUpdate {
                            key: list,
                            mode: ListMode::Prepend,
                            count: None,
                            next: None,
                        }),
                    });
                }
                actions
            }
        }
    }
}

fn require<'a>(state: &'a StoreState, target: &EntityRef) -> Result<&'a Entity, DispatchError> {
    state
        .entity(target)
        .ok_or_else(|| DispatchError::MissingEntity(target.clone()))
}

fn encode_error(request: &str, err: serde_json::Error) -> DispatchError {
    DispatchError::InvalidInput(format!("cannot encode body for `{request}`: {err}"))
}

/// Patches flipping a boolean flag, moving its counter only when the flag actually changes.
fn toggle(
    target: &EntityRef,
    flag: Field,
    counter: Field,
    current: bool,
    next: bool,
) -> Vec<PatchSpec> {
    let mut patches = vec![PatchSpec::set(target.clone(), flag, next)];
    if current != next {
        let delta = if next { 1 } else { -1 };
        patches.push(PatchSpec::increment(target.clone(), counter, delta));
    }
    patches
}

#[cfg(test)]
pub(crate) mod fixtures {
    use serde_json::{Map, Value, json};

    use crate::state::{Action, EntityKind, StoreState, reducer::reduce};

    pub fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected an object, got {other}"),
        }
    }

    pub fn load(state: StoreState, kind: EntityKind, items: Vec<Value>) -> StoreState {
        reduce(
            state,
            &Action::EntitiesLoaded {
                kind,
                entities: items.into_iter().map(object).collect(),
                list: None,
            },
        )
    }

    pub fn store_with_game(user_game: Value) -> StoreState {
        load(
            StoreState::default(),
            EntityKind::Game,
            vec![json!({"id": 7, "name": "Hades", "user_game": user_game, "added": 10})],
        )
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use uuid::Uuid;

    use super::*;

    #[test]
    fn restore_targets_previous_library_state() {
        assert_eq!(
            Command::restore_user_game(EntityId::Num(1), &Value::Null),
            Some(Command::RemoveGame {
                game: EntityId::Num(1)
            })
        );
        assert_eq!(
            Command::restore_user_game(EntityId::Num(1), &json!({"id": 3, "status": "playing"})),
            Some(Command::SetGameStatus {
                game: EntityId::Num(1),
                status: GameStatus::Playing
            })
        );
        assert_eq!(
            Command::restore_user_game(
                EntityId::Num(1),
                &json!({"id": 3, "status": "playing", "platforms": [4]})
            ),
            Some(Command::RestoreGame {
                game: EntityId::Num(1),
                status: GameStatus::Playing,
                platforms: vec![4],
            })
        );
        assert_eq!(Command::restore_user_game(EntityId::Num(1), &json!(true)), None);
    }

    #[test]
    fn field_reconciler_confirms_with_the_response() {
        let id = Uuid::new_v4();
        let actions = Reconciler::Field {
            target: EntityRef::game(1),
            field: Field::UserGame,
        }
        .into_actions(id, json!({"id": 9, "status": "owned"}));
        assert_eq!(
            actions,
            vec![Action::Confirmed {
                id,
                payload: vec![EntityPayload::field(
                    EntityRef::game(1),
                    Field::UserGame,
                    json!({"id": 9, "status": "owned"})
                )],
            }]
        );
    }

    #[test]
    fn merge_reconciler_keeps_entity_identity() {
        let id = Uuid::new_v4();
        let actions = Reconciler::Merge {
            target: EntityRef::user(1),
        }
        .into_actions(id, json!({"id": 880, "token_program": true, "balance": 50}));
        let Action::Confirmed { payload, .. } = &actions[0] else {
            panic!("expected a confirmation");
        };
        assert_eq!(payload[0].target, EntityRef::user(1));
        assert_eq!(payload[0].attributes.get("id"), None);
        assert_eq!(payload[0].attributes.get("balance"), Some(&json!(50)));
    }

    #[test]
    fn insert_reconciler_prepends_created_entity() {
        let id = Uuid::new_v4();
        let actions = Reconciler::InsertEntity {
            kind: EntityKind::Comment,
            list: "/games/1/comments".into(),
        }
        .into_actions(id, json!({"id": 55, "text": "hi"}));
        assert_eq!(actions.len(), 2);
        let Action::EntitiesLoaded { list: Some(list), .. } = &actions[1] else {
            panic!("expected a list insertion");
        };
        assert_eq!(list.mode, ListMode::Prepend);
        assert_eq!(list.key, "/games/1/comments");
    }

    #[test]
    fn toggle_moves_counter_only_on_change() {
        let target = EntityRef::review(1);
        assert_eq!(toggle(&target, Field::UserLike, Field::LikesCount, false, true).len(), 2);
        assert_eq!(toggle(&target, Field::UserLike, Field::LikesCount, true, true).len(), 1);
    }
}
