use serde_json::{Map, Value};
use validator::Validate;

use crate::{
    dto::RatingInput,
    error::DispatchError,
    gateway::ApiRequest,
    state::{EntityId, EntityRef, Field, PatchSpec, StoreState, Update},
};

use super::{CommandPlan, Reconciler, encode_error, require};

pub(super) fn rate(
    state: &StoreState,
    game: &EntityId,
    rating: u8,
) -> Result<CommandPlan, DispatchError> {
    let body = RatingInput { rating };
    body.validate()?;

    let target = EntityRef::game(game.clone());
    let entity = require(state, &target)?;
    let path = format!("{}/reviews", target.path());
    let request = ApiRequest::post(path.as_str())
        .json(&body)
        .map_err(|err| encode_error(&path, err))?;

    let mut keys = Map::new();
    keys.insert("rating".into(), Value::from(rating));
    let mut patches = vec![PatchSpec::new(
        target.clone(),
        Field::UserReview,
        Update::Merge(keys),
    )];
    if entity.field(Field::UserReview).is_null() {
        patches.push(PatchSpec::increment(target.clone(), Field::RatingsCount, 1));
    }

    Ok(CommandPlan {
        label: "rate_game",
        patches,
        request,
        reconciler: Reconciler::Field {
            target,
            field: Field::UserReview,
        },
    })
}

pub(super) fn remove_rating(
    state: &StoreState,
    game: &EntityId,
) -> Result<CommandPlan, DispatchError> {
    let target = EntityRef::game(game.clone());
    let entity = require(state, &target)?;
    let review = entity
        .field(Field::UserReview)
        .get("id")
        .and_then(EntityId::from_value)
        .ok_or_else(|| {
            DispatchError::InvalidInput(format!("game `{game}` has no saved rating"))
        })?;

    Ok(CommandPlan {
        label: "remove_rating",
        patches: vec![
            PatchSpec::set(target.clone(), Field::UserReview, Value::Null),
            PatchSpec::increment(target.clone(), Field::RatingsCount, -1),
        ],
        request: ApiRequest::delete(EntityRef::review(review).path()),
        reconciler: Reconciler::Field {
            target,
            field: Field::UserReview,
        },
    })
}
