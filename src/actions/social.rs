use crate::{
    dto::{FollowRequest, LikeRequest},
    error::DispatchError,
    gateway::ApiRequest,
    state::{EntityId, EntityKind, EntityRef, Field, StoreState},
};

use super::{CommandPlan, Reconciler, encode_error, require, toggle};

const FOLLOWING_PATH: &str = "/users/current/following";

pub(super) fn follow(
    state: &StoreState,
    target: &EntityRef,
    follow: bool,
) -> Result<CommandPlan, DispatchError> {
    if !matches!(target.kind, EntityKind::User | EntityKind::Collection) {
        return Err(DispatchError::InvalidInput(format!(
            "cannot follow a {}",
            target.kind
        )));
    }
    let entity = require(state, target)?;
    let current = entity.field(Field::Following).as_bool().unwrap_or(false);

    let collection_path = format!("{FOLLOWING_PATH}/{}", target.kind.path_segment());
    let request = if follow {
        ApiRequest::post(collection_path.as_str())
            .json(&FollowRequest {
                follow: target.id.clone(),
            })
            .map_err(|err| encode_error(&collection_path, err))?
    } else {
        ApiRequest::delete(format!("{collection_path}/{}", target.id))
    };

    Ok(CommandPlan {
        label: if follow { "follow" } else { "unfollow" },
        patches: toggle(target, Field::Following, Field::FollowersCount, current, follow),
        request,
        reconciler: Reconciler::Commit,
    })
}

pub(super) fn like_review(
    state: &StoreState,
    review: &EntityId,
    like: bool,
) -> Result<CommandPlan, DispatchError> {
    let target = EntityRef::review(review.clone());
    let path = format!("{}/likes", target.path());
    set_like(state, target, path, like, "like_review")
}

pub(super) fn like_comment(
    state: &StoreState,
    parent: &EntityRef,
    comment: &EntityId,
    like: bool,
) -> Result<CommandPlan, DispatchError> {
    let target = EntityRef::comment(comment.clone());
    let path = format!("{}/comments/{comment}/likes", parent.path());
    set_like(state, target, path, like, "like_comment")
}

fn set_like(
    state: &StoreState,
    target: EntityRef,
    path: String,
    like: bool,
    label: &'static str,
) -> Result<CommandPlan, DispatchError> {
    let entity = require(state, &target)?;
    let current = entity.field(Field::UserLike).as_bool().unwrap_or(false);

    let request = if like {
        ApiRequest::post(path.as_str())
            .json(&LikeRequest::default())
            .map_err(|err| encode_error(&path, err))?
    } else {
        ApiRequest::delete(path)
    };

    Ok(CommandPlan {
        label,
        patches: toggle(&target, Field::UserLike, Field::LikesCount, current, like),
        request,
        reconciler: Reconciler::Commit,
    })
}
