use validator::Validate;

use crate::{
    dto::NewComment,
    error::DispatchError,
    gateway::ApiRequest,
    state::{EntityKind, EntityRef, Field, PatchSpec, StoreState},
};

use super::{CommandPlan, Reconciler, encode_error, require};

/// List key holding the comments of `parent`; matches the listing path.
pub fn comments_list(parent: &EntityRef) -> String {
    format!("{}/comments", parent.path())
}

pub(super) fn post(
    state: &StoreState,
    parent: &EntityRef,
    text: &str,
) -> Result<CommandPlan, DispatchError> {
    if matches!(parent.kind, EntityKind::Comment | EntityKind::User) {
        return Err(DispatchError::InvalidInput(format!(
            "cannot comment on a {}",
            parent.kind
        )));
    }
    let body = NewComment {
        text: text.to_string(),
    };
    body.validate()?;
    require(state, parent)?;

    let path = comments_list(parent);
    let request = ApiRequest::post(path.as_str())
        .json(&body)
        .map_err(|err| encode_error(&path, err))?;

    Ok(CommandPlan {
        label: "post_comment",
        patches: vec![PatchSpec::increment(parent.clone(), Field::CommentsCount, 1)],
        request,
        reconciler: Reconciler::InsertEntity {
            kind: EntityKind::Comment,
            list: path,
        },
    })
}
