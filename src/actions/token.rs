use crate::{
    error::DispatchError,
    gateway::ApiRequest,
    state::{EntityKind, EntityRef, Field, PatchSpec, StoreState},
};

use super::{CommandPlan, Reconciler, require};

const JOIN_PATH: &str = "/token/join";

pub(super) fn join(state: &StoreState, user: &EntityRef) -> Result<CommandPlan, DispatchError> {
    if user.kind != EntityKind::User {
        return Err(DispatchError::InvalidInput(format!(
            "only users can join the token program, got {user}"
        )));
    }
    let entity = require(state, user)?;
    if entity.field(Field::TokenProgram).as_bool() == Some(true) {
        return Err(DispatchError::InvalidInput(format!(
            "{user} already joined the token program"
        )));
    }

    Ok(CommandPlan {
        label: "join_token_program",
        patches: vec![PatchSpec::set(user.clone(), Field::TokenProgram, true)],
        request: ApiRequest::post(JOIN_PATH),
        reconciler: Reconciler::Merge {
            target: user.clone(),
        },
    })
}
