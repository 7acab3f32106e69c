use serde::Serialize;
use validator::Validate;

use crate::{dto::validation::validate_comment_text, state::EntityId};

/// Body of `POST /users/current/following/{users|collections}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FollowRequest {
    /// Id of the user or collection to follow.
    pub follow: EntityId,
}

/// Body of `POST /reviews/{id}/likes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LikeRequest {
    /// Always `true`; removing a like is a `DELETE`.
    pub positive: bool,
}

impl Default for LikeRequest {
    fn default() -> Self {
        Self { positive: true }
    }
}

/// Body of `POST /{parent}/{id}/comments`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Validate)]
pub struct NewComment {
    /// Comment body.
    #[validate(custom(function = "validate_comment_text"))]
    pub text: String,
}
