use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Library entry bodies and statuses.
pub mod library;
/// User-facing notifications.
pub mod notification;
/// Rating input.
pub mod review;
/// Follow, like and comment bodies.
pub mod social;
/// Custom validators shared by the DTOs.
pub mod validation;

pub use self::library::{CreateUserGame, GameStatus, UpdateUserGame};
pub use self::notification::{Notification, NotificationLevel};
pub use self::review::RatingInput;
pub use self::social::{FollowRequest, LikeRequest, NewComment};

fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
