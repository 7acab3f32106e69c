use std::fmt;

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::state::EntityId;

/// Where a game sits in the user's library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    /// In the collection.
    Owned,
    /// Currently being played.
    Playing,
    /// Completed.
    Beaten,
    /// Abandoned.
    Dropped,
    /// Not played yet.
    Yet,
    /// On the wishlist.
    Toplay,
}

impl GameStatus {
    /// Every status, in display order.
    pub const ALL: [GameStatus; 6] = [
        GameStatus::Owned,
        GameStatus::Playing,
        GameStatus::Beaten,
        GameStatus::Dropped,
        GameStatus::Yet,
        GameStatus::Toplay,
    ];

    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            GameStatus::Owned => "owned",
            GameStatus::Playing => "playing",
            GameStatus::Beaten => "beaten",
            GameStatus::Dropped => "dropped",
            GameStatus::Yet => "yet",
            GameStatus::Toplay => "toplay",
        }
    }

    /// Status for a wire name, if it is one.
    pub fn from_name(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == value)
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of `POST /users/current/games`.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateUserGame {
    /// Game being added.
    pub game: EntityId,
    /// Initial library status.
    pub status: GameStatus,
    /// Platforms the game is owned on, when known up front.
    pub platforms: Option<Vec<u64>>,
}

/// Body of `PATCH /users/current/games/{id}`; absent fields are left untouched.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdateUserGame {
    /// New library status.
    pub status: Option<GameStatus>,
    /// Replacement platform ids.
    pub platforms: Option<Vec<u64>>,
}
