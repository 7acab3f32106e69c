use serde::Serialize;
use validator::Validate;

/// Body of `POST /games/{id}/reviews`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Validate)]
pub struct RatingInput {
    /// Score from 1 to 5.
    #[validate(range(min = 1, max = 5, message = "rating must be between 1 and 5"))]
    pub rating: u8,
}
