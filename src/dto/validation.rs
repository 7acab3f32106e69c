//! Validation helpers for request bodies.

use validator::ValidationError;

/// Longest comment the API accepts.
pub const MAX_COMMENT_LENGTH: usize = 2000;

/// Validates that a comment is not blank and fits [`MAX_COMMENT_LENGTH`] characters.
pub fn validate_comment_text(text: &str) -> Result<(), ValidationError> {
    if text.trim().is_empty() {
        let mut err = ValidationError::new("comment_blank");
        err.message = Some("Comment must not be blank".into());
        return Err(err);
    }

    let length = text.chars().count();
    if length > MAX_COMMENT_LENGTH {
        let mut err = ValidationError::new("comment_length");
        err.message = Some(
            format!("Comment must be at most {MAX_COMMENT_LENGTH} characters (got {length})")
                .into(),
        );
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_comment_text_valid() {
        assert!(validate_comment_text("Great game").is_ok());
        assert!(validate_comment_text(&"a".repeat(MAX_COMMENT_LENGTH)).is_ok());
    }

    #[test]
    fn test_validate_comment_text_blank() {
        assert!(validate_comment_text("").is_err());
        assert!(validate_comment_text("   \n").is_err());
    }

    #[test]
    fn test_validate_comment_text_too_long() {
        let err = validate_comment_text(&"é".repeat(MAX_COMMENT_LENGTH + 1)).unwrap_err();
        assert_eq!(err.code, "comment_length");
    }
}
