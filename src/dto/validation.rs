//! Validation helpers for DTOs.

use validator::ValidationError;

/// Validates that a username is 3-50 characters of letters, digits, `_` or `-`.
///
/// # Examples
///
/// ```ignore
/// validate_username("space_cadet") // Ok
/// validate_username("no spaces")   // Err - invalid character
/// validate_username("ab")          // Err - too short
/// ```
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let length = username.chars().count();
    if !(3..=50).contains(&length) {
        let mut err = ValidationError::new("username_length");
        err.message = Some(format!("Username must be 3 to 50 characters (got {length})").into());
        return Err(err);
    }

    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        let mut err = ValidationError::new("username_format");
        err.message =
            Some("Username may only contain letters, digits, underscores and dashes".into());
        return Err(err);
    }

    Ok(())
}

/// Validates an ISO 4217 style currency code (three uppercase letters).
pub fn validate_currency(code: &str) -> Result<(), ValidationError> {
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("currency_format");
        err.message = Some("Currency must be three uppercase letters".into());
        Err(err)
    }
}

/// Validates that free-form tags are non-empty and at most 50 characters each.
pub fn validate_tags(tags: &[String]) -> Result<(), ValidationError> {
    if tags.len() > 20 {
        let mut err = ValidationError::new("tags_count");
        err.message = Some("At most 20 tags are allowed".into());
        return Err(err);
    }
    if tags
        .iter()
        .any(|tag| tag.trim().is_empty() || tag.chars().count() > 50)
    {
        let mut err = ValidationError::new("tag_length");
        err.message = Some("Tags must be 1 to 50 characters".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_username_valid() {
        assert!(validate_username("space_cadet").is_ok());
        assert!(validate_username("abc").is_ok());
        assert!(validate_username("player-1").is_ok());
    }

    #[test]
    fn test_validate_username_invalid() {
        assert!(validate_username("ab").is_err()); // too short
        assert!(validate_username("no spaces").is_err());
        assert!(validate_username("émile").is_err()); // non-ascii
    }

    #[test]
    fn test_validate_currency() {
        assert!(validate_currency("USD").is_ok());
        assert!(validate_currency("usd").is_err());
        assert!(validate_currency("US").is_err());
    }

    #[test]
    fn test_validate_tags() {
        assert!(validate_tags(&["coop".into(), "pvp".into()]).is_ok());
        assert!(validate_tags(&[" ".into()]).is_err());
    }
}
