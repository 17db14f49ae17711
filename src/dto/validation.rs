//! Validation helpers for DTOs.

use validator::ValidationError;

/// Validates that a player identifier is 1 to 64 characters drawn from
/// letters, digits, `-` and `_`.
pub fn validate_player_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > 64 {
        let mut err = ValidationError::new("player_id_length");
        err.message =
            Some(format!("Player ID must be 1 to 64 characters (got {})", id.len()).into());
        return Err(err);
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        let mut err = ValidationError::new("player_id_format");
        err.message =
            Some("Player ID must contain only letters, digits, '-' or '_'".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a display name is 1 to 32 characters with no control characters.
pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.chars().count() > 32 {
        let mut err = ValidationError::new("display_name_length");
        err.message = Some("Display name must be 1 to 32 characters".into());
        return Err(err);
    }

    if trimmed.chars().any(char::is_control) {
        let mut err = ValidationError::new("display_name_format");
        err.message = Some("Display name must not contain control characters".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_player_id_valid() {
        assert!(validate_player_id("player-1").is_ok());
        assert!(validate_player_id("bot_42").is_ok());
        assert!(validate_player_id("a").is_ok());
    }

    #[test]
    fn test_validate_player_id_invalid() {
        assert!(validate_player_id("").is_err());
        assert!(validate_player_id(&"x".repeat(65)).is_err());
        assert!(validate_player_id("has space").is_err());
        assert!(validate_player_id("éclair").is_err());
    }

    #[test]
    fn test_validate_display_name_valid() {
        assert!(validate_display_name("Alice").is_ok());
        assert!(validate_display_name("  Bob  ").is_ok()); // trimmed
        assert!(validate_display_name("Zoé").is_ok());
    }

    #[test]
    fn test_validate_display_name_invalid() {
        assert!(validate_display_name("").is_err());
        assert!(validate_display_name("   ").is_err());
        assert!(validate_display_name(&"x".repeat(33)).is_err());
        assert!(validate_display_name("bad\nname").is_err());
    }
}
