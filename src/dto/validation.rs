//! Validation helpers for DTOs.

use validator::ValidationError;

const MAX_PLAYER_ID_LEN: usize = 64;

/// Validates an anonymous player id: 1 to 64 ASCII letters, digits, `-` or `_`.
///
/// # Examples
///
/// ```ignore
/// validate_player_id("player_f3a9")  // Ok
/// validate_player_id("")             // Err - empty
/// validate_player_id("bad id")       // Err - space
/// ```
pub fn validate_player_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > MAX_PLAYER_ID_LEN {
        let mut err = ValidationError::new("player_id_length");
        err.message = Some(
            format!(
                "Player ID must be 1 to {MAX_PLAYER_ID_LEN} characters (got {})",
                id.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        let mut err = ValidationError::new("player_id_format");
        err.message = Some("Player ID may only contain letters, digits, `-` and `_`".into());
        return Err(err);
    }

    Ok(())
}
