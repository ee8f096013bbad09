//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::state::room::RoomCode;

/// Validates that a room code is 3-16 ASCII alphanumerics (case is normalised later).
///
/// # Examples
///
/// ```ignore
/// validate_room_code("abc123") // Ok
/// validate_room_code("ab")     // Err - too short
/// validate_room_code("ab-12")  // Err - not alphanumeric
/// ```
pub fn validate_room_code(code: &str) -> Result<(), ValidationError> {
    RoomCode::parse(code).map(|_| ()).map_err(|err| {
        let mut error = ValidationError::new("room_code");
        error.message = Some(err.to_string().into());
        error
    })
}

/// Validates that a card code is non-blank and has no surrounding whitespace.
pub fn validate_card_code(code: &str) -> Result<(), ValidationError> {
    if code.is_empty() || code.trim() != code {
        let mut err = ValidationError::new("card_code");
        err.message = Some(format!("card code `{code}` is malformed").into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_room_code_valid() {
        assert!(validate_room_code("abc").is_ok());
        assert!(validate_room_code("ROOM42").is_ok());
        assert!(validate_room_code("abcdefghijklmnop").is_ok());
    }

    #[test]
    fn test_validate_room_code_invalid() {
        assert!(validate_room_code("ab").is_err()); // too short
        assert!(validate_room_code("abcdefghijklmnopq").is_err()); // too long
        assert!(validate_room_code("ab-12").is_err());
        assert!(validate_room_code("").is_err());
    }

    #[test]
    fn test_validate_card_code() {
        assert!(validate_card_code("CH-EMBER").is_ok());
        assert!(validate_card_code("").is_err());
        assert!(validate_card_code(" CH-EMBER").is_err());
    }
}
