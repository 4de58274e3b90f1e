//! Input validation for Kinship account fields.

use thiserror::Error;

/// Minimum username length.
pub const MIN_USERNAME_LENGTH: usize = 3;

/// Maximum username length.
pub const MAX_USERNAME_LENGTH: usize = 32;

/// Maximum display name length (in characters).
pub const MAX_DISPLAY_NAME_LENGTH: usize = 50;

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Username is too short.
    #[error("username must be at least {MIN_USERNAME_LENGTH} characters")]
    UsernameTooShort,

    /// Username is too long.
    #[error("username must be at most {MAX_USERNAME_LENGTH} characters")]
    UsernameTooLong,

    /// Username contains invalid characters.
    #[error("username can only contain letters, digits, underscores and dots")]
    UsernameInvalidChars,

    /// Username is reserved.
    #[error("this username is reserved")]
    UsernameReserved,

    /// Display name is empty.
    #[error("display name cannot be empty")]
    DisplayNameEmpty,

    /// Display name is too long.
    #[error("display name must be at most {MAX_DISPLAY_NAME_LENGTH} characters")]
    DisplayNameTooLong,

    /// Display name contains control characters.
    #[error("display name contains invalid characters")]
    DisplayNameInvalidChars,
}

impl ValidationError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::UsernameTooShort => "username_too_short",
            ValidationError::UsernameTooLong => "username_too_long",
            ValidationError::UsernameInvalidChars => "username_invalid_chars",
            ValidationError::UsernameReserved => "username_reserved",
            ValidationError::DisplayNameEmpty => "display_name_empty",
            ValidationError::DisplayNameTooLong => "display_name_too_long",
            ValidationError::DisplayNameInvalidChars => "display_name_invalid_chars",
        }
    }
}

const RESERVED_USERNAMES: &[&str] = &[
    "admin",
    "administrator",
    "root",
    "system",
    "support",
    "moderator",
    "api",
    "me",
    "null",
    "undefined",
    "kinship",
];

/// Check if a username is reserved.
pub fn is_reserved_username(username: &str) -> bool {
    let lower = username.to_lowercase();
    RESERVED_USERNAMES.iter().any(|&r| r == lower)
}

/// Validate a username.
///
/// # Examples
///
/// ```
/// use kinship::auth::validation::validate_username;
///
/// assert!(validate_username("alice").is_ok());
/// assert!(validate_username("al").is_err());
/// assert!(validate_username("admin").is_err());
/// ```
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.len() < MIN_USERNAME_LENGTH {
        return Err(ValidationError::UsernameTooShort);
    }
    if username.len() > MAX_USERNAME_LENGTH {
        return Err(ValidationError::UsernameTooLong);
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    {
        return Err(ValidationError::UsernameInvalidChars);
    }
    if is_reserved_username(username) {
        return Err(ValidationError::UsernameReserved);
    }
    Ok(())
}

/// Validate a display name.
pub fn validate_display_name(display_name: &str) -> Result<(), ValidationError> {
    let trimmed = display_name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::DisplayNameEmpty);
    }
    if trimmed.chars().count() > MAX_DISPLAY_NAME_LENGTH {
        return Err(ValidationError::DisplayNameTooLong);
    }
    if trimmed.chars().any(char::is_control) {
        return Err(ValidationError::DisplayNameInvalidChars);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_usernames() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("bob_99").is_ok());
        assert!(validate_username("j.doe").is_ok());
        assert!(validate_username("abc").is_ok());
        assert!(validate_username(&"a".repeat(32)).is_ok());
    }

    #[test]
    fn test_username_length() {
        assert_eq!(validate_username("ab"), Err(ValidationError::UsernameTooShort));
        assert_eq!(
            validate_username(&"a".repeat(33)),
            Err(ValidationError::UsernameTooLong)
        );
    }

    #[test]
    fn test_username_chars() {
        assert_eq!(
            validate_username("al ice"),
            Err(ValidationError::UsernameInvalidChars)
        );
        assert_eq!(
            validate_username("alice!"),
            Err(ValidationError::UsernameInvalidChars)
        );
        assert_eq!(
            validate_username("ありすさん"),
            Err(ValidationError::UsernameInvalidChars)
        );
    }

    #[test]
    fn test_reserved_usernames() {
        assert_eq!(validate_username("admin"), Err(ValidationError::UsernameReserved));
        assert_eq!(validate_username("ROOT"), Err(ValidationError::UsernameReserved));
        assert!(!is_reserved_username("alice"));
    }

    #[test]
    fn test_display_name() {
        assert!(validate_display_name("Alice Liddell").is_ok());
        assert!(validate_display_name("アリス").is_ok());
        assert_eq!(validate_display_name("   "), Err(ValidationError::DisplayNameEmpty));
        assert_eq!(
            validate_display_name(&"x".repeat(51)),
            Err(ValidationError::DisplayNameTooLong)
        );
        assert_eq!(
            validate_display_name("bad\u{7}name"),
            Err(ValidationError::DisplayNameInvalidChars)
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(ValidationError::UsernameReserved.code(), "username_reserved");
        assert_eq!(ValidationError::DisplayNameEmpty.code(), "display_name_empty");
    }
}
