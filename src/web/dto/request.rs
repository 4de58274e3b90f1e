//! Request DTOs for the web API.

use serde::Deserialize;
use validator::Validate;

use super::validation::{display_name_field, username_field};

/// Login request.
#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    /// Username.
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    /// Password.
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// User registration request.
#[derive(Deserialize, Validate)]
pub struct RegisterRequest {
    /// Username.
    #[validate(custom(function = "username_field"))]
    pub username: String,
    /// Password.
    #[validate(length(
        min = 6,
        max = 128,
        message = "Password must be between 6 and 128 characters"
    ))]
    pub password: String,
    /// Display name.
    #[validate(custom(function = "display_name_field"))]
    pub display_name: String,
    /// Profile text.
    #[serde(default)]
    #[validate(length(max = 500, message = "Bio must be at most 500 characters"))]
    pub bio: Option<String>,
    /// Avatar URL.
    #[serde(default)]
    #[validate(url(message = "Profile image must be a URL"))]
    pub profile_image: Option<String>,
    /// Banner URL.
    #[serde(default)]
    #[validate(url(message = "Cover image must be a URL"))]
    pub cover_image: Option<String>,
    /// Whether the account publishes subscriber content.
    #[serde(default)]
    pub is_creator: bool,
}

// Passwords must never end up in logs through a derived Debug
impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("username", &self.username)
            .field("display_name", &self.display_name)
            .finish_non_exhaustive()
    }
}
