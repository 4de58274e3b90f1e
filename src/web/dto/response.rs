//! Response DTOs for the web API.

use serde::Serialize;

use crate::auth::IssuedToken;
use crate::store::{User, UserId};

/// Generic API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a new API response.
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Token grant returned by register and login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    /// Signed identity token.
    pub token: String,
    /// Always `"Bearer"`.
    pub token_type: &'static str,
    /// Expiry instant (RFC 3339).
    pub expires_at: String,
    /// Seconds until expiry.
    pub expires_in: u64,
    /// User information.
    pub user: UserInfo,
}

impl AuthResponse {
    /// Build a response for a freshly issued token.
    pub fn new(issued: IssuedToken, expires_in: u64, user: &User) -> Self {
        Self {
            token: issued.token,
            token_type: "Bearer",
            expires_at: issued.expires_at.to_rfc3339(),
            expires_in,
            user: UserInfo::from(user),
        }
    }
}

/// Public user information. Never carries the credential.
#[derive(Debug, Serialize)]
pub struct UserInfo {
    /// User ID.
    pub id: UserId,
    /// Username.
    pub username: String,
    /// Display name.
    pub display_name: String,
    /// Profile text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    /// Avatar URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
    /// Banner URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    /// Creator account flag.
    pub is_creator: bool,
    /// Verified badge.
    pub is_verified: bool,
    /// Account creation timestamp.
    pub created_at: String,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            display_name: user.display_name.clone(),
            bio: user.bio.clone(),
            profile_image: user.profile_image.clone(),
            cover_image: user.cover_image.clone(),
            is_creator: user.is_creator,
            is_verified: user.is_verified,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// Plain message response.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    /// Message text.
    pub message: String,
}

impl MessageResponse {
    /// Create a new message response.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
