//! User storage for Kinship.
//!
//! The authentication core only needs three operations from storage:
//! look a user up by username, look one up by id, and create one. They are
//! exposed through the [`UserStore`] trait; [`MemoryUserStore`] is the
//! in-process implementation.

mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::auth::Credential;

pub use memory::MemoryUserStore;

/// User identifier.
pub type UserId = i64;

/// Storage errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Username is already registered.
    #[error("username already taken")]
    UsernameTaken,

    /// Backend failure.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// A registered user.
#[derive(Debug, Clone)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Login username (unique, case-insensitive).
    pub username: String,
    /// Hashed password.
    pub credential: Credential,
    /// Name shown on posts and profiles.
    pub display_name: String,
    /// Profile text.
    pub bio: Option<String>,
    /// Avatar URL.
    pub profile_image: Option<String>,
    /// Profile banner URL.
    pub cover_image: Option<String>,
    /// Whether the user publishes subscriber content.
    pub is_creator: bool,
    /// Whether the account carries the verified badge.
    pub is_verified: bool,
    /// Account creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Data for creating a new user.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Login username.
    pub username: String,
    /// Already-hashed password.
    pub credential: Credential,
    /// Display name.
    pub display_name: String,
    /// Profile text.
    pub bio: Option<String>,
    /// Avatar URL.
    pub profile_image: Option<String>,
    /// Profile banner URL.
    pub cover_image: Option<String>,
    /// Creator account flag.
    pub is_creator: bool,
}

impl NewUser {
    /// Create a new user with the required fields.
    pub fn new(
        username: impl Into<String>,
        credential: Credential,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            credential,
            display_name: display_name.into(),
            bio: None,
            profile_image: None,
            cover_image: None,
            is_creator: false,
        }
    }

    /// Set the profile text.
    pub fn with_bio(mut self, bio: impl Into<String>) -> Self {
        self.bio = Some(bio.into());
        self
    }

    /// Set the avatar URL.
    pub fn with_profile_image(mut self, url: impl Into<String>) -> Self {
        self.profile_image = Some(url.into());
        self
    }

    /// Set the banner URL.
    pub fn with_cover_image(mut self, url: impl Into<String>) -> Self {
        self.cover_image = Some(url.into());
        self
    }

    /// Mark the account as a creator account.
    pub fn with_creator(mut self, is_creator: bool) -> Self {
        self.is_creator = is_creator;
        self
    }
}

/// Lookup and persistence of users.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Find a user by username (case-insensitive).
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Find a user by ID.
    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError>;

    /// Create a user.
    ///
    /// Fails with [`StoreError::UsernameTaken`] if the username exists; the
    /// check and the insert are atomic.
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;
}
