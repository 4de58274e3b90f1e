//! In-process user store.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use super::{NewUser, StoreError, User, UserId, UserStore};

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<UserId, User>,
    by_username: HashMap<String, UserId>,
    next_id: UserId,
}

/// User store backed by in-memory maps.
///
/// IDs are assigned sequentially starting at 1.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    inner: RwLock<Inner>,
}

impl MemoryUserStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered users.
    pub fn len(&self) -> usize {
        self.inner.read().map(|inner| inner.users.len()).unwrap_or(0)
    }

    /// Whether no user is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn username_key(username: &str) -> String {
    username.to_lowercase()
}

fn poisoned() -> StoreError {
    StoreError::Backend("user store lock poisoned".to_string())
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.read().map_err(|_| poisoned())?;
        Ok(inner
            .by_username
            .get(&username_key(username))
            .and_then(|id| inner.users.get(id))
            .cloned())
    }

    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let inner = self.inner.read().map_err(|_| poisoned())?;
        Ok(inner.users.get(&id).cloned())
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut inner = self.inner.write().map_err(|_| poisoned())?;

        let key = username_key(&new_user.username);
        if inner.by_username.contains_key(&key) {
            return Err(StoreError::UsernameTaken);
        }

        inner.next_id += 1;
        let user = User {
            id: inner.next_id,
            username: new_user.username,
            credential: new_user.credential,
            display_name: new_user.display_name,
            bio: new_user.bio,
            profile_image: new_user.profile_image,
            cover_image: new_user.cover_image,
            is_creator: new_user.is_creator,
            is_verified: false,
            created_at: Utc::now(),
        };

        inner.by_username.insert(key, user.id);
        inner.users.insert(user.id, user.clone());
        debug!(user_id = user.id, "Stored new user");

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Credential;
    use std::sync::Arc;

    fn new_user(username: &str) -> NewUser {
        NewUser::new(
            username,
            Credential::from_stored("$argon2id$placeholder"),
            "Display",
        )
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let store = MemoryUserStore::new();
        let user = store
            .create_user(
                new_user("alice")
                    .with_bio("hello")
                    .with_profile_image("https://img/a.png")
                    .with_cover_image("https://img/c.png")
                    .with_creator(true),
            )
            .await
            .unwrap();

        assert_eq!(user.id, 1);
        assert_eq!(user.bio.as_deref(), Some("hello"));
        assert_eq!(user.profile_image.as_deref(), Some("https://img/a.png"));
        assert_eq!(user.cover_image.as_deref(), Some("https://img/c.png"));
        assert!(user.is_creator);
        assert!(!user.is_verified);

        let by_name = store.find_user_by_username("alice").await.unwrap().unwrap();
        assert_eq!(by_name.id, 1);
        let by_id = store.find_user_by_id(1).await.unwrap().unwrap();
        assert_eq!(by_id.username, "alice");
    }

    #[tokio::test]
    async fn test_sequential_ids() {
        let store = MemoryUserStore::new();
        let first = store.create_user(new_user("alice")).await.unwrap();
        let second = store.create_user(new_user("bob")).await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_username_case_insensitive() {
        let store = MemoryUserStore::new();
        store.create_user(new_user("Alice")).await.unwrap();

        assert!(store.find_user_by_username("ALICE").await.unwrap().is_some());
        assert_eq!(
            store.create_user(new_user("alice")).await.unwrap_err(),
            StoreError::UsernameTaken
        );
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_user() {
        let store = MemoryUserStore::new();
        assert!(store.is_empty());
        assert!(store.find_user_by_username("nobody").await.unwrap().is_none());
        assert!(store.find_user_by_id(99).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_duplicate_registration() {
        let store = Arc::new(MemoryUserStore::new());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.create_user(new_user("race")).await })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                created += 1;
            }
        }

        assert_eq!(created, 1);
        assert_eq!(store.len(), 1);
    }
}
