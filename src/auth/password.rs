//! Credential hashing for Kinship.
//!
//! Passwords are stored as Argon2id PHC strings. Each hash carries its own
//! random salt and the work-factor parameters it was created with, so
//! verification keeps working after the configured cost changes.

use std::fmt;
use std::sync::Arc;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand_core::OsRng;
use thiserror::Error;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Maximum password length.
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Password-related errors.
#[derive(Error, Debug)]
pub enum PasswordError {
    /// Password is too short.
    #[error("password must be at least {MIN_PASSWORD_LENGTH} characters")]
    TooShort,

    /// Password is too long.
    #[error("password must be at most {MAX_PASSWORD_LENGTH} characters")]
    TooLong,

    /// Hasher parameters are out of range.
    #[error("invalid hash parameters: {0}")]
    InvalidParams(String),

    /// Password hashing failed.
    #[error("password hashing failed: {0}")]
    HashError(String),
}

/// Argon2 work-factor parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of iterations.
    pub iterations: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl Default for HashParams {
    fn default() -> Self {
        Self {
            memory_kib: 19456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// A stored, hashed password.
///
/// Never holds plaintext. `Debug` output is redacted regardless.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a PHC string loaded from storage.
    pub fn from_stored(phc: impl Into<String>) -> Self {
        Self(phc.into())
    }

    /// The PHC string, for persisting.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Validate password length requirements.
///
/// # Examples
///
/// ```
/// use kinship::auth::validate_password;
///
/// assert!(validate_password("short").is_err());
/// assert!(validate_password("secret123").is_ok());
/// ```
pub fn validate_password(password: &str) -> Result<(), PasswordError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(PasswordError::TooShort);
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(PasswordError::TooLong);
    }
    Ok(())
}

/// Argon2id credential hasher with a fixed work factor.
#[derive(Clone)]
pub struct CredentialHasher {
    argon2: Argon2<'static>,
    params: HashParams,
}

impl fmt::Debug for CredentialHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialHasher")
            .field("params", &self.params)
            .finish()
    }
}

impl CredentialHasher {
    /// Create a hasher with the given work factor.
    pub fn new(params: HashParams) -> Result<Self, PasswordError> {
        let argon_params = Params::new(
            params.memory_kib,
            params.iterations,
            params.parallelism,
            None,
        )
        .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params),
            params,
        })
    }

    /// The configured work factor.
    pub fn params(&self) -> HashParams {
        self.params
    }

    /// Hash a password with a fresh random salt.
    ///
    /// # Examples
    ///
    /// ```
    /// use kinship::auth::{CredentialHasher, HashParams};
    ///
    /// let hasher = CredentialHasher::new(HashParams {
    ///     memory_kib: 1024,
    ///     iterations: 1,
    ///     parallelism: 1,
    /// })
    /// .unwrap();
    /// let credential = hasher.hash("secret123").unwrap();
    /// assert!(credential.as_str().starts_with("$argon2id$"));
    /// assert!(hasher.verify("secret123", &credential));
    /// ```
    pub fn hash(&self, password: &str) -> Result<Credential, PasswordError> {
        validate_password(password)?;

        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| PasswordError::HashError(e.to_string()))?;

        Ok(Credential(hash.to_string()))
    }

    /// Check a password against a stored credential.
    ///
    /// Returns `false` both for a wrong password and for a credential that
    /// cannot be parsed.
    pub fn verify(&self, password: &str, credential: &Credential) -> bool {
        let Ok(parsed) = PasswordHash::new(credential.as_str()) else {
            return false;
        };

        // Parameters come from the stored hash, not from this hasher
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }

    /// Hash on the blocking thread pool.
    pub async fn hash_offloaded(
        self: &Arc<Self>,
        password: String,
    ) -> Result<Credential, PasswordError> {
        let hasher = Arc::clone(self);
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| PasswordError::HashError(e.to_string()))?
    }

    /// Verify on the blocking thread pool.
    pub async fn verify_offloaded(self: &Arc<Self>, password: String, credential: Credential) -> bool {
        let hasher = Arc::clone(self);
        match tokio::task::spawn_blocking(move || hasher.verify(&password, &credential)).await {
            Ok(matched) => matched,
            Err(e) => {
                tracing::error!(error = %e, "Credential verification task failed");
                false
            }
        }
    }
}

#[cfg(test)]
pub(crate) fn test_hasher() -> CredentialHasher {
    CredentialHasher::new(HashParams {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    })
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_phc_argon2id() {
        let credential = test_hasher().hash("test_password").unwrap();

        assert!(credential.as_str().starts_with("$argon2id$"));
        assert!(credential.as_str().contains("$v=19$"));
        assert!(credential.as_str().contains("m=1024"));
        assert!(credential.as_str().contains("t=1"));
        assert!(credential.as_str().contains("p=1"));
    }

    #[test]
    fn test_same_password_different_credentials() {
        let hasher = test_hasher();
        let first = hasher.hash("same_password").unwrap();
        let second = hasher.hash("same_password").unwrap();

        assert_ne!(first, second);
        assert!(hasher.verify("same_password", &first));
        assert!(hasher.verify("same_password", &second));
    }

    #[test]
    fn test_verify_wrong_password() {
        let hasher = test_hasher();
        let credential = hasher.hash("correct_password").unwrap();

        assert!(!hasher.verify("wrong_password", &credential));
        assert!(!hasher.verify("", &credential));
    }

    #[test]
    fn test_verify_malformed_credential() {
        let hasher = test_hasher();
        assert!(!hasher.verify("any_password", &Credential::from_stored("not_a_valid_hash")));
        assert!(!hasher.verify("any_password", &Credential::from_stored("")));
    }

    #[test]
    fn test_verify_uses_stored_params() {
        let strong = CredentialHasher::new(HashParams {
            memory_kib: 2048,
            iterations: 2,
            parallelism: 1,
        })
        .unwrap();
        let credential = strong.hash("portable").unwrap();

        assert!(test_hasher().verify("portable", &credential));
    }

    #[test]
    fn test_hash_length_limits() {
        let hasher = test_hasher();
        assert!(matches!(hasher.hash("short"), Err(PasswordError::TooShort)));
        assert!(matches!(hasher.hash(""), Err(PasswordError::TooShort)));
        assert!(matches!(
            hasher.hash(&"a".repeat(129)),
            Err(PasswordError::TooLong)
        ));
        assert!(hasher.hash(&"a".repeat(128)).is_ok());
        assert!(hasher.hash("123456").is_ok());
    }

    #[test]
    fn test_unicode_and_special_chars() {
        let hasher = test_hasher();
        for password in ["パスワード123", "p@$$w0rd!#$%^&*()"] {
            let credential = hasher.hash(password).unwrap();
            assert!(hasher.verify(password, &credential));
        }
    }

    #[test]
    fn test_invalid_params() {
        let result = CredentialHasher::new(HashParams {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        });
        assert!(matches!(result, Err(PasswordError::InvalidParams(_))));
    }

    #[test]
    fn test_credential_debug_redacted() {
        let credential = test_hasher().hash("secret123").unwrap();
        let printed = format!("{credential:?}");
        assert_eq!(printed, "Credential(<redacted>)");
        assert!(!printed.contains("argon2"));
    }

    #[test]
    fn test_password_error_display() {
        assert_eq!(
            PasswordError::TooShort.to_string(),
            "password must be at least 6 characters"
        );
        assert_eq!(
            PasswordError::TooLong.to_string(),
            "password must be at most 128 characters"
        );
    }

    #[tokio::test]
    async fn test_offloaded_round_trip() {
        let hasher = Arc::new(test_hasher());
        let credential = hasher.hash_offloaded("secret123".to_string()).await.unwrap();

        assert!(hasher.verify_offloaded("secret123".to_string(), credential.clone()).await);
        assert!(!hasher.verify_offloaded("secret124".to_string(), credential).await);
    }

    #[tokio::test]
    async fn test_offloaded_hash_validates() {
        let hasher = Arc::new(test_hasher());
        let result = hasher.hash_offloaded("abc".to_string()).await;
        assert!(matches!(result, Err(PasswordError::TooShort)));
    }
}
