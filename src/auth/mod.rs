//! Authentication core for Kinship.
//!
//! This module provides credential hashing, identity tokens, the login
//! attempt governor, and account field validation.

pub mod governor;
mod password;
mod token;
pub mod validation;

pub use governor::{
    AttemptRecord, AttemptStore, AttemptStoreError, GovernorPolicy, LoginDecision, LoginGovernor,
    MemoryAttemptStore, DEFAULT_LOCKOUT_WINDOW_SECS, DEFAULT_MAX_LOGIN_FAILURES,
};
pub use password::{
    validate_password, Credential, CredentialHasher, HashParams, PasswordError,
    MAX_PASSWORD_LENGTH, MIN_PASSWORD_LENGTH,
};
#[cfg(test)]
pub(crate) use password::test_hasher;
pub use token::{
    Claims, IssuedToken, TokenError, TokenIssuer, DEFAULT_TOKEN_TTL_SECS,
    MAX_TOKEN_TTL_SECS,
};
pub use validation::ValidationError;
