//! Kinship - authentication core for the Kinship social network
//!
//! Credential hashing, signed identity tokens, a per-address login governor
//! and bearer-token request authentication, served over a JSON API.

pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod store;
pub mod web;

pub use auth::{
    Credential, CredentialHasher, GovernorPolicy, HashParams, LoginDecision, LoginGovernor,
    TokenIssuer,
};
pub use config::Config;
pub use error::{KinshipError, Result};
pub use store::{MemoryUserStore, User, UserId, UserStore};
pub use web::WebServer;
