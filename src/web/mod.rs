//! Web API module for Kinship.
//!
//! This module exposes the authentication core over a JSON REST API:
//! registration, login, logout and the authenticated `me` endpoint.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use handlers::AppState;
pub use router::{create_health_router, create_router};
pub use server::WebServer;
