//! Middleware for the web API.

pub mod auth;
pub mod cors;
pub mod rate_limit;
pub mod security;

pub use auth::{authenticate, extract_bearer, require_auth, AuthError, AuthUser};
pub use cors::create_cors_layer;
pub use rate_limit::{
    api_rate_limit, client_ip, resolve_client_ip, ApiRateLimiter, ClientIp, ClientIpConfig,
};
pub use security::security_headers;
