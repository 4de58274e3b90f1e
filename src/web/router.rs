//! Router configuration for the web API.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers::{login, logout, me, register, AppState};
use super::middleware::{
    api_rate_limit, create_cors_layer, require_auth, resolve_client_ip, security_headers,
    ApiRateLimiter, ClientIpConfig,
};
use crate::config::ServerConfig;

/// Create the main API router.
///
/// `api_limiter` is `None` when the general rate limit is disabled.
pub fn create_router(
    app_state: Arc<AppState>,
    config: &ServerConfig,
    api_limiter: Option<Arc<ApiRateLimiter>>,
) -> Router {
    // Auth routes (no authentication required)
    let auth_public_routes = Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout));

    // Auth routes (authentication required)
    let auth_protected_routes = Router::new()
        .route("/me", get(me))
        .route_layer(middleware::from_fn_with_state(
            app_state.tokens.clone(),
            require_auth,
        ));

    let auth_routes = Router::new()
        .merge(auth_public_routes)
        .merge(auth_protected_routes);

    let mut api_routes = Router::new().nest("/auth", auth_routes);
    if let Some(limiter) = api_limiter {
        api_routes = api_routes.layer(middleware::from_fn_with_state(limiter, api_rate_limit));
    }

    let client_ip_config = ClientIpConfig {
        trust_proxy_headers: config.trust_proxy_headers,
    };

    Router::new()
        .nest("/api", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(&config.cors_origins))
                .layer(middleware::from_fn(security_headers))
                .layer(middleware::from_fn_with_state(
                    client_ip_config,
                    resolve_client_ip,
                )),
        )
        .with_state(app_state)
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode};
    use http_body_util::BodyExt;
    use tower::util::ServiceExt;

    #[tokio::test]
    async fn test_health_check() {
        let response = create_health_router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"OK");
    }
}
