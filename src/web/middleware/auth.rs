//! Bearer token authentication middleware.

use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use thiserror::Error;

use crate::auth::TokenIssuer;
use crate::store::UserId;
use crate::web::error::ApiError;

/// Why a request could not be authenticated.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// No `Authorization` header was sent.
    #[error("No credential supplied")]
    MissingCredential,

    /// A credential was sent but did not verify.
    #[error("Credential rejected")]
    CredentialRejected,
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::unauthorized(err.to_string())
    }
}

/// The authenticated subject attached to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    /// Verified user ID.
    pub user_id: UserId,
}

/// Pull the bearer token out of the `Authorization` header.
///
/// Returns `Err(MissingCredential)` only when the header is absent. A header
/// with another scheme, an empty token or non-ASCII bytes counts as a
/// rejected credential.
pub fn extract_bearer(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingCredential)?
        .to_str()
        .map_err(|_| AuthError::CredentialRejected)?;

    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or(AuthError::CredentialRejected)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::CredentialRejected);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::CredentialRejected);
    }
    Ok(token)
}

/// Authenticate a request from its headers.
///
/// Verification is local: only the token signature and expiry are checked.
pub fn authenticate(headers: &HeaderMap, tokens: &TokenIssuer) -> Result<AuthUser, AuthError> {
    let token = extract_bearer(headers)?;
    let user_id = tokens.verify(token).map_err(|e| {
        tracing::debug!("Token rejected: {}", e);
        AuthError::CredentialRejected
    })?;
    Ok(AuthUser { user_id })
}

/// Middleware that rejects unauthenticated requests with 401 and attaches
/// [`AuthUser`] to the request extensions otherwise.
pub async fn require_auth(
    State(tokens): State<Arc<TokenIssuer>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let user = authenticate(request.headers(), &tokens)?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Only present when require_auth ran for this route
        parts
            .extensions
            .get::<AuthUser>()
            .copied()
            .ok_or_else(|| AuthError::MissingCredential.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, middleware, routing::get, Router};
    use std::time::Duration;
    use tower::util::ServiceExt;

    fn issuer() -> Arc<TokenIssuer> {
        Arc::new(TokenIssuer::new("middleware-secret", Duration::from_secs(3600)).unwrap())
    }

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value.parse().unwrap());
        headers
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer(&headers_with("Bearer abc")), Ok("abc"));
        assert_eq!(extract_bearer(&headers_with("bearer  abc ")), Ok("abc"));
        assert_eq!(
            extract_bearer(&HeaderMap::new()),
            Err(AuthError::MissingCredential)
        );
        assert_eq!(
            extract_bearer(&headers_with("Basic abc")),
            Err(AuthError::CredentialRejected)
        );
        assert_eq!(
            extract_bearer(&headers_with("Bearer")),
            Err(AuthError::CredentialRejected)
        );
        assert_eq!(
            extract_bearer(&headers_with("Bearer   ")),
            Err(AuthError::CredentialRejected)
        );
    }

    #[test]
    fn test_authenticate() {
        let tokens = issuer();
        let issued = tokens.issue(42).unwrap();

        let user = authenticate(&headers_with(&format!("Bearer {}", issued.token)), &tokens);
        assert_eq!(user, Ok(AuthUser { user_id: 42 }));

        assert_eq!(
            authenticate(&HeaderMap::new(), &tokens),
            Err(AuthError::MissingCredential)
        );
        assert_eq!(
            authenticate(&headers_with("Bearer not.a.token"), &tokens),
            Err(AuthError::CredentialRejected)
        );
    }

    #[test]
    fn test_authenticate_foreign_secret() {
        let other = TokenIssuer::new("other-secret", Duration::from_secs(3600)).unwrap();
        let issued = other.issue(1).unwrap();

        assert_eq!(
            authenticate(&headers_with(&format!("Bearer {}", issued.token)), &issuer()),
            Err(AuthError::CredentialRejected)
        );
    }

    async fn whoami(user: AuthUser) -> String {
        user.user_id.to_string()
    }

    fn app(tokens: Arc<TokenIssuer>) -> Router {
        Router::new()
            .route("/whoami", get(whoami))
            .layer(middleware::from_fn_with_state(tokens, require_auth))
    }

    #[tokio::test]
    async fn test_require_auth_attaches_user() {
        let tokens = issuer();
        let issued = tokens.issue(9).unwrap();

        let response = app(tokens)
            .oneshot(
                Request::builder()
                    .uri("/whoami")
                    .header(AUTHORIZATION, format!("Bearer {}", issued.token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_require_auth_short_circuits() {
        let response = app(issuer())
            .oneshot(Request::builder().uri("/whoami").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_extractor_without_middleware_fails_closed() {
        let app = Router::new().route("/whoami", get(whoami));

        let response = app
            .oneshot(Request::builder().uri("/whoami").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
