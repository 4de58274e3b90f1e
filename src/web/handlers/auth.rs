//! Authentication handlers.

use axum::{extract::State, http::StatusCode, Json};
use std::net::IpAddr;
use std::sync::Arc;

use crate::auth::{
    Credential, CredentialHasher, LoginDecision, LoginGovernor, PasswordError, TokenIssuer,
};
use crate::config::AuthConfig;
use crate::store::{NewUser, User, UserStore};
use crate::web::dto::{
    ApiResponse, AuthResponse, LoginRequest, MessageResponse, RegisterRequest, UserInfo,
    ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::middleware::{AuthUser, ClientIp};
use crate::{KinshipError, Result};

/// Response to any failed login. Never says which factor was wrong.
const INVALID_CREDENTIALS: &str = "Invalid username or password";

/// Hashed on startup so unknown usernames cost the same as wrong passwords.
const DUMMY_PASSWORD: &str = "kinship-timing-equalizer";

/// Application state shared across handlers.
pub struct AppState {
    /// User storage.
    pub store: Arc<dyn UserStore>,
    /// Password hasher.
    pub hasher: Arc<CredentialHasher>,
    /// Token issuer and verifier.
    pub tokens: Arc<TokenIssuer>,
    /// Login attempt governor.
    pub governor: Arc<LoginGovernor>,
    dummy_credential: Credential,
}

impl AppState {
    /// Create a new application state.
    pub fn new(
        store: Arc<dyn UserStore>,
        hasher: Arc<CredentialHasher>,
        tokens: Arc<TokenIssuer>,
        governor: Arc<LoginGovernor>,
    ) -> std::result::Result<Self, PasswordError> {
        let dummy_credential = hasher.hash(DUMMY_PASSWORD)?;
        Ok(Self {
            store,
            hasher,
            tokens,
            governor,
            dummy_credential,
        })
    }

    /// Build the auth components from configuration.
    pub fn from_config(config: &AuthConfig, store: Arc<dyn UserStore>) -> Result<Self> {
        let hasher = CredentialHasher::new(config.hash_params())
            .map_err(|e| KinshipError::Config(e.to_string()))?;
        let tokens = TokenIssuer::new(&config.jwt_secret, config.token_ttl())
            .map_err(|e| KinshipError::Config(e.to_string()))?;
        let governor = LoginGovernor::in_memory(config.governor_policy());

        Self::new(
            store,
            Arc::new(hasher),
            Arc::new(tokens),
            Arc::new(governor),
        )
        .map_err(|e| KinshipError::Config(e.to_string()))
    }

    fn grant(&self, user: &User) -> std::result::Result<AuthResponse, ApiError> {
        let issued = self.tokens.issue(user.id)?;
        Ok(AuthResponse::new(issued, self.tokens.ttl().as_secs(), user))
    }

    async fn ensure_not_locked(&self, ip: IpAddr) -> std::result::Result<(), ApiError> {
        match self.governor.check_allowed(ip).await {
            LoginDecision::Allow => Ok(()),
            LoginDecision::Reject { retry_after } => Err(ApiError::too_many_requests(
                "Too many failed login attempts. Please try again later.",
                retry_after,
            )),
        }
    }

    async fn record(&self, ip: IpAddr, succeeded: bool) {
        if let Err(e) = self.governor.record_attempt(ip, succeeded).await {
            tracing::error!(ip = %ip, error = %e, "Failed to record login attempt");
        }
    }
}

/// POST /api/auth/register - Create an account and sign in.
pub async fn register(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> std::result::Result<(StatusCode, Json<ApiResponse<AuthResponse>>), ApiError> {
    state.ensure_not_locked(ip).await?;

    // Cheap check before hashing; create_user still enforces uniqueness
    if state.store.find_user_by_username(&req.username).await?.is_some() {
        return Err(ApiError::conflict("Username already taken"));
    }

    let credential = state.hasher.hash_offloaded(req.password).await?;

    let mut new_user = NewUser::new(req.username, credential, req.display_name.trim())
        .with_creator(req.is_creator);
    if let Some(bio) = req.bio {
        new_user = new_user.with_bio(bio);
    }
    if let Some(url) = req.profile_image {
        new_user = new_user.with_profile_image(url);
    }
    if let Some(url) = req.cover_image {
        new_user = new_user.with_cover_image(url);
    }

    let user = state.store.create_user(new_user).await?;
    tracing::info!(user_id = user.id, username = %user.username, ip = %ip, "User registered");

    let response = state.grant(&user)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(response))))
}

/// POST /api/auth/login - User login.
///
/// The lockout check and the recording of the outcome are separate store
/// calls. Failed attempts already in flight when an address reaches the
/// limit are each checked before any of them is recorded, so the count can
/// briefly overshoot `max_failures`; every failure is still counted.
pub async fn login(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> std::result::Result<Json<ApiResponse<AuthResponse>>, ApiError> {
    state.ensure_not_locked(ip).await?;

    let user = state.store.find_user_by_username(&req.username).await?;

    let user = match user {
        Some(user) => {
            let matched = state
                .hasher
                .verify_offloaded(req.password, user.credential.clone())
                .await;
            matched.then_some(user)
        }
        None => {
            state
                .hasher
                .verify_offloaded(req.password, state.dummy_credential.clone())
                .await;
            None
        }
    };

    let Some(user) = user else {
        state.record(ip, false).await;
        tracing::warn!(username = %req.username, ip = %ip, "Login failed");
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    };

    state.record(ip, true).await;
    tracing::info!(user_id = user.id, username = %user.username, ip = %ip, "User logged in");

    Ok(Json(ApiResponse::new(state.grant(&user)?)))
}

/// POST /api/auth/logout - Acknowledge a logout.
///
/// Tokens are not revoked server-side; the client discards its token and
/// the token stays valid until it expires.
pub async fn logout() -> Json<ApiResponse<MessageResponse>> {
    Json(ApiResponse::new(MessageResponse::new("Logged out")))
}

/// GET /api/auth/me - Get the authenticated user.
pub async fn me(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
) -> std::result::Result<Json<ApiResponse<UserInfo>>, ApiError> {
    let user = state
        .store
        .find_user_by_id(auth_user.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(ApiResponse::new(UserInfo::from(&user))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{test_hasher, GovernorPolicy};
    use crate::store::MemoryUserStore;
    use std::time::Duration;

    fn state() -> AppState {
        AppState::new(
            Arc::new(MemoryUserStore::new()),
            Arc::new(test_hasher()),
            Arc::new(TokenIssuer::new("handler-secret", Duration::from_secs(3600)).unwrap()),
            Arc::new(LoginGovernor::in_memory(GovernorPolicy::default())),
        )
        .unwrap()
    }

    #[test]
    fn test_dummy_credential_is_real_hash() {
        let state = state();
        assert!(state.dummy_credential.as_str().starts_with("$argon2id$"));
        assert!(!state.hasher.verify("secret123", &state.dummy_credential));
    }

    #[test]
    fn test_from_config_rejects_empty_secret() {
        let config = AuthConfig::default();
        let result = AppState::from_config(&config, Arc::new(MemoryUserStore::new()));
        assert!(matches!(result, Err(KinshipError::Config(_))));
    }

    #[tokio::test]
    async fn test_grant_matches_ttl() {
        let state = state();
        let user = state
            .store
            .create_user(NewUser::new(
                "alice",
                Credential::from_stored("$argon2id$placeholder"),
                "Alice",
            ))
            .await
            .unwrap();

        let response = state.grant(&user).unwrap();
        assert_eq!(response.expires_in, 3600);
        assert_eq!(state.tokens.verify(&response.token).unwrap(), user.id);
    }

    #[tokio::test]
    async fn test_locked_address_is_rejected() {
        let state = state();
        let ip = IpAddr::from([192, 0, 2, 1]);

        for _ in 0..5 {
            state.record(ip, false).await;
        }

        let err = state.ensure_not_locked(ip).await.unwrap_err();
        assert_eq!(err.code(), crate::web::error::ErrorCode::TooManyRequests);
    }
}
