//! Client address resolution and the general API rate limit.

use axum::{
    async_trait,
    body::Body,
    extract::{ConnectInfo, FromRequestParts, State},
    http::{request::Parts, Extensions, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::{Clock, DefaultClock},
    DefaultKeyedRateLimiter, Quota, RateLimiter,
};
use std::{
    convert::Infallible,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
    time::Duration,
};

use crate::web::error::ApiError;

/// How the client address is resolved.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientIpConfig {
    /// Honour `X-Forwarded-For` and `X-Real-IP`.
    pub trust_proxy_headers: bool,
}

/// Resolved client address for the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

/// Address used when nothing better is known. All such requests share one
/// governor bucket.
pub const UNKNOWN_CLIENT: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    // First hop is the original client
    if let Some(forwarded) = headers
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(ip) = forwarded
            .split(',')
            .next()
            .and_then(|ip| ip.trim().parse().ok())
        {
            return Some(ip);
        }
    }

    headers
        .get("X-Real-IP")
        .and_then(|v| v.to_str().ok())
        .and_then(|ip| ip.trim().parse().ok())
}

/// Resolve the client address.
///
/// Proxy headers are only consulted when `trust_proxy_headers` is set,
/// otherwise a client could pick its own governor bucket.
pub fn client_ip(headers: &HeaderMap, extensions: &Extensions, config: ClientIpConfig) -> IpAddr {
    if config.trust_proxy_headers {
        if let Some(ip) = forwarded_ip(headers) {
            return ip;
        }
    }

    if let Some(ConnectInfo(addr)) = extensions.get::<ConnectInfo<SocketAddr>>() {
        return addr.ip();
    }

    UNKNOWN_CLIENT
}

/// Middleware that resolves the client address once and stores it as
/// [`ClientIp`] in the request extensions.
pub async fn resolve_client_ip(
    State(config): State<ClientIpConfig>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let ip = client_ip(req.headers(), req.extensions(), config);
    req.extensions_mut().insert(ClientIp(ip));
    next.run(req).await
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(ip) = parts.extensions.get::<ClientIp>() {
            return Ok(*ip);
        }
        Ok(ClientIp(client_ip(
            &parts.headers,
            &parts.extensions,
            ClientIpConfig::default(),
        )))
    }
}

/// Per-address limit on all API requests.
pub struct ApiRateLimiter {
    limiter: DefaultKeyedRateLimiter<IpAddr>,
    clock: DefaultClock,
}

impl ApiRateLimiter {
    /// Create a limiter allowing `requests_per_minute` per address.
    ///
    /// Returns `None` when the limit is zero (disabled).
    pub fn new(requests_per_minute: u32) -> Option<Self> {
        let quota = Quota::per_minute(NonZeroU32::new(requests_per_minute)?);
        Some(Self {
            limiter: RateLimiter::keyed(quota),
            clock: DefaultClock::default(),
        })
    }

    /// Check a request from `ip`; on rejection returns how long to wait.
    pub fn check(&self, ip: IpAddr) -> Result<(), Duration> {
        self.limiter
            .check_key(&ip)
            .map_err(|not_until| not_until.wait_time_from(self.clock.now()))
    }

    /// Drop state for addresses whose quota has fully replenished.
    pub fn cleanup(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    /// Number of tracked addresses.
    pub fn len(&self) -> usize {
        self.limiter.len()
    }

    /// Whether no address is tracked.
    pub fn is_empty(&self) -> bool {
        self.limiter.is_empty()
    }

    /// Start a background task to periodically clean up old entries.
    pub fn start_cleanup_task(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                self.cleanup();
            }
        })
    }
}

/// Rate limiting middleware for the general API.
pub async fn api_rate_limit(
    State(limiter): State<Arc<ApiRateLimiter>>,
    ClientIp(ip): ClientIp,
    req: Request<Body>,
    next: Next,
) -> Response {
    if let Err(wait) = limiter.check(ip) {
        tracing::warn!(ip = %ip, "API rate limit exceeded");
        return ApiError::too_many_requests("Too many requests. Please try again later.", wait)
            .into_response();
    }

    next.run(req).await
}
