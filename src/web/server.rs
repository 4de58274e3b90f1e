//! Web server for Kinship.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;

use crate::config::{Config, ServerConfig};
use crate::store::UserStore;
use crate::{KinshipError, Result};

use super::handlers::AppState;
use super::middleware::ApiRateLimiter;
use super::router::{create_health_router, create_router};

/// How often idle API rate limiter state is dropped.
const API_LIMITER_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Web server for the API.
pub struct WebServer {
    /// Server address.
    addr: SocketAddr,
    /// Application state.
    app_state: Arc<AppState>,
    /// General API rate limiter, if enabled.
    api_limiter: Option<Arc<ApiRateLimiter>>,
    /// Server configuration.
    server_config: ServerConfig,
    /// Interval between login attempt sweeps.
    sweep_interval: Duration,
}

impl WebServer {
    /// Create a new web server from validated configuration.
    pub fn new(config: &Config, store: Arc<dyn UserStore>) -> Result<Self> {
        let app_state = AppState::from_config(&config.auth, store)?;
        Self::with_state(
            &config.server,
            Arc::new(app_state),
            Duration::from_secs(config.auth.sweep_interval_secs),
        )
    }

    /// Create a web server around prepared application state.
    pub fn with_state(
        config: &ServerConfig,
        app_state: Arc<AppState>,
        sweep_interval: Duration,
    ) -> Result<Self> {
        let addr = format!("{}:{}", config.host, config.port)
            .parse()
            .map_err(|e| KinshipError::Config(format!("invalid server address: {e}")))?;

        Ok(Self {
            addr,
            app_state,
            api_limiter: ApiRateLimiter::new(config.api_rate_limit).map(Arc::new),
            server_config: config.clone(),
            sweep_interval,
        })
    }

    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Shared application state.
    pub fn app_state(&self) -> &Arc<AppState> {
        &self.app_state
    }

    /// Build the complete router: API routes plus health check.
    pub fn router(&self) -> Router {
        create_router(
            self.app_state.clone(),
            &self.server_config,
            self.api_limiter.clone(),
        )
        .merge(create_health_router())
    }

    fn start_background_tasks(&self) {
        self.app_state
            .governor
            .clone()
            .spawn_sweeper(self.sweep_interval);
        tracing::info!(
            interval_secs = self.sweep_interval.as_secs(),
            "Login attempt sweeper started"
        );

        if let Some(limiter) = &self.api_limiter {
            limiter
                .clone()
                .start_cleanup_task(API_LIMITER_CLEANUP_INTERVAL);
        }
    }

    async fn bind(&self) -> std::io::Result<(TcpListener, SocketAddr)> {
        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        // Start background tasks after successful bind
        self.start_background_tasks();
        tracing::info!("Web server listening on http://{}", local_addr);

        Ok((listener, local_addr))
    }

    /// Run the web server.
    pub async fn run(self) -> std::io::Result<()> {
        let (listener, _) = self.bind().await?;
        let router = self.router();

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
    }

    /// Run the server and return the actual bound address.
    ///
    /// This is useful for testing when binding to port 0.
    pub async fn run_with_addr(self) -> std::io::Result<SocketAddr> {
        let (listener, local_addr) = self.bind().await?;
        let router = self.router();

        tokio::spawn(async move {
            if let Err(e) = axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            {
                tracing::error!("Web server error: {}", e);
            }
        });

        Ok(local_addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryUserStore;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    fn create_test_config() -> Config {
        let mut config = Config::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 0; // Use random port
        config.auth.jwt_secret = "test-secret-key".to_string();
        config.auth.hash_memory_kib = 1024;
        config.auth.hash_iterations = 1;
        config
    }

    #[test]
    fn test_web_server_new() {
        let server =
            WebServer::new(&create_test_config(), Arc::new(MemoryUserStore::new())).unwrap();
        assert_eq!(server.addr().ip().to_string(), "127.0.0.1");
        assert!(server.api_limiter.is_some());
    }

    #[test]
    fn test_web_server_invalid_host() {
        let mut config = create_test_config();
        config.server.host = "not a host".to_string();

        let result = WebServer::new(&config, Arc::new(MemoryUserStore::new()));
        assert!(matches!(result, Err(KinshipError::Config(_))));
    }

    #[test]
    fn test_api_limit_disabled() {
        let mut config = create_test_config();
        config.server.api_rate_limit = 0;

        let server = WebServer::new(&config, Arc::new(MemoryUserStore::new())).unwrap();
        assert!(server.api_limiter.is_none());
    }

    #[tokio::test]
    async fn test_web_server_run() {
        let server =
            WebServer::new(&create_test_config(), Arc::new(MemoryUserStore::new())).unwrap();
        let addr = server.run_with_addr().await.unwrap();

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.ends_with("OK"));
    }
}
