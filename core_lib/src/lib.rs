//! Core library for the file-lite server: sandboxed file operations, transfer
//! streaming, token auth and the HTTP surface that exposes them.

pub mod auth;
pub mod config;
pub mod error;
pub mod extractors;
pub mod files;
pub mod handlers;
pub mod middleware;
pub mod sandbox;
pub mod sanitize;
pub mod transfer;

pub use auth::{AuthGuard, AuthPolicy, AuthService, GuardStatus};
pub use config::AppConfig;
pub use error::{AppError, Result};
pub use files::FileManager;
pub use handlers::create_routes;
pub use middleware::RateLimiter;
pub use sandbox::Sandbox;

use axum::{middleware as axum_middleware, Router};
use axum_server::{tls_rustls::RustlsConfig, Handle};
use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};
use tokio::signal;
use tracing::{info, warn};

pub const APP_NAME: &str = "file-lite";

#[derive(Clone)]
pub struct AppState {
    pub app_name: String,
    pub version: String,
    pub config: Arc<AppConfig>,
    pub file_manager: FileManager,
    pub auth: AuthService,
    pub rate_limiter: RateLimiter,
    pub upload_dir: PathBuf,
}

impl AppState {
    pub fn new(config: AppConfig, sandbox: Sandbox, auth: AuthService) -> Self {
        let file_manager = FileManager::new(sandbox.with_legacy_prefix_match(config.files.legacy_prefix_match))
            .with_max_walk_depth(config.files.max_walk_depth);

        Self {
            app_name: APP_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            rate_limiter: RateLimiter::from_config(&config.rate_limit),
            upload_dir: config.upload_dir(),
            file_manager,
            auth,
            config: Arc::new(config),
        }
    }

    /// Resolves the sandbox root against the working directory and builds the
    /// auth service around `token`.
    pub fn from_config(config: AppConfig, token: impl Into<Arc<str>>) -> Result<Self> {
        let sandbox = Sandbox::from_root(config.sandbox_root()?);
        let auth = AuthService::from_config(&config.auth, token);
        Ok(Self::new(config, sandbox, auth))
    }

    pub fn with_rate_limiter(mut self, rate_limiter: RateLimiter) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    pub fn with_auth(mut self, auth: AuthService) -> Self {
        self.auth = auth;
        self
    }

    pub fn sandbox(&self) -> &Sandbox {
        self.file_manager.sandbox()
    }
}

pub fn create_app(state: AppState) -> Router {
    let router = create_routes(state.clone()).layer(axum_middleware::from_fn_with_state(
        state.rate_limiter.clone(),
        middleware::rate_limit_middleware,
    ));

    middleware::with_request_tracing(router, &state.config.logging).with_state(state)
}

/// URLs a browser can open, with the token appended when auth is on.
pub fn access_urls(config: &AppConfig, token: Option<&str>) -> Vec<String> {
    let scheme = if config.tls_paths().is_some() { "https" } else { "http" };
    let hosts = match config.server.host.as_str() {
        "0.0.0.0" | "::" => vec!["127.0.0.1".to_string(), config.server.host.clone()],
        host => vec![host.to_string()],
    };

    hosts
        .into_iter()
        .map(|host| {
            let host = if host.contains(':') { format!("[{}]", host) } else { host };
            match token {
                Some(token) => format!(
                    "{}://{}:{}/?auth={}",
                    scheme,
                    host,
                    config.server.port,
                    urlencoding::encode(token)
                ),
                None => format!("{}://{}:{}/", scheme, host, config.server.port),
            }
        })
        .collect()
}

pub async fn run_server(app: Router, config: &AppConfig) -> Result<()> {
    let addr = tokio::net::lookup_host(config.bind_address())
        .await?
        .next()
        .ok_or_else(|| anyhow::anyhow!("bind address {} did not resolve", config.bind_address()))?;

    let handle = Handle::new();
    tokio::spawn(shutdown_signal(handle.clone()));

    let service = app.into_make_service_with_connect_info::<SocketAddr>();

    match config.tls_paths() {
        Some((cert, key)) => {
            info!(cert = %cert.display(), key = %key.display(), "using tls certificate");
            let tls_config = RustlsConfig::from_pem_file(&cert, &key).await?;
            info!("Starting HTTPS server on {}", addr);
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(service)
                .await?;
        }
        None => {
            info!("Starting HTTP server on {}", addr);
            axum_server::bind(addr).handle(handle).serve(service).await?;
        }
    }

    Ok(())
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }

    handle.graceful_shutdown(Some(Duration::from_secs(10)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_urls_for_wildcard_host() {
        let config = AppConfig::default();
        assert_eq!(
            access_urls(&config, Some("ab12cd34")),
            vec![
                "http://127.0.0.1:3100/?auth=ab12cd34".to_string(),
                "http://0.0.0.0:3100/?auth=ab12cd34".to_string(),
            ]
        );
    }

    #[test]
    fn test_access_urls_without_auth() {
        let mut config = AppConfig::default();
        config.server.host = "192.168.1.20".to_string();
        config.server.port = 8080;
        assert_eq!(access_urls(&config, None), vec!["http://192.168.1.20:8080/".to_string()]);
    }

    #[test]
    fn test_state_from_config_applies_file_settings() {
        let mut config = AppConfig::default();
        config.files.safe_base_dir = "/srv/share".to_string();
        config.files.max_walk_depth = 8;

        let state = AppState::from_config(config, "token").unwrap();
        assert_eq!(state.sandbox().root(), Some("/srv/share"));
        assert_eq!(state.file_manager.max_walk_depth(), 8);
        assert_eq!(state.auth.token(), "token");
        assert_eq!(state.app_name, APP_NAME);
    }
}
