//! Web layer module
//!
//! Thin axum handlers over the language-pack and marketing services.
//!
//! - **Handlers**: request handlers organized by domain
//! - **Responses**: response bodies and error-to-status mapping
//! - **Middleware**: request logging

use anyhow::Result;
use axum::{
    Router,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::{config::Config, language::LanguagePackService, marketing::MarketingService};

pub mod handlers;
pub mod middleware;
pub mod responses;

pub use responses::{StatusResponse, handle_error, webhook_outcome};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub language: LanguagePackService,
    pub marketing: Arc<MarketingService>,
}

/// Web server configuration and setup
pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(state: AppState) -> Result<Self> {
        let addr: SocketAddr =
            format!("{}:{}", state.config.web.host, state.config.web.port).parse()?;
        let app = create_router(state);
        Ok(Self { app, addr })
    }

    /// Serve until SIGTERM/SIGINT, reporting bind success or failure first
    pub async fn serve_with_signal(
        self,
        ready_signal: tokio::sync::oneshot::Sender<Result<()>>,
    ) -> Result<()> {
        let listener = match tokio::net::TcpListener::bind(&self.addr).await {
            Ok(listener) => listener,
            Err(e) => {
                let message = format!("Failed to bind {}: {}", self.addr, e);
                let _ = ready_signal.send(Err(anyhow::anyhow!("{}", message)));
                return Err(anyhow::anyhow!("{}", message));
            }
        };
        let _ = ready_signal.send(Ok(()));

        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

/// Build the router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let hook = state.config.web.hook_path.clone();

    Router::new()
        // Platform probes
        .route("/_/health", get(handlers::health::probe))
        .route("/_/check", get(handlers::health::probe))
        .route("/_/metrics", get(handlers::health::probe))
        // Language pack
        .route("/language", get(handlers::language::full_table))
        .route("/language/{phone}", get(handlers::language::single_phone))
        // Marketing webhooks
        .route(
            &format!("/{hook}/consent"),
            post(handlers::marketing::consent),
        )
        .route(
            &format!("/{hook}/feedback"),
            post(handlers::marketing::feedback),
        )
        .route(
            &format!("/{hook}/tracking/{{target}}"),
            post(handlers::marketing::tracking),
        )
        .route("/tracking/bulk", post(handlers::marketing::bulk_tracking))
        .route("/comparetime", post(handlers::marketing::compare_time))
        .layer(axum::middleware::from_fn(
            middleware::request_logging_middleware,
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down gracefully"),
                    _ = sigint.recv() => tracing::info!("Received SIGINT, shutting down gracefully"),
                }
            }
            _ => {
                tracing::warn!("Failed to install signal handlers, falling back to Ctrl+C");
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Received Ctrl+C, shutting down gracefully");
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl+C, shutting down gracefully");
        }
    }
}
