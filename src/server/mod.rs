//! HTTP surface: health check and the packaged-output routes.

use std::net::SocketAddr;
use std::time::Duration;

use abr_pack::Packager;
use anyhow::{Context, Result};
use axum::http::{header, Method};
use axum::routing::get;
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod error;
pub mod routes;

pub use error::AppError;

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub packager: Packager,
    /// Cancels packaging jobs started by requests when the server stops.
    pub shutdown: CancellationToken,
    /// How long a master playlist request waits on packaging.
    pub manifest_wait: Duration,
}

impl AppState {
    pub fn new(packager: Packager, shutdown: CancellationToken) -> Self {
        let manifest_wait = Duration::from_secs(packager.config().server.manifest_wait_secs);
        Self {
            packager,
            shutdown,
            manifest_wait,
        }
    }

    #[must_use]
    pub fn with_manifest_wait(mut self, wait: Duration) -> Self {
        self.manifest_wait = wait;
        self
    }
}

/// Build the router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::HEAD])
        .allow_headers([header::RANGE]);

    Router::new()
        .route("/health", get(routes::health))
        .route("/abr/:profile/:item_id/*path", get(routes::abr_file))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until a shutdown signal arrives or `shutdown` is cancelled.
pub async fn start_server(state: AppState) -> Result<()> {
    let server = &state.packager.config().server;
    let addr: SocketAddr = format!("{}:{}", server.host, server.port)
        .parse()
        .context("Invalid server address")?;

    let shutdown = state.shutdown.clone();
    let app = create_router(state);

    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    // Stop request-started packaging jobs with the server.
    shutdown.cancel();
    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = cancel.cancelled() => {},
    }

    tracing::info!("Shutdown signal received");
}
