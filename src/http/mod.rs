//! HTTP API Module
//!
//! Thin axum adapters over the core: submission intake, sequence and
//! program lookup/search, program evaluation, and admin endpoints. The
//! router carries one shared `AppState`; request handling stays
//! synchronous over the core operations, with transport concerns (CORS,
//! body limits, shutdown) handled here.

pub mod dto;
pub mod error;
pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{info, warn};

use crate::config::{Config, ServerConfig};
use crate::crawler::{NextIdQueue, TermTableCache};
use crate::index::IndexHolder;
use crate::metrics::Metrics;
use crate::submissions::SubmissionLog;
use crate::tool::Evaluator;

use self::handlers::{admin, programs, sequences, submissions};

/// Maximum accepted request body. Matches the largest plausible program
/// submission with room to spare.
const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

/// Shared server state: the submission log, the lazily loaded data
/// index, the evaluator handle, and the crawler's directed-fetch queue.
pub struct AppState {
    pub config: Config,
    pub log: SubmissionLog,
    pub index: IndexHolder,
    pub evaluator: Evaluator,
    pub metrics: Metrics,
    pub next_ids: Arc<NextIdQueue>,
    pub bfiles: TermTableCache,
    started: Instant,
}

impl AppState {
    /// Build the state from configuration and restore the submission log
    /// from its checkpoint.
    pub fn from_config(config: Config) -> Self {
        let data_dir = config.storage.data_dir.clone();
        let log = SubmissionLog::new(&data_dir);
        log.load_checkpoint();
        AppState {
            log,
            index: IndexHolder::new(&data_dir),
            evaluator: Evaluator::new(&config.tool),
            metrics: Metrics::new(),
            next_ids: NextIdQueue::new(),
            bfiles: TermTableCache::new(&data_dir, config.upstream.base_url.clone()),
            started: Instant::now(),
            config,
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }
}

/// Creates the axum router
pub fn create_router(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .route("/health", get(admin::health))
        .route("/stats", get(admin::stats))
        .route("/metrics", get(admin::metrics))
        .route("/submissions", get(submissions::list).post(submissions::submit))
        .route("/sequences/search", get(sequences::search_handler))
        .route("/sequences/:id", get(sequences::get))
        .route("/sequences/:id/bfile", get(sequences::bfile))
        .route("/programs/search", get(programs::search_handler))
        .route("/programs/eval", post(programs::eval))
        .route("/programs/export", post(programs::export))
        .route("/programs/:id", get(programs::get));

    if state.config.server.cors_allow_all {
        app = app.layer(CorsLayer::permissive());
    }
    app.layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(Extension(state))
}

/// Starts the HTTP server with graceful shutdown support.
///
/// Listens for SIGINT (ctrl-c) and SIGTERM; on shutdown a final
/// submission checkpoint is written.
pub async fn start_http_server(
    state: Arc<AppState>,
    config: &ServerConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = create_router(Arc::clone(&state));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let socket = tokio::net::TcpSocket::new_v4()?;
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    let listener = socket.listen(1024)?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(err) = state.log.write_checkpoint() {
        warn!(error = %err, "final checkpoint failed");
    }
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => { info!("Received SIGINT, shutting down..."); }
            _ = sigterm.recv() => { info!("Received SIGTERM, shutting down..."); }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("failed to listen for ctrl-c");
        info!("Received SIGINT, shutting down...");
    }
}
