//! Whistle API /v1: REST endpoints over one orchestrator session
pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod middleware;

use axum::{
    routing::{get, post},
    Router,
};
use parking_lot::RwLock;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use whistle_core::SessionContext;
use whistle_orchestrator::Orchestrator;

pub use config::ApiConfig;
pub use error::ApiError;
pub use metrics::ApiMetrics;

/// Shared handler state. The server drives a single session, replaced
/// wholesale by `POST /v1/session`.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub session: Arc<RwLock<SessionContext>>,
    pub metrics: ApiMetrics,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Result<Self, prometheus::Error> {
        once_cell::sync::Lazy::force(&handlers::STARTED);
        let session = orchestrator.session(None);
        Ok(Self {
            orchestrator,
            session: Arc::new(RwLock::new(session)),
            metrics: ApiMetrics::new()?,
        })
    }

    /// Copy of the active session; never held across an await
    pub fn session(&self) -> SessionContext {
        self.session.read().clone()
    }

    pub(crate) fn sync_gauges(&self) {
        self.metrics
            .set_reports_loaded(self.orchestrator.snapshot().reports.len());
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/v1/session", post(handlers::open_session))
        .route(
            "/v1/reports",
            get(handlers::list_reports).post(handlers::submit_report),
        )
        .route("/v1/reports/stats", get(handlers::report_stats))
        .route("/v1/reports/{id}", get(handlers::get_report))
        .route("/v1/reports/{id}/verify", post(handlers::verify_report))
        .route("/v1/refresh", post(handlers::refresh))
        .route("/v1/categories", get(handlers::categories))
        .route("/v1/status", get(handlers::current_status))
        .route("/v1/history", get(handlers::history))
        .route("/v1/liveness", post(handlers::liveness))
        .route("/v1/health", get(handlers::health))
        .route("/v1/metrics", get(handlers::metrics))
        .layer(axum::middleware::from_fn(middleware::log_requests))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::cors())
        .with_state(state)
}

pub async fn run(addr: &str, state: AppState) -> anyhow::Result<()> {
    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {addr}: {e}"))?;

    tracing::info!(%addr, "whistle API listening");
    axum::serve(listener, app).await?;
    Ok(())
}
