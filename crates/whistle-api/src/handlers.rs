//! API Handlers
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use whistle_core::{Category, Report, ReportDraft, WHISTLE_VERSION};
use whistle_orchestrator::{GateState, RefreshSummary};
use whistle_status::{HistoryEntry, Status};
use whistle_store::ReportStats;

use crate::error::ApiError;
use crate::AppState;

pub(crate) static STARTED: Lazy<Instant> = Lazy::new(Instant::now);

#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    pub identity: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub identity: Option<String>,
    pub contract: Option<String>,
    pub engine: GateState,
}

/// Replace the active session; with an identity, run the engine handshake
pub async fn open_session(
    State(state): State<AppState>,
    Json(req): Json<SessionRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let ctx = state.orchestrator.session(req.identity);
    *state.session.write() = ctx.clone();

    if ctx.is_connected() {
        let result = state.orchestrator.connect(&ctx).await;
        state.metrics.observe("connect", &result);
        result?;
        state.sync_gauges();
    }

    Ok(Json(SessionResponse {
        identity: ctx.identity.map(|i| i.0),
        contract: ctx.contract.map(|c| c.0),
        engine: state.orchestrator.gate_state(),
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

pub async fn list_reports(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Json<Vec<Report>> {
    let snapshot = state.orchestrator.snapshot();
    let reports = match params.q.as_deref().map(str::trim) {
        Some(term) if !term.is_empty() => snapshot.search(term).into_iter().cloned().collect(),
        _ => snapshot.reports,
    };
    Json(reports)
}

pub async fn get_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Report>, ApiError> {
    state
        .orchestrator
        .report(&id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("report {id} not loaded")))
}

pub async fn submit_report(
    State(state): State<AppState>,
    Json(draft): Json<ReportDraft>,
) -> Result<(StatusCode, Json<Report>), ApiError> {
    let ctx = state.session();
    let result = state.orchestrator.submit_report(&ctx, draft).await;
    state.metrics.observe("submit_report", &result);
    state.sync_gauges();
    Ok((StatusCode::CREATED, Json(result?)))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub report_id: String,
    pub clear_value: u64,
}

pub async fn verify_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let ctx = state.session();
    let result = state.orchestrator.verify_and_decrypt(&ctx, &id).await;
    state.metrics.observe("verify_and_decrypt", &result);
    state.sync_gauges();
    Ok(Json(VerifyResponse {
        report_id: id,
        clear_value: result?,
    }))
}

pub async fn refresh(State(state): State<AppState>) -> Result<Json<RefreshSummary>, ApiError> {
    let ctx = state.session();
    let result = state.orchestrator.refresh(&ctx).await;
    state.metrics.observe("refresh", &result);
    state.sync_gauges();
    Ok(Json(result?))
}

pub async fn report_stats(State(state): State<AppState>) -> Json<ReportStats> {
    Json(state.orchestrator.snapshot().stats())
}

pub async fn categories() -> Json<Vec<Category>> {
    Json(Category::ALL.to_vec())
}

pub async fn current_status(State(state): State<AppState>) -> Json<Option<Status>> {
    Json(state.orchestrator.current_status())
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

pub async fn history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Json<Vec<HistoryEntry>> {
    let entries = match params.limit {
        Some(n) => state.orchestrator.history_tail(n),
        None => state.orchestrator.recent_history(),
    };
    Json(entries)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LivenessResponse {
    pub available: bool,
}

/// Ask the ledger whether the contract is operational
pub async fn liveness(State(state): State<AppState>) -> Result<Json<LivenessResponse>, ApiError> {
    let ctx = state.session();
    let result = state.orchestrator.check_liveness(&ctx).await;
    state.metrics.observe("check_liveness", &result);
    Ok(Json(LivenessResponse { available: result? }))
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": WHISTLE_VERSION,
        "engine": state.orchestrator.gate_state(),
        "uptime_secs": STARTED.elapsed().as_secs(),
    }))
}

pub async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let body = state
        .metrics
        .encode()
        .map_err(|e| ApiError::internal(format!("metrics encoding failed: {e}")))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}
