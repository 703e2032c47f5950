use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::errors::AppError;
use crate::models::{AmbiguousMatchWarning, IngestRequest, LeadDetail, LeadQueryParams};
use crate::pipeline::BatchReport;
use crate::scoring::LeadStatistics;
use crate::services::LeadService;

/// Maximum records accepted in one ingest request.
const MAX_BATCH_RECORDS: usize = 5_000;

/// Shared application state injected into handlers.
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Single-writer ingestion over the lead index and store.
    pub leads: LeadService,
}

/// Checks `X-Api-Key` when an API key is configured.
fn require_api_key(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let Some(ref expected) = state.config.api_key else {
        return Ok(());
    };

    let provided = headers
        .get("X-Api-Key")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing X-Api-Key header".to_string()))?;

    // Constant-time comparison to prevent timing attacks
    if !constant_time_compare(provided, expected) {
        return Err(AppError::Unauthorized("Invalid API key".to_string()));
    }

    Ok(())
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.as_bytes()
        .iter()
        .zip(b.as_bytes().iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "rust-leadgen-api",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// POST /api/v1/leads/ingest
///
/// Normalizes, deduplicates and merges a batch of raw source records.
/// Bad records are reported in the response, never as an HTTP error.
pub async fn ingest_leads(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<IngestRequest>,
) -> Result<Json<BatchReport>, AppError> {
    require_api_key(&state, &headers)?;

    if request.records.is_empty() {
        return Err(AppError::BadRequest("records cannot be empty".to_string()));
    }
    if request.records.len() > MAX_BATCH_RECORDS {
        return Err(AppError::BadRequest(format!(
            "at most {} records per batch",
            MAX_BATCH_RECORDS
        )));
    }

    tracing::info!("POST /leads/ingest - {} record(s)", request.records.len());
    let report = state.leads.ingest(request.records).await?;
    tracing::info!("Ingest finished: {}", report.summary());

    Ok(Json(report))
}

/// GET /api/v1/leads
pub async fn list_leads(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<LeadQueryParams>,
) -> Result<Json<Vec<LeadDetail>>, AppError> {
    require_api_key(&state, &headers)?;
    tracing::debug!("GET /leads - params: {:?}", params);

    Ok(Json(state.leads.list(&params).await?))
}

/// GET /api/v1/leads/:id
pub async fn get_lead(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<LeadDetail>, AppError> {
    require_api_key(&state, &headers)?;

    state
        .leads
        .get(id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Lead {} not found", id)))
}

/// DELETE /api/v1/leads/:id
pub async fn delete_lead(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_api_key(&state, &headers)?;

    if state.leads.delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Lead {} not found", id)))
    }
}

/// GET /api/v1/leads/stats
pub async fn lead_stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<LeadStatistics>, AppError> {
    require_api_key(&state, &headers)?;
    Ok(Json(state.leads.stats().await))
}

/// GET /api/v1/reviews
///
/// Lead pairs whose match confidence fell in the possible-duplicate band.
pub async fn list_reviews(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<AmbiguousMatchWarning>>, AppError> {
    require_api_key(&state, &headers)?;
    Ok(Json(state.leads.reviews().await))
}

/// DELETE /api/v1/reviews
pub async fn clear_reviews(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    require_api_key(&state, &headers)?;
    let cleared = state.leads.clear_reviews().await;
    Ok(Json(json!({ "cleared": cleared })))
}
