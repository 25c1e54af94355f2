//! StoreHooks API
//!
//! HTTP API endpoints for:
//! - Entity event ingestion
//! - Firing a hook type directly
//! - Hook previews
//! - Delivery history and resend
//! - Health probes and Prometheus metrics

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sh_common::{History, HookType};
use sh_hooks::{EntityEvent, EntityObserver, HistoryRepository, HookDispatcher, HookPreview, RawResponse};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

pub mod error;

pub use error::ApiError;

const DEFAULT_HISTORY_LIMIT: u32 = 50;
const MAX_HISTORY_LIMIT: u32 = 500;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<HookDispatcher>,
    pub history: Arc<dyn HistoryRepository>,
    pub metrics: Option<PrometheusHandle>,
}

/// Batch of entity changes from one store request
#[derive(Debug, Deserialize)]
pub struct EventsRequest {
    pub events: Vec<EntityEvent>,
}

#[derive(Debug, Deserialize)]
pub struct ItemRequest {
    pub item: Value,
}

/// History entry as returned by the API
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub id: i64,
    pub hook_id: i64,
    pub hook_name: String,
    pub hook_type: HookType,
    pub store_ids: Vec<u32>,
    pub priority: i32,
    pub payload_url: String,
    pub body: String,
    pub status: String,
    pub message: Option<String>,
    /// Status code read back from the stored response
    pub response_status: Option<u16>,
    pub response: String,
    pub created_at: String,
}

impl From<History> for HistoryResponse {
    fn from(history: History) -> Self {
        let response_status = RawResponse::parse(&history.response).status;
        Self {
            id: history.id,
            hook_id: history.hook_id,
            hook_name: history.hook_name,
            hook_type: history.hook_type,
            store_ids: history.store_ids,
            priority: history.priority,
            payload_url: history.payload_url,
            body: history.body,
            status: history.status.as_str().to_string(),
            message: history.message,
            response_status,
            response: history.response,
            created_at: history.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveriesResponse {
    pub delivered: usize,
    pub failed: usize,
    pub deliveries: Vec<HistoryResponse>,
}

impl From<Vec<History>> for DeliveriesResponse {
    fn from(entries: Vec<History>) -> Self {
        let delivered = entries.iter().filter(|h| h.is_success()).count();
        Self {
            delivered,
            failed: entries.len() - delivered,
            deliveries: entries.into_iter().map(HistoryResponse::from).collect(),
        }
    }
}

/// Query params for the history list
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub hook_id: Option<i64>,
    pub limit: Option<u32>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    /// UP or DISABLED
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct ProbeResponse {
    pub status: String,
}

/// Create the full router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_probe))
        .route("/health/ready", get(readiness_probe))
        .route("/metrics", get(metrics_handler))
        .route("/api/events", post(ingest_events))
        .route("/api/fire/:hook_type", post(fire_hook_type))
        .route("/api/hooks/:id/preview", post(preview_hook))
        .route("/api/history", get(list_history))
        .route("/api/history/:id", get(get_history))
        .route("/api/history/:id/resend", post(resend_history))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.dispatcher.is_enabled() { "UP" } else { "DISABLED" };
    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn liveness_probe() -> Json<ProbeResponse> {
    Json(ProbeResponse { status: "LIVE".to_string() })
}

async fn readiness_probe(State(state): State<AppState>) -> (StatusCode, Json<ProbeResponse>) {
    match state.history.find_recent(1).await {
        Ok(_) => (StatusCode::OK, Json(ProbeResponse { status: "READY".to_string() })),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ProbeResponse { status: "NOT_READY".to_string() }),
        ),
    }
}

async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics.as_ref().map(|handle| handle.render()).unwrap_or_default()
}

/// Run a batch of entity events through a fresh observer
async fn ingest_events(
    State(state): State<AppState>,
    request: Result<Json<EventsRequest>, JsonRejection>,
) -> Result<Json<DeliveriesResponse>, ApiError> {
    let Json(request) = request.map_err(ApiError::rejected)?;
    let mut observer = EntityObserver::new(state.dispatcher.clone());
    let entries = observer.observe_all(&request.events).await?;

    info!(events = request.events.len(), deliveries = entries.len(), "Processed entity events");
    Ok(Json(entries.into()))
}

async fn fire_hook_type(
    State(state): State<AppState>,
    Path(hook_type): Path<String>,
    request: Result<Json<ItemRequest>, JsonRejection>,
) -> Result<Json<DeliveriesResponse>, ApiError> {
    let Json(request) = request.map_err(ApiError::rejected)?;
    let hook_type: HookType = hook_type.parse()?;
    let entries = state.dispatcher.send(&request.item, hook_type).await?;
    Ok(Json(entries.into()))
}

async fn preview_hook(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    request: Result<Json<ItemRequest>, JsonRejection>,
) -> Result<Json<HookPreview>, ApiError> {
    let Path(id) = id.map_err(ApiError::rejected)?;
    let Json(request) = request.map_err(ApiError::rejected)?;
    let preview = state.dispatcher.preview(id, &request.item).await?;
    Ok(Json(preview))
}

async fn list_history(
    State(state): State<AppState>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<Vec<HistoryResponse>>, ApiError> {
    let Query(query) = query.map_err(ApiError::rejected)?;
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, MAX_HISTORY_LIMIT);

    let entries = match query.hook_id {
        Some(hook_id) => state.history.find_by_hook(hook_id, limit).await?,
        None => state.history.find_recent(limit).await?,
    };
    Ok(Json(entries.into_iter().map(HistoryResponse::from).collect()))
}

async fn get_history(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let Path(id) = id.map_err(ApiError::rejected)?;
    let history = state.history.find_by_id(id).await?
        .ok_or(sh_common::StoreHooksError::HistoryNotFound(id))?;
    Ok(Json(history.into()))
}

async fn resend_history(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let Path(id) = id.map_err(ApiError::rejected)?;
    let history = state.dispatcher.resend(id).await?;
    Ok(Json(history.into()))
}
