//! Health, metrics and job status endpoints for queue workers.
//!
//! - Liveness: `/health`, `/healthz`
//! - Readiness: `/ready`, `/readyz` (pings the queue backend)
//! - Prometheus metrics: `/metrics`
//! - Job status: `/jobs/{id}`

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::job::JobId;
use crate::metrics;
use crate::queue::QueueHandle;

/// Shared state for health endpoints.
#[derive(Clone)]
pub struct HealthState {
    pub queue: Arc<dyn QueueHandle>,
    pub app_name: String,
    pub app_version: String,
}

impl HealthState {
    pub fn new(
        queue: Arc<dyn QueueHandle>,
        app_name: impl Into<String>,
        app_version: impl Into<String>,
    ) -> Self {
        Self {
            queue,
            app_name: app_name.into(),
            app_version: app_version.into(),
        }
    }
}

/// Liveness response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub name: String,
    pub version: String,
    pub queue: String,
}

pub async fn health_handler(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        name: state.app_name,
        version: state.app_version,
        queue: state.queue.queue_name().to_string(),
    })
}

pub async fn ready_handler(State(state): State<HealthState>) -> (StatusCode, Json<Value>) {
    match state.queue.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "ready", "checks": { "queue": "ok" } })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "not_ready", "checks": { "queue": e.to_string() } })),
        ),
    }
}

pub async fn metrics_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::render_metrics(),
    )
}

pub async fn job_status_handler(
    State(state): State<HealthState>,
    Path(id): Path<String>,
) -> (StatusCode, Json<Value>) {
    match state.queue.status(&JobId::from(id)).await {
        Ok(Some(status)) => (StatusCode::OK, Json(json!(status))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "job not found" })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        ),
    }
}

/// Router with the health, metrics and job status endpoints.
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/readyz", get(ready_handler))
        .route("/metrics", get(metrics_handler))
        .route("/jobs/{id}", get(job_status_handler))
        .with_state(state)
}
