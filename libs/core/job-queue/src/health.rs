//! Health check handlers for worker processes
//!
//! Reusable Axum handlers for:
//! - Liveness probes (`/health`, `/healthz`)
//! - Readiness probes (`/ready`, `/readyz`)
//! - Queue monitoring (`/queue/counts`)
//! - Prometheus metrics (`/metrics`)

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use redis::aio::ConnectionManager;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use strum::IntoEnumIterator;
use tower_http::trace::TraceLayer;

use crate::job::JobState;
use crate::metrics;
use crate::topic::TopicKeys;

/// Shared state for health endpoints
#[derive(Clone)]
pub struct HealthState {
    /// Redis connection for health checks
    pub redis: Arc<ConnectionManager>,
    /// Application name
    pub app_name: String,
    /// Application version
    pub app_version: String,
    /// Topic keys for queue monitoring
    pub keys: TopicKeys,
}

impl HealthState {
    pub fn new(
        redis: Arc<ConnectionManager>,
        app_name: impl Into<String>,
        app_version: impl Into<String>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            redis,
            app_name: app_name.into(),
            app_version: app_version.into(),
            keys: TopicKeys::new(topic),
        }
    }
}

/// Health response for liveness probes
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status (always "healthy" if responding)
    pub status: &'static str,
    /// Application name
    pub name: String,
    /// Application version
    pub version: String,
}

/// Liveness probe handler
///
/// Always returns OK if the server is running.
async fn health_handler(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        name: state.app_name,
        version: state.app_version,
    })
}

/// Readiness probe handler
///
/// Checks that Redis answers a PING.
async fn ready_handler(
    State(state): State<HealthState>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let mut conn = (*state.redis).clone();

    let result: Result<String, _> = redis::cmd("PING").query_async(&mut conn).await;

    match result {
        Ok(response) if response == "PONG" => Ok((
            StatusCode::OK,
            Json(json!({
                "status": "ready",
                "checks": {
                    "redis": "ok"
                }
            })),
        )),
        Ok(response) => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "not_ready",
                "checks": {
                    "redis": format!("unexpected response: {}", response)
                }
            })),
        )),
        Err(e) => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "not_ready",
                "checks": {
                    "redis": format!("error: {}", e)
                }
            })),
        )),
    }
}

/// Queue state counts handler
async fn counts_handler(
    State(state): State<HealthState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let mut conn = (*state.redis).clone();

    let states: Vec<JobState> = JobState::iter().collect();
    let mut pipe = redis::pipe();
    for job_state in &states {
        pipe.cmd("ZCARD").arg(state.keys.state(*job_state));
    }

    let counts: Vec<u64> = pipe.query_async(&mut conn).await.map_err(|e| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": e.to_string() })),
        )
    })?;

    let mut body = serde_json::Map::new();
    for (job_state, count) in states.iter().zip(counts) {
        body.insert(job_state.to_string(), json!(count));
    }

    Ok(Json(json!({
        "topic": state.keys.topic(),
        "counts": body
    })))
}

/// Prometheus metrics handler
async fn metrics_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::render_metrics(),
    )
}

/// Build the health/admin router for a worker process
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/readyz", get(ready_handler))
        .route("/queue/counts", get(counts_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
