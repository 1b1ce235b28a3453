//! HTTP handlers: alert ingress, liveness, rule introspection and metrics.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use warden_bus::{BrokerStats, RoutingState};
use warden_core::Event;
use warden_rules::Rule;

use crate::metrics::PipelineStats;
use crate::pipeline::{self, Submission};
use crate::state::AppState;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ── Ingress ───────────────────────────────────────────────────────

/// `POST /`: decode an alert and feed it to the pipeline.
pub async fn submit_event(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Submission>, Response> {
    let event = Event::from_json(&body).map_err(|e| {
        tracing::debug!(error = %e, "rejecting malformed alert");
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("invalid alert payload: {e}"),
            }),
        )
            .into_response()
    })?;

    let rules = state.rules.snapshot();
    let submission =
        pipeline::submit(&rules, state.publisher.as_ref(), &state.metrics, &event).await;
    Ok(Json(submission))
}

// ── Health ────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// ── Rules ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct RulesResponse {
    pub count: usize,
    pub loaded_at: chrono::DateTime<chrono::Utc>,
    pub rules: Vec<Rule>,
}

pub async fn rules(State(state): State<Arc<AppState>>) -> Json<RulesResponse> {
    let snapshot = state.rules.snapshot();
    Json(RulesResponse {
        count: snapshot.len(),
        loaded_at: snapshot.loaded_at(),
        rules: snapshot.rules().to_vec(),
    })
}

// ── Metrics ───────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct MetricsResponse {
    #[serde(flatten)]
    pub pipeline: PipelineStats,
    pub broker: BrokerStats,
    pub routing: RoutingState,
    pub rules: usize,
    pub uptime_seconds: u64,
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        pipeline: state.metrics.snapshot(),
        broker: state.broker.snapshot(),
        routing: state.routing.borrow().clone(),
        rules: state.rules.snapshot().len(),
        uptime_seconds: state.started.elapsed().as_secs(),
    })
}
