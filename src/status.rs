//! Status and command HTTP server
//!
//! Read side: overall status, per-service detail, resource history, and a
//! Prometheus metrics endpoint. Command side: operator restart, escalation
//! acknowledgement, and external anomaly ingestion.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::domain::{
    AlertEvent, HealthResult, RemediationOutcome, ResourceSample, ServiceState, ServiceStatus,
    Severity,
};
use crate::supervisor::Supervisor;
use crate::{Result, WardenError};

/// Per-service view joined from spec and tracked state
#[derive(Debug, Clone, Serialize)]
pub struct ServiceView {
    pub name: String,
    pub kind: String,
    pub status: ServiceStatus,
    pub consecutive_failures: u32,
    pub restarts_in_window: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_result: Option<HealthResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_outcome: Option<RemediationOutcome>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// Overall supervisor status response
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub services: Vec<ServiceView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceSample>,
    /// Metrics currently in a warning or critical zone
    pub active_zones: Vec<(crate::domain::Metric, crate::domain::Zone)>,
}

/// External anomaly signal accepted on POST /alerts
#[derive(Debug, Deserialize)]
pub struct AnomalyRequest {
    pub severity: Severity,
    pub source: String,
    /// Dedup condition; defaults so the minimal severity/source/message
    /// shape is accepted
    #[serde(default = "default_condition")]
    pub condition: String,
    pub message: String,
}

fn default_condition() -> String {
    "anomaly".to_string()
}

pub async fn status_response(supervisor: &Supervisor) -> StatusResponse {
    let states = supervisor.tracker().snapshot().await;
    let system = &supervisor.config().system;

    let services = supervisor
        .specs()
        .iter()
        .map(|spec| {
            let state = states.get(&spec.name).cloned().unwrap_or_default();
            let window = chrono::Duration::seconds(
                spec.restart_window_secs.unwrap_or(system.restart_window_secs) as i64,
            );
            view_of(spec, &state, Utc::now(), window)
        })
        .collect();

    StatusResponse {
        timestamp: Utc::now(),
        uptime_seconds: supervisor.uptime_seconds(),
        services,
        resources: supervisor.sampler().latest(),
        active_zones: supervisor.sampler().active_zones(),
    }
}

fn view_of(
    spec: &crate::domain::ServiceSpec,
    state: &ServiceState,
    now: DateTime<Utc>,
    window: chrono::Duration,
) -> ServiceView {
    ServiceView {
        name: spec.name.clone(),
        kind: spec.kind.to_string(),
        status: state.status,
        consecutive_failures: state.consecutive_failures,
        restarts_in_window: state.restarts_in_window(now, window),
        last_result: state.last_result.clone(),
        last_outcome: state.last_outcome.clone(),
        description: spec.description.clone(),
    }
}

/// Status/command server wrapping a running supervisor
pub struct StatusServer {
    supervisor: Arc<Supervisor>,
    port: u16,
}

impl StatusServer {
    pub fn new(supervisor: Arc<Supervisor>, port: u16) -> Self {
        Self { supervisor, port }
    }

    pub async fn run(&self) -> Result<()> {
        let app = router(Arc::clone(&self.supervisor));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting status server on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .await
            .map_err(|e| WardenError::Internal(format!("Status server error: {e}")))?;

        Ok(())
    }
}

pub fn router(supervisor: Arc<Supervisor>) -> Router {
    Router::new()
        .route("/healthz", get(liveness_handler))
        .route("/status", get(status_handler))
        .route("/status/:name", get(service_handler))
        .route("/resources", get(resources_handler))
        .route("/metrics", get(metrics_handler))
        .route("/services/:name/remediate", post(remediate_handler))
        .route("/services/:name/acknowledge", post(acknowledge_handler))
        .route("/alerts", post(alerts_handler))
        .layer(CorsLayer::permissive())
        .with_state(supervisor)
}

/// Liveness of the supervisor process itself
async fn liveness_handler() -> impl IntoResponse {
    StatusCode::OK
}

async fn status_handler(State(supervisor): State<Arc<Supervisor>>) -> impl IntoResponse {
    Json(status_response(&supervisor).await)
}

async fn service_handler(
    State(supervisor): State<Arc<Supervisor>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    let Some(spec) = supervisor.specs().iter().find(|s| s.name == name) else {
        return error_response(&WardenError::UnknownService(name));
    };
    let state = supervisor
        .tracker()
        .state_of(&name)
        .await
        .unwrap_or_default();
    let system = &supervisor.config().system;
    let window = chrono::Duration::seconds(
        spec.restart_window_secs.unwrap_or(system.restart_window_secs) as i64,
    );
    (
        StatusCode::OK,
        Json(serde_json::json!(view_of(spec, &state, Utc::now(), window))),
    )
}

async fn resources_handler(State(supervisor): State<Arc<Supervisor>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "latest": supervisor.sampler().latest(),
        "active_zones": supervisor.sampler().active_zones(),
        "history": supervisor.sampler().history(),
    }))
}

async fn metrics_handler(State(supervisor): State<Arc<Supervisor>>) -> impl IntoResponse {
    supervisor.metrics().prometheus()
}

async fn remediate_handler(
    State(supervisor): State<Arc<Supervisor>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    match supervisor.force_remediate(&name).await {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "status": "remediating", "service": name })),
        ),
        Err(e) => error_response(&e),
    }
}

async fn acknowledge_handler(
    State(supervisor): State<Arc<Supervisor>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    match supervisor.acknowledge(&name).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "acknowledged", "service": name })),
        ),
        Err(e) => error_response(&e),
    }
}

async fn alerts_handler(
    State(supervisor): State<Arc<Supervisor>>,
    Json(req): Json<AnomalyRequest>,
) -> impl IntoResponse {
    let event = AlertEvent::new(
        req.severity,
        &req.source,
        &req.condition,
        req.message,
        Utc::now(),
    );
    supervisor.ingest_alert(event).await;
    (StatusCode::ACCEPTED, Json(serde_json::json!({ "status": "accepted" })))
}

fn error_response(e: &WardenError) -> (StatusCode, Json<serde_json::Value>) {
    let status = match e {
        WardenError::UnknownService(_) => StatusCode::NOT_FOUND,
        WardenError::BudgetExhausted(_) | WardenError::RemediationInFlight(_) => {
            StatusCode::CONFLICT
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(serde_json::json!({ "error": e.to_string() })))
}
