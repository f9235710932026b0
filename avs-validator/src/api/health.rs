//! Health check endpoint
//!
//! Reports uptime, circuit breaker state and the last provider-side error.

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::breaker::{BreakerSnapshot, CircuitState};
use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// "ok" while the circuit is closed, otherwise "degraded"
    pub status: String,
    /// Module name ("avs-validator")
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    /// Address provider in use
    pub provider: String,
    /// Circuit breaker view
    pub circuit: BreakerSnapshot,
    /// Last non-client error message, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let circuit = state.service.breaker_snapshot();
    let status = if circuit.state == CircuitState::Closed {
        "ok"
    } else {
        "degraded"
    };

    let last_error = state.last_error.read().await.clone();

    Json(HealthResponse {
        status: status.to_string(),
        module: "avs-validator".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        provider: state.service.provider_name().to_string(),
        circuit,
        last_error,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
