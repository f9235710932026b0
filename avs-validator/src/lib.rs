//! avs-validator library interface
//!
//! Address validation core (normalizer, classifier, circuit breaker,
//! provider adapter, orchestrator) plus the HTTP surface that exposes it.

pub mod api;
pub mod breaker;
pub mod classifier;
pub mod config;
pub mod error;
pub mod models;
pub mod normalizer;
pub mod provider;
pub mod service;
pub mod validator;

pub use crate::error::{ApiError, ApiResult, ErrorKind, ValidationError};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::service::ValidationService;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Validation orchestrator
    pub service: Arc<ValidationService>,
    /// Whole-request timeout applied by the router
    pub request_timeout: Duration,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last non-client error for diagnostics
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(service: Arc<ValidationService>, request_timeout: Duration) -> Self {
        Self {
            service,
            request_timeout,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let request_timeout = state.request_timeout;

    Router::new()
        .merge(api::validate_routes())
        .merge(api::health_routes())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
