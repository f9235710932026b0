//! Address validation endpoint
//!
//! Provides POST /api/validate

use crate::error::{ApiError, ApiResult, ErrorCategory};
use crate::models::ValidationResult;
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use serde_json::Value;

/// POST /api/validate handler
///
/// **Request:** `{"address": "1600 Amphitheatre Parkway, Mountain View, CA"}`
/// **Response:** `ValidationResult` JSON
///
/// **Errors:**
/// - 400 Bad Request: malformed JSON, missing/non-string/blank address
/// - 422 Unprocessable Entity: provider could not interpret the address
/// - 502 / 503 / 504: provider failure, circuit open, provider timeout
pub async fn validate_address(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<ValidationResult>> {
    let Json(body) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    match state.service.validate_json(&body).await {
        Ok(result) => Ok(Json(result)),
        Err(err) => {
            if err.category() != ErrorCategory::Client {
                *state.last_error.write().await = Some(err.to_string());
            }
            Err(err.into())
        }
    }
}

/// Build validation routes
pub fn validate_routes() -> Router<AppState> {
    Router::new().route("/api/validate", post(validate_address))
}
