//! Error types for avs-validator
//!
//! Two layers:
//! - [`ValidationError`]: the closed taxonomy every failure in the validation
//!   core is classified into. Each variant carries a message and an
//!   [`ErrorContext`] for diagnostics.
//! - [`ApiError`]: HTTP-facing wrapper that maps the taxonomy onto status codes.
//!
//! A classification of `invalid` is a successful outcome and never appears here.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Closed enumeration of failure kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidInput,
    NoCandidates,
    CircuitOpen,
    Timeout,
    ExternalServiceError,
    ConfigurationError,
}

impl ErrorKind {
    /// Stable machine-readable code used in HTTP error bodies
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::NoCandidates => "NO_CANDIDATES",
            ErrorKind::CircuitOpen => "CIRCUIT_OPEN",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::ExternalServiceError => "EXTERNAL_SERVICE_ERROR",
            ErrorKind::ConfigurationError => "CONFIGURATION_ERROR",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorKind::InvalidInput | ErrorKind::NoCandidates => ErrorCategory::Client,
            ErrorKind::CircuitOpen => ErrorCategory::Unavailable,
            ErrorKind::Timeout | ErrorKind::ExternalServiceError => ErrorCategory::Retriable,
            ErrorKind::ConfigurationError => ErrorCategory::Fatal,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// How a caller should react to a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Fix the request; retrying unchanged will not help
    Client,
    /// Service is shedding load; retry later
    Unavailable,
    /// Transient failure; retry is reasonable
    Retriable,
    /// Startup misconfiguration; the process must not serve
    Fatal,
}

/// Diagnostic context attached to every failure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Internal detail for logs; may carry raw provider text, never serialized
    #[serde(skip_serializing)]
    pub reason: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.original_address = Some(address.into());
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Validation failure taxonomy
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    /// Empty, whitespace-only or non-string address
    #[error("Invalid input: {message}")]
    InvalidInput { message: String, context: ErrorContext },

    /// Provider understood the request but returned zero candidates
    #[error("No candidates: {message}")]
    NoCandidates { message: String, context: ErrorContext },

    /// Circuit breaker is rejecting calls
    #[error("Circuit open: {message}")]
    CircuitOpen {
        message: String,
        context: ErrorContext,
        /// Time until the breaker admits a trial call, if known
        retry_after: Option<Duration>,
    },

    /// Provider call exceeded the per-call timeout
    #[error("Timeout: {message}")]
    Timeout { message: String, context: ErrorContext },

    /// Any other provider or network failure
    #[error("External service error: {message}")]
    ExternalService { message: String, context: ErrorContext },

    /// Missing or invalid startup configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String, context: ErrorContext },
}

impl ValidationError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        ValidationError::InvalidInput {
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        ValidationError::Configuration {
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ValidationError::InvalidInput { .. } => ErrorKind::InvalidInput,
            ValidationError::NoCandidates { .. } => ErrorKind::NoCandidates,
            ValidationError::CircuitOpen { .. } => ErrorKind::CircuitOpen,
            ValidationError::Timeout { .. } => ErrorKind::Timeout,
            ValidationError::ExternalService { .. } => ErrorKind::ExternalServiceError,
            ValidationError::Configuration { .. } => ErrorKind::ConfigurationError,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        self.kind().category()
    }

    pub fn is_retriable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Unavailable | ErrorCategory::Retriable
        )
    }

    pub fn message(&self) -> &str {
        match self {
            ValidationError::InvalidInput { message, .. }
            | ValidationError::NoCandidates { message, .. }
            | ValidationError::CircuitOpen { message, .. }
            | ValidationError::Timeout { message, .. }
            | ValidationError::ExternalService { message, .. }
            | ValidationError::Configuration { message, .. } => message,
        }
    }

    pub fn context(&self) -> &ErrorContext {
        match self {
            ValidationError::InvalidInput { context, .. }
            | ValidationError::NoCandidates { context, .. }
            | ValidationError::CircuitOpen { context, .. }
            | ValidationError::Timeout { context, .. }
            | ValidationError::ExternalService { context, .. }
            | ValidationError::Configuration { context, .. } => context,
        }
    }
}

impl From<avs_common::Error> for ValidationError {
    fn from(err: avs_common::Error) -> Self {
        ValidationError::Configuration {
            message: err.to_string(),
            context: ErrorContext::new(),
        }
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Failure classified by the validation core
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Malformed request outside the validation taxonomy (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(err) => match err.kind() {
                ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
                ErrorKind::NoCandidates => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorKind::CircuitOpen => StatusCode::SERVICE_UNAVAILABLE,
                ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
                ErrorKind::ExternalServiceError => StatusCode::BAD_GATEWAY,
                ErrorKind::ConfigurationError => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let (body, retry_after) = match &self {
            ApiError::Validation(err) => {
                let retry_after = match err {
                    ValidationError::CircuitOpen { retry_after, .. } => *retry_after,
                    _ => None,
                };
                let body = json!({
                    "error": {
                        "code": err.kind().code(),
                        "message": err.message(),
                        "retriable": err.is_retriable(),
                        "details": err.context(),
                    }
                });
                (body, retry_after)
            }
            ApiError::BadRequest(msg) => (
                json!({ "error": { "code": "BAD_REQUEST", "message": msg, "retriable": false } }),
                None,
            ),
        };

        let mut response = (status, Json(body)).into_response();

        if let Some(wait) = retry_after {
            // Round up so clients never retry before the breaker admits a trial
            let secs = wait.as_millis().div_ceil(1000).max(1);
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
