//! Validation orchestrator
//!
//! Single call surface for the HTTP layer: rejects bad input locally, then
//! delegates to the provider adapter. Every request runs in its own span
//! tagged with a request id.

use crate::breaker::BreakerSnapshot;
use crate::error::ValidationError;
use crate::models::{AddressInput, ValidationResult};
use crate::validator::AddressValidator;
use serde_json::Value;
use tracing::{info_span, Instrument};
use uuid::Uuid;

pub struct ValidationService {
    validator: AddressValidator,
}

impl ValidationService {
    pub fn new(validator: AddressValidator) -> Self {
        Self { validator }
    }

    /// Validate a raw address string
    ///
    /// Empty or whitespace-only input fails with `InvalidInput` without
    /// touching the provider.
    pub async fn validate(&self, raw: &str) -> Result<ValidationResult, ValidationError> {
        let input = AddressInput::parse(raw)?;
        let request_id = Uuid::new_v4();

        self.validator
            .validate(&input)
            .instrument(info_span!(
                "validate",
                request_id = %request_id,
                provider = self.validator.provider_name()
            ))
            .await
    }

    /// Validate the `address` field of a JSON request body
    pub async fn validate_json(&self, body: &Value) -> Result<ValidationResult, ValidationError> {
        let raw = extract_address(body)?;
        self.validate(raw).await
    }

    pub fn breaker_snapshot(&self) -> BreakerSnapshot {
        self.validator.breaker().snapshot()
    }

    pub fn provider_name(&self) -> &'static str {
        self.validator.provider_name()
    }
}

/// Pull `address` out of a request body, rejecting anything but a string
pub fn extract_address(body: &Value) -> Result<&str, ValidationError> {
    match body.get("address") {
        Some(Value::String(address)) => Ok(address),
        Some(other) => Err(ValidationError::invalid_input(format!(
            "Field 'address' must be a string, got {}",
            json_type_name(other)
        ))),
        None => Err(ValidationError::invalid_input(
            "Request body must contain an 'address' field",
        )),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
