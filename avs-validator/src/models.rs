//! Request and result types for address validation

use crate::classifier::ValidationStatus;
use crate::error::ValidationError;
use crate::provider::{AddressComponents, DeliveryAnalysis};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Caller-supplied address, trimmed and guaranteed non-empty
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressInput(String);

impl AddressInput {
    /// Trim and accept `raw`, rejecting empty or whitespace-only input
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::invalid_input(
                "Address must be a non-empty string",
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for AddressInput {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AddressInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A detected difference between input and standardized address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Correction {
    /// "address" for the whole-address entry, otherwise a component name
    pub field: String,
    pub original: String,
    pub standardized: String,
}

/// Outcome of a successful validation
///
/// `status = invalid` is still a success; failures are [`ValidationError`]s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub status: ValidationStatus,
    pub original_input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standardized_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<AddressComponents>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<DeliveryAnalysis>,
    pub corrections: Vec<Correction>,
    pub errors: Vec<String>,
}
