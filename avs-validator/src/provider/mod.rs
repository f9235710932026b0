//! Address provider contract
//!
//! Vendor-neutral candidate model. A provider implementation translates its
//! own wire schema into [`Candidate`] so the validator never sees vendor
//! field names.

pub mod smarty;

use crate::classifier::MatchSignal;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use smarty::SmartyClient;

/// Provider failures, before classification into the validation taxonomy
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider rejected credentials")]
    Unauthorized,

    #[error("Provider subscription required")]
    PaymentRequired,

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Structured pieces of a standardized address
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressComponents {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street_predirection: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street_suffix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street_postdirection: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_designator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zipcode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plus4_code: Option<String>,
}

impl AddressComponents {
    /// ZIP with +4 extension when present, e.g. "94043-1351"
    pub fn full_zip(&self) -> Option<String> {
        match (&self.zipcode, &self.plus4_code) {
            (Some(zip), Some(plus4)) => Some(format!("{}-{}", zip, plus4)),
            (Some(zip), None) => Some(zip.clone()),
            _ => None,
        }
    }
}

/// Auxiliary deliverability flags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryAnalysis {
    /// Address is deliverable but currently vacant
    pub vacant: bool,
    /// Address has received mail recently
    pub active: bool,
    /// Provider footnote codes
    pub footnotes: Vec<String>,
}

/// One ranked interpretation of the input address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub delivery_line_1: String,
    pub delivery_line_2: Option<String>,
    pub last_line: String,
    pub components: AddressComponents,
    pub match_signal: MatchSignal,
    pub analysis: DeliveryAnalysis,
}

impl Candidate {
    /// Display form: delivery line 1, optional delivery line 2, last line
    pub fn standardized_address(&self) -> String {
        let mut parts = vec![self.delivery_line_1.as_str()];
        if let Some(line2) = self.delivery_line_2.as_deref().filter(|l| !l.trim().is_empty()) {
            parts.push(line2);
        }
        parts.push(self.last_line.as_str());
        parts
            .into_iter()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// External address lookup
///
/// Returns zero or more candidates ordered by confidence. Implementations
/// must not apply their own retry or breaker logic; the validator owns that.
#[async_trait]
pub trait AddressProvider: Send + Sync {
    /// Provider identifier for logs and error context
    fn name(&self) -> &'static str;

    /// Wait for local admission (client-side throttling)
    ///
    /// Awaited before the circuit breaker admits the call, so time queued
    /// here never counts against the per-call timeout.
    async fn ready(&self) {}

    async fn lookup(
        &self,
        address: &str,
        max_candidates: u32,
    ) -> Result<Vec<Candidate>, ProviderError>;
}
