//! Match-signal interpretation
//!
//! Maps the provider's deliverability code plus a same/different comparison
//! onto one of four validation statuses.
//!
//! | signal | base status |
//! |---|---|
//! | `Y` | valid |
//! | `S` | corrected (secondary/unit info ignored by the provider) |
//! | `D` | unverifiable (required secondary info missing) |
//! | `N`, empty, anything else | invalid |
//!
//! Only `valid` is promoted: when the normalized input and standardized
//! address differ it becomes `corrected`. `unverifiable` is never promoted;
//! missing secondary info dominates a rephrasing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider deliverability signal, decoupled from any vendor's letters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSignal {
    /// `Y`: confirmed deliverable, including any secondary info
    Confirmed,
    /// `S`: confirmed, but the secondary info supplied was not recognized
    SecondaryIgnored,
    /// `D`: confirmed primary address, secondary info required but missing
    SecondaryMissing,
    /// `N` or an unrecognized code: not confirmed
    NotConfirmed,
    /// Provider returned no code at all
    Absent,
}

impl MatchSignal {
    /// Parse a provider code (case-insensitive, surrounding whitespace ignored)
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "Y" => MatchSignal::Confirmed,
            "S" => MatchSignal::SecondaryIgnored,
            "D" => MatchSignal::SecondaryMissing,
            "" => MatchSignal::Absent,
            "N" => MatchSignal::NotConfirmed,
            other => {
                tracing::debug!(
                    code = %other,
                    "Unrecognized match signal, treating as not confirmed"
                );
                MatchSignal::NotConfirmed
            }
        }
    }

    /// Single-letter code as reported by US-street-style providers
    pub fn code(&self) -> &'static str {
        match self {
            MatchSignal::Confirmed => "Y",
            MatchSignal::SecondaryIgnored => "S",
            MatchSignal::SecondaryMissing => "D",
            MatchSignal::NotConfirmed => "N",
            MatchSignal::Absent => "",
        }
    }

    /// Status before the rephrasing check
    pub fn base_status(&self) -> ValidationStatus {
        match self {
            MatchSignal::Confirmed => ValidationStatus::Valid,
            MatchSignal::SecondaryIgnored => ValidationStatus::Corrected,
            MatchSignal::SecondaryMissing => ValidationStatus::Unverifiable,
            MatchSignal::NotConfirmed | MatchSignal::Absent => ValidationStatus::Invalid,
        }
    }
}

/// Verdict for one validation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Valid,
    Corrected,
    Unverifiable,
    Invalid,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Valid => "valid",
            ValidationStatus::Corrected => "corrected",
            ValidationStatus::Unverifiable => "unverifiable",
            ValidationStatus::Invalid => "invalid",
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a provider match
///
/// Both address arguments must already be normalized.
pub fn classify(
    signal: MatchSignal,
    input_normalized: &str,
    standardized_normalized: &str,
) -> ValidationStatus {
    match signal.base_status() {
        ValidationStatus::Valid if input_normalized != standardized_normalized => {
            ValidationStatus::Corrected
        }
        status => status,
    }
}
