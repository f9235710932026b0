//! Provider adapter
//!
//! Runs the provider lookup through the circuit breaker, interprets the
//! first candidate and classifies every failure into [`ValidationError`].
//!
//! Zero candidates is a `NoCandidates` error rather than `status: invalid`:
//! the provider could not interpret the input at all, which callers must be
//! able to tell apart from an understood but undeliverable address.

use crate::breaker::{CircuitBreaker, GateError};
use crate::classifier::{classify, MatchSignal, ValidationStatus};
use crate::error::{ErrorContext, ValidationError};
use crate::models::{AddressInput, Correction, ValidationResult};
use crate::normalizer::normalize;
use crate::provider::{AddressProvider, Candidate, ProviderError};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Translates provider candidates into validation results
pub struct AddressValidator {
    provider: Arc<dyn AddressProvider>,
    breaker: Arc<CircuitBreaker>,
    max_candidates: u32,
}

impl AddressValidator {
    pub fn new(
        provider: Arc<dyn AddressProvider>,
        breaker: Arc<CircuitBreaker>,
        max_candidates: u32,
    ) -> Self {
        Self {
            provider,
            breaker,
            max_candidates: max_candidates.max(1),
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub async fn validate(
        &self,
        input: &AddressInput,
    ) -> Result<ValidationResult, ValidationError> {
        self.provider.ready().await;

        let candidates = self
            .breaker
            .call(|| self.provider.lookup(input.as_str(), self.max_candidates))
            .await
            .map_err(|err| self.classify_failure(input, err))?;

        let Some(best) = candidates.into_iter().next() else {
            info!(provider = self.provider.name(), "Provider returned no candidates");
            return Err(ValidationError::NoCandidates {
                message: "Address could not be interpreted by the verification provider"
                    .to_string(),
                context: self
                    .context(input)
                    .with_reason("provider returned zero candidates"),
            });
        };

        let result = interpret(input, best);

        info!(
            provider = self.provider.name(),
            status = %result.status,
            corrections = result.corrections.len(),
            "Address classified"
        );

        Ok(result)
    }

    fn context(&self, input: &AddressInput) -> ErrorContext {
        ErrorContext::new()
            .with_address(input.as_str())
            .with_provider(self.provider.name())
    }

    fn classify_failure(
        &self,
        input: &AddressInput,
        err: GateError<ProviderError>,
    ) -> ValidationError {
        let context = self.context(input);

        match err {
            GateError::Open { retry_after } => ValidationError::CircuitOpen {
                message: "Address verification is temporarily unavailable".to_string(),
                context: context.with_reason("circuit breaker open"),
                retry_after,
            },
            GateError::Timeout(limit) => ValidationError::Timeout {
                message: format!(
                    "Address verification timed out after {} ms",
                    limit.as_millis()
                ),
                context: context.with_reason("per-call timeout exceeded"),
            },
            GateError::Failed(provider_err) => {
                warn!(
                    provider = self.provider.name(),
                    error = %provider_err,
                    "Address provider call failed"
                );
                ValidationError::ExternalService {
                    message: "Address verification provider request failed".to_string(),
                    context: context.with_reason(provider_err.to_string()),
                }
            }
        }
    }
}

/// Build the result for one candidate
pub fn interpret(input: &AddressInput, candidate: Candidate) -> ValidationResult {
    let standardized = candidate.standardized_address();
    let input_normalized = normalize(input.as_str());
    let standardized_normalized = normalize(&standardized);

    let status = classify(
        candidate.match_signal,
        &input_normalized,
        &standardized_normalized,
    );

    debug!(
        input = %input,
        standardized = %standardized,
        signal = candidate.match_signal.code(),
        "Interpreting provider candidate"
    );

    let corrections = if input_normalized != standardized_normalized {
        build_corrections(input.as_str(), &input_normalized, &standardized, &candidate)
    } else {
        Vec::new()
    };

    let errors = status_messages(status, candidate.match_signal);

    ValidationResult {
        status,
        original_input: input.as_str().to_string(),
        standardized_address: Some(standardized),
        components: Some(candidate.components),
        analysis: Some(candidate.analysis),
        corrections,
        errors,
    }
}

/// Whole-address entry plus one entry per city/state/zip the input lacks
fn build_corrections(
    original: &str,
    input_normalized: &str,
    standardized: &str,
    candidate: &Candidate,
) -> Vec<Correction> {
    let mut corrections = vec![Correction {
        field: "address".to_string(),
        original: original.to_string(),
        standardized: standardized.to_string(),
    }];

    let padded_input = format!(" {} ", input_normalized);
    let components = &candidate.components;
    let fields = [
        ("city", components.city.clone()),
        ("state", components.state.clone()),
        ("zipcode", components.zipcode.clone()),
    ];

    for (field, value) in fields {
        let Some(value) = value else { continue };
        let value_normalized = normalize(&value);
        if value_normalized.is_empty() {
            continue;
        }
        if !padded_input.contains(&format!(" {} ", value_normalized)) {
            corrections.push(Correction {
                field: field.to_string(),
                original: String::new(),
                standardized: value,
            });
        }
    }

    corrections
}

fn status_messages(status: ValidationStatus, signal: MatchSignal) -> Vec<String> {
    match (status, signal) {
        (ValidationStatus::Unverifiable, _) => vec![
            "Secondary address information (apartment, suite or unit) is required but missing"
                .to_string(),
        ],
        (ValidationStatus::Invalid, _) => {
            vec!["Address could not be confirmed as deliverable".to_string()]
        }
        (ValidationStatus::Corrected, MatchSignal::SecondaryIgnored) => vec![
            "Secondary address information was not recognized and was ignored".to_string(),
        ],
        _ => Vec::new(),
    }
}
