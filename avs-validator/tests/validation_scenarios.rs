//! End-to-end validation scenarios through the orchestrator
//!
//! Covers classification outcomes, the error taxonomy and the circuit
//! breaker lifecycle with a scripted provider. Breaker timing tests run on
//! paused tokio time.

mod helpers;

use avs_validator::breaker::CircuitState;
use avs_validator::classifier::ValidationStatus;
use avs_validator::provider::ProviderError;
use avs_validator::{ErrorKind, ValidationError};
use helpers::{breaker_config, candidate, service_with, Behavior, FakeProvider};
use std::time::Duration;

const GOOGLEPLEX: &str = "1600 Amphitheatre Parkway, Mountain View, CA 94043";

fn googleplex_candidate() -> Behavior {
    Behavior::Respond(vec![candidate(
        "Y",
        "1600 Amphitheatre Pkwy",
        "Mountain View, CA 94043-1351",
    )])
}

#[tokio::test]
async fn scenario_a_rephrased_confirmed_address_is_corrected() {
    let provider = FakeProvider::new(googleplex_candidate());
    let service = service_with(provider.clone(), breaker_config());

    let result = service.validate(GOOGLEPLEX).await.unwrap();

    assert_eq!(result.status, ValidationStatus::Corrected);
    assert_eq!(result.original_input, GOOGLEPLEX);
    assert_eq!(
        result.standardized_address.as_deref(),
        Some("1600 Amphitheatre Pkwy, Mountain View, CA 94043-1351")
    );
    assert_eq!(result.corrections.len(), 1);
    assert_eq!(result.corrections[0].field, "address");
    assert_eq!(result.corrections[0].original, GOOGLEPLEX);
    assert!(result.errors.is_empty());
}

#[tokio::test]
async fn scenario_a_matching_confirmed_address_is_valid() {
    let provider = FakeProvider::new(googleplex_candidate());
    let service = service_with(provider, breaker_config());

    let result = service
        .validate("1600 AMPHITHEATRE PKWY  Mountain View CA 94043-1351")
        .await
        .unwrap();

    assert_eq!(result.status, ValidationStatus::Valid);
    assert!(result.corrections.is_empty());
}

#[tokio::test]
async fn scenario_b_missing_secondary_is_unverifiable() {
    let provider = FakeProvider::new(Behavior::Respond(vec![candidate(
        "D",
        "123 Main St",
        "Springfield IL 62701-1234",
    )]));
    let service = service_with(provider, breaker_config());

    let result = service.validate("123 Main St").await.unwrap();

    assert_eq!(result.status, ValidationStatus::Unverifiable);
    assert!(result.standardized_address.is_some());
    assert!(!result.errors.is_empty());
}

#[tokio::test]
async fn scenario_c_empty_candidates_is_no_candidates_error() {
    let provider = FakeProvider::new(Behavior::Respond(vec![]));
    let service = service_with(provider, breaker_config());

    let err = service.validate("zzzz qqqq").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NoCandidates);
    assert_eq!(err.context().original_address.as_deref(), Some("zzzz qqqq"));
    assert_eq!(err.context().provider.as_deref(), Some("fake"));
}

#[tokio::test]
async fn no_candidates_does_not_count_against_breaker() {
    let provider = FakeProvider::new(Behavior::Respond(vec![]));
    let service = service_with(provider, breaker_config());

    for _ in 0..5 {
        let _ = service.validate("zzzz").await;
    }

    let snapshot = service.breaker_snapshot();
    assert_eq!(snapshot.state, CircuitState::Closed);
    assert_eq!(snapshot.window_successes, 5);
    assert_eq!(snapshot.window_failures, 0);
}

#[tokio::test]
async fn only_first_candidate_is_consulted() {
    let provider = FakeProvider::new(Behavior::Respond(vec![
        candidate("N", "1 Wrong Way", "Nowhere KS 67000"),
        candidate("Y", "123 Main St", "Springfield IL 62701"),
    ]));
    let service = service_with(provider, breaker_config());

    let result = service.validate("123 Main St, Springfield IL 62701").await.unwrap();

    assert_eq!(result.status, ValidationStatus::Invalid);
    assert_eq!(
        result.standardized_address.as_deref(),
        Some("1 Wrong Way, Nowhere KS 67000")
    );
}

#[tokio::test]
async fn blank_input_never_reaches_provider() {
    let provider = FakeProvider::new(googleplex_candidate());
    let service = service_with(provider.clone(), breaker_config());

    for raw in ["", "   ", "\n\t"] {
        let err = service.validate(raw).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn input_is_trimmed_before_lookup() {
    let provider = FakeProvider::new(googleplex_candidate());
    let service = service_with(provider, breaker_config());

    let result = service.validate(&format!("   {}  ", GOOGLEPLEX)).await.unwrap();

    assert_eq!(result.original_input, GOOGLEPLEX);
}

#[tokio::test]
async fn provider_errors_become_external_service_errors() {
    let provider = FakeProvider::new(Behavior::Fail(ProviderError::Unauthorized));
    let service = service_with(provider, breaker_config());

    let err = service.validate(GOOGLEPLEX).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ExternalServiceError);
    assert!(err.is_retriable());
    assert_eq!(
        err.context().reason.as_deref(),
        Some("Provider rejected credentials")
    );
    // Raw provider text stays in the context, not the message
    assert!(!err.message().contains("credentials"));
}

#[tokio::test(start_paused = true)]
async fn scenario_d_open_breaker_fails_fast_without_provider_call() {
    let provider = FakeProvider::new(Behavior::Fail(ProviderError::Network("refused".into())));
    let service = service_with(provider.clone(), breaker_config());

    for _ in 0..2 {
        let err = service.validate(GOOGLEPLEX).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExternalServiceError);
    }
    assert_eq!(service.breaker_snapshot().state, CircuitState::Open);
    assert_eq!(provider.calls(), 2);

    provider.set(googleplex_candidate());
    let err = service.validate(GOOGLEPLEX).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::CircuitOpen);
    assert_eq!(provider.calls(), 2);
    match err {
        ValidationError::CircuitOpen { retry_after, .. } => {
            assert_eq!(retry_after, Some(Duration::from_secs(30)));
        }
        other => panic!("expected CircuitOpen, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn scenario_e_timeout_is_typed_and_counted() {
    let provider = FakeProvider::new(Behavior::Delay(
        Duration::from_secs(60),
        vec![candidate("Y", "1 Main St", "Springfield IL")],
    ));
    let service = service_with(provider, breaker_config());

    let err = service.validate("1 Main St").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(service.breaker_snapshot().window_failures, 1);

    let err = service.validate("1 Main St").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(service.breaker_snapshot().state, CircuitState::Open);
}

#[tokio::test(start_paused = true)]
async fn breaker_recovers_after_successful_trial() {
    let provider = FakeProvider::new(Behavior::Fail(ProviderError::RateLimited));
    let service = service_with(provider.clone(), breaker_config());

    let _ = service.validate(GOOGLEPLEX).await;
    let _ = service.validate(GOOGLEPLEX).await;
    assert_eq!(service.breaker_snapshot().state, CircuitState::Open);

    tokio::time::advance(Duration::from_secs(30)).await;
    provider.set(googleplex_candidate());

    let result = service.validate(GOOGLEPLEX).await.unwrap();

    assert_eq!(result.status, ValidationStatus::Corrected);
    assert_eq!(service.breaker_snapshot().state, CircuitState::Closed);
    assert_eq!(provider.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn breaker_reopens_after_failed_trial() {
    let provider = FakeProvider::new(Behavior::Fail(ProviderError::Api(500, "oops".into())));
    let service = service_with(provider.clone(), breaker_config());

    let _ = service.validate(GOOGLEPLEX).await;
    let _ = service.validate(GOOGLEPLEX).await;
    tokio::time::advance(Duration::from_secs(30)).await;

    let err = service.validate(GOOGLEPLEX).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExternalServiceError);
    assert_eq!(service.breaker_snapshot().state, CircuitState::Open);

    let err = service.validate(GOOGLEPLEX).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CircuitOpen);
    assert_eq!(provider.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn half_open_admits_exactly_one_concurrent_trial() {
    let provider = FakeProvider::new(Behavior::Fail(ProviderError::Network("down".into())));
    let service = service_with(provider.clone(), breaker_config());

    let _ = service.validate(GOOGLEPLEX).await;
    let _ = service.validate(GOOGLEPLEX).await;
    tokio::time::advance(Duration::from_secs(30)).await;

    provider.set(Behavior::Delay(
        Duration::from_millis(500),
        vec![candidate("Y", "1600 Amphitheatre Pkwy", "Mountain View, CA 94043-1351")],
    ));

    let results =
        futures::future::join_all((0..5).map(|_| service.validate(GOOGLEPLEX))).await;

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(e) if e.kind() == ErrorKind::CircuitOpen))
        .count();

    assert_eq!(successes, 1);
    assert_eq!(rejected, 4);
    assert_eq!(provider.calls(), 3);
    assert_eq!(service.breaker_snapshot().state, CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn throttle_wait_does_not_count_against_call_timeout() {
    let provider = FakeProvider::new(googleplex_candidate());
    provider.set_ready_delay(Duration::from_secs(5));
    let service = service_with(provider.clone(), breaker_config());

    for _ in 0..4 {
        let result = service.validate(GOOGLEPLEX).await.unwrap();
        assert_eq!(result.status, ValidationStatus::Corrected);
    }

    let snapshot = service.breaker_snapshot();
    assert_eq!(snapshot.state, CircuitState::Closed);
    assert_eq!(snapshot.window_failures, 0);
    assert_eq!(provider.calls(), 4);
}

#[tokio::test]
async fn max_candidates_is_forwarded() {
    let provider = FakeProvider::new(googleplex_candidate());
    let service = service_with(provider.clone(), breaker_config());

    service.validate(GOOGLEPLEX).await.unwrap();

    assert_eq!(provider.last_max_candidates(), Some(1));
}
