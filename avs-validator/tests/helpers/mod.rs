//! Shared test helpers: scripted provider and service builders

#![allow(dead_code)]

use async_trait::async_trait;
use avs_validator::breaker::{BreakerConfig, CircuitBreaker};
use avs_validator::classifier::MatchSignal;
use avs_validator::provider::{
    AddressComponents, AddressProvider, Candidate, DeliveryAnalysis, ProviderError,
};
use avs_validator::service::ValidationService;
use avs_validator::validator::AddressValidator;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What the fake provider does on its next lookups
#[derive(Debug, Clone)]
pub enum Behavior {
    Respond(Vec<Candidate>),
    Fail(ProviderError),
    Delay(Duration, Vec<Candidate>),
}

/// In-memory provider with a switchable behavior and a call counter
pub struct FakeProvider {
    behavior: Mutex<Behavior>,
    calls: AtomicUsize,
    last_max_candidates: Mutex<Option<u32>>,
    /// Simulated client-side throttle wait
    ready_delay: Mutex<Duration>,
}

impl FakeProvider {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior: Mutex::new(behavior),
            calls: AtomicUsize::new(0),
            last_max_candidates: Mutex::new(None),
            ready_delay: Mutex::new(Duration::ZERO),
        })
    }

    pub fn set(&self, behavior: Behavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn set_ready_delay(&self, delay: Duration) {
        *self.ready_delay.lock().unwrap() = delay;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_max_candidates(&self) -> Option<u32> {
        *self.last_max_candidates.lock().unwrap()
    }
}

#[async_trait]
impl AddressProvider for FakeProvider {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn ready(&self) {
        let delay = *self.ready_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    async fn lookup(
        &self,
        _address: &str,
        max_candidates: u32,
    ) -> Result<Vec<Candidate>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_max_candidates.lock().unwrap() = Some(max_candidates);

        let behavior = self.behavior.lock().unwrap().clone();
        match behavior {
            Behavior::Respond(candidates) => Ok(candidates),
            Behavior::Fail(err) => Err(err),
            Behavior::Delay(delay, candidates) => {
                tokio::time::sleep(delay).await;
                Ok(candidates)
            }
        }
    }
}

/// Candidate with the given signal, delivery line and last line
pub fn candidate(signal: &str, delivery_line_1: &str, last_line: &str) -> Candidate {
    Candidate {
        delivery_line_1: delivery_line_1.to_string(),
        delivery_line_2: None,
        last_line: last_line.to_string(),
        components: AddressComponents::default(),
        match_signal: MatchSignal::from_code(signal),
        analysis: DeliveryAnalysis::default(),
    }
}

/// Small, fast breaker settings for tests
pub fn breaker_config() -> BreakerConfig {
    BreakerConfig {
        call_timeout: Duration::from_secs(1),
        error_threshold_percentage: 50,
        reset_timeout: Duration::from_secs(30),
        rolling_window: Duration::from_secs(10),
        rolling_buckets: 10,
        volume_threshold: 2,
    }
}

pub fn service_with(provider: Arc<FakeProvider>, config: BreakerConfig) -> ValidationService {
    let breaker = Arc::new(CircuitBreaker::new("fake", config));
    ValidationService::new(AddressValidator::new(provider, breaker, 1))
}
